//! Custom elementary operations: a forward rule paired with an explicit
//! tangent-propagation (JVP) rule.
//!
//! Built-in arithmetic covers the standard elementwise rules; anything else
//! is supplied by implementing [`DualOp`]. The forward rule may retain
//! intermediate state in its [`OpContext`] for the tangent rule to reuse
//! (e.g. `exp` saving its own output); the state is owned by that single
//! forward/JVP pair and is released when the tangent rule takes it, or when
//! the application finishes, whichever comes first.

use std::collections::BTreeMap;
use std::sync::Arc;

use ndarray::ArrayD;

use crate::dual_tensor::DualTensor;
use crate::error::AdError;
use crate::float::Float;

/// Scratch state carried from an operation's forward rule to its JVP rule.
///
/// One context exists per application of an op; it never outlives it.
pub struct OpContext<F: Float> {
    saved: Option<ArrayD<F>>,
}

impl<F: Float> OpContext<F> {
    fn new() -> Self {
        OpContext { saved: None }
    }

    /// Retain a tensor for the JVP rule.
    pub fn save(&mut self, values: ArrayD<F>) {
        self.saved = Some(values);
    }

    /// Take ownership of the saved tensor, releasing it from the context.
    ///
    /// Use this in a JVP rule that will not need the state again.
    pub fn take_saved(&mut self) -> Option<ArrayD<F>> {
        self.saved.take()
    }

    /// Borrow the saved tensor without releasing it.
    pub fn saved(&self) -> Option<&ArrayD<F>> {
        self.saved.as_ref()
    }
}

/// A custom operation: forward computation plus its local derivative rule.
///
/// `jvp` receives the incoming tangent and must produce the outgoing tangent
/// `f'(primal) · tangent`, matching the shape of `forward`'s output. It is
/// only invoked when the input actually carries a live tangent.
pub trait DualOp<F: Float>: Send + Sync {
    /// Compute the primal output. State needed by `jvp` goes into `ctx`.
    fn forward(&self, primal: &ArrayD<F>, ctx: &mut OpContext<F>) -> Result<ArrayD<F>, AdError>;

    /// Propagate an incoming tangent through the operation.
    fn jvp(&self, tangent: &ArrayD<F>, ctx: &mut OpContext<F>) -> Result<ArrayD<F>, AdError>;
}

/// Apply a custom operation to a dual tensor.
///
/// Runs the forward rule, then the JVP rule if (and only if) the input has a
/// live tangent. The context — and any state still saved in it — is dropped
/// when this returns, on success and error paths alike.
pub fn apply<F: Float>(op: &dyn DualOp<F>, input: &DualTensor<F>) -> Result<DualTensor<F>, AdError> {
    let mut ctx = OpContext::new();
    let primal = op.forward(input.primal(), &mut ctx)?;
    let tangent = match input.tangent() {
        Some(t) => Some(op.jvp(t, &mut ctx)?),
        None => None,
    };
    DualTensor::attach(primal, tangent)
}

/// Registry of named custom operations.
///
/// Applying a name that was never registered is the "unsupported operation"
/// failure: [`AdError::UnsupportedOp`] identifying the name.
pub struct OpRegistry<F: Float> {
    ops: BTreeMap<String, Arc<dyn DualOp<F>>>,
}

impl<F: Float> Default for OpRegistry<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> OpRegistry<F> {
    /// Create an empty registry.
    pub fn new() -> Self {
        OpRegistry {
            ops: BTreeMap::new(),
        }
    }

    /// Register an operation under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, op: Arc<dyn DualOp<F>>) {
        self.ops.insert(name.into(), op);
    }

    /// Look up a registered operation.
    pub fn get(&self, name: &str) -> Result<&Arc<dyn DualOp<F>>, AdError> {
        self.ops.get(name).ok_or_else(|| AdError::unsupported(name))
    }

    /// Apply the operation registered under `name`.
    pub fn apply(&self, name: &str, input: &DualTensor<F>) -> Result<DualTensor<F>, AdError> {
        let op = self.get(name)?;
        apply(op.as_ref(), input)
    }
}
