//! Functional module integration.
//!
//! A stateful model is evaluated with dual-valued parameters by passing an
//! immutable name → [`DualTensor`] map into a pure call — the module itself
//! is never mutated, so the same instance can serve unrelated forward-AD
//! passes (or plain evaluations) concurrently.

use std::collections::BTreeMap;

use ndarray::{ArrayD, Ix1, Ix2};

use crate::dual_tensor::DualTensor;
use crate::error::AdError;
use crate::float::Float;

/// Immutable parameter binding for a functional call.
pub type ParamMap<F> = BTreeMap<String, DualTensor<F>>;

/// A model evaluable with externally supplied parameters.
pub trait Module<F: Float> {
    /// Named parameters and their current (plain) values.
    fn parameters(&self) -> BTreeMap<String, ArrayD<F>>;

    /// Pure forward pass reading parameters from `params` instead of `self`.
    fn forward_with(
        &self,
        params: &ParamMap<F>,
        input: &DualTensor<F>,
    ) -> Result<DualTensor<F>, AdError>;
}

/// Evaluate `module` with the given parameter bindings.
///
/// Verifies up front that every named parameter of the module is bound, so a
/// partial map fails with [`AdError::MissingParam`] before any computation.
pub fn functional_call<F: Float, M: Module<F>>(
    module: &M,
    params: &ParamMap<F>,
    input: &DualTensor<F>,
) -> Result<DualTensor<F>, AdError> {
    for name in module.parameters().keys() {
        if !params.contains_key(name) {
            return Err(AdError::MissingParam { name: name.clone() });
        }
    }
    module.forward_with(params, input)
}

/// Fetch one bound parameter from a [`ParamMap`].
pub fn param<'a, F: Float>(
    params: &'a ParamMap<F>,
    name: &str,
) -> Result<&'a DualTensor<F>, AdError> {
    params.get(name).ok_or_else(|| AdError::MissingParam {
        name: name.to_string(),
    })
}

/// Affine map `y = x · Wᵀ + b` for `x: [batch, in]`, `W: [out, in]`,
/// `b: [out]`.
///
/// With dual-valued parameters and/or input, the output tangent is the full
/// `dW·x + W·dx + db` propagation.
pub struct Linear<F: Float> {
    weight: ArrayD<F>,
    bias: Option<ArrayD<F>>,
}

impl<F: Float> Linear<F> {
    /// Build from a `[out, in]` weight and an optional `[out]` bias.
    pub fn new(
        weight: ndarray::Array2<F>,
        bias: Option<ndarray::Array1<F>>,
    ) -> Self {
        Linear {
            weight: weight.into_dyn(),
            bias: bias.map(|b| b.into_dyn()),
        }
    }

    /// Output features.
    pub fn out_features(&self) -> usize {
        self.weight.shape()[0]
    }

    /// Input features.
    pub fn in_features(&self) -> usize {
        self.weight.shape()[1]
    }
}

impl<F: Float> Module<F> for Linear<F> {
    fn parameters(&self) -> BTreeMap<String, ArrayD<F>> {
        let mut params = BTreeMap::new();
        params.insert("weight".to_string(), self.weight.clone());
        if let Some(b) = &self.bias {
            params.insert("bias".to_string(), b.clone());
        }
        params
    }

    fn forward_with(
        &self,
        params: &ParamMap<F>,
        input: &DualTensor<F>,
    ) -> Result<DualTensor<F>, AdError> {
        let weight = param(params, "weight")?;
        if weight.primal().view().into_dimensionality::<Ix2>().is_err() {
            return Err(AdError::unsupported("linear weight must be 2-d"));
        }
        let y = input.matmul(&weight.transpose()?)?;
        match self.bias.as_ref() {
            Some(_) => {
                let bias = param(params, "bias")?;
                if bias.primal().view().into_dimensionality::<Ix1>().is_err() {
                    return Err(AdError::unsupported("linear bias must be 1-d"));
                }
                y.add_broadcast(bias)
            }
            None => Ok(y),
        }
    }
}
