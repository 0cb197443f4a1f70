//! Caller-visible error type for the forward evaluator.
//!
//! Everything here is a synchronous, non-fatal report: computation stops at
//! the failing call and nothing is retried. Unpacking a value with no live
//! tangent is *not* an error (see [`crate::DualTensor::unpack_dual`]).

/// Errors reported by dual-tensor operations.
#[derive(Debug, thiserror::Error)]
pub enum AdError {
    /// A tangent (or a binary operand) did not match the expected shape.
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    /// `make_dual` was called outside any differentiation level.
    #[error("no active differentiation level; call enter_level() first")]
    NoActiveLevel,
    /// An explicit level exit was attempted on a level that is not the
    /// innermost active one. Nothing is torn down in this case.
    #[error("level {0} is not the innermost active level; exit inner levels first")]
    MisnestedLevel(u64),
    /// The operation has no tangent-propagation rule for these operands.
    #[error("unsupported operation on dual tensors: {op}")]
    UnsupportedOp { op: String },
    /// A functional call was given an incomplete parameter map.
    #[error("missing parameter '{name}' in functional call")]
    MissingParam { name: String },
    /// A computed tangent disagreed with its finite-difference estimate.
    #[error(
        "gradient check failed for input {input} at element {offset}: \
         analytic {analytic:e}, numeric {numeric:e}"
    )]
    GradCheckFailed {
        input: usize,
        offset: usize,
        analytic: f64,
        numeric: f64,
    },
}

impl AdError {
    pub(crate) fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        AdError::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    pub(crate) fn unsupported(op: impl Into<String>) -> Self {
        AdError::UnsupportedOp { op: op.into() }
    }
}
