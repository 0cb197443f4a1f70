pub mod api;
pub mod dual;
pub mod dual_tensor;
pub mod error;
pub mod float;
pub mod gradcheck;
pub mod level;
pub mod nn;
pub mod op;
mod traits;

pub use api::{jvp, jvp_scalar};
pub use dual::Dual;
pub use dual_tensor::DualTensor;
pub use error::AdError;
pub use float::Float;
pub use gradcheck::GradCheck;
pub use level::{enter_level, LevelGuard, LevelId};
pub use nn::{functional_call, Linear, Module, ParamMap};
pub use op::{apply, DualOp, OpContext, OpRegistry};

/// Type alias for forward-mode dual numbers over `f64`.
pub type Dual64 = Dual<f64>;
/// Type alias for forward-mode dual numbers over `f32`.
pub type Dual32 = Dual<f32>;
/// Type alias for dual tensors over `f64`.
pub type DualTensor64 = DualTensor<f64>;
/// Type alias for dual tensors over `f32`.
pub type DualTensor32 = DualTensor<f32>;
