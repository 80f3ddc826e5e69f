pub mod errors;
pub mod io;
pub mod link;
pub mod optimizer;
pub mod param;

pub use errors::ParamError;
pub use link::LinkFunction;
pub use optimizer::{Optimizer, OptimizerConfig, OptimizerKind};
pub use param::{ParamSnapshot, Parameter};
