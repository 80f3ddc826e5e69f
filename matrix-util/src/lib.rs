pub mod common_io;
pub mod dense_data;
pub mod errors;
pub mod minibatch;
pub mod traits;

pub use dense_data::{build_data, DenseData};
pub use errors::DataError;
pub use minibatch::{BatchOrder, ExampleIds, MinibatchSampler};
pub use traits::DenseDataOps;
