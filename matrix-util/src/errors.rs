use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataError {
    #[error("unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("malformed data file {file}: {reason}")]
    Malformed { file: String, reason: String },

    #[error("example id {id} out of range (n_examples = {n_examples})")]
    ExampleOutOfRange { id: usize, n_examples: usize },
}
