use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParamError {
    #[error("invalid link function name: {0}")]
    InvalidLinkFunctionName(String),

    #[error("{value} is outside the domain of the inverse {link} link")]
    DomainError { link: &'static str, value: f64 },

    #[error("invalid optimizer name: {0}")]
    InvalidOptimizerName(String),

    #[error("no registered parameter named {0}")]
    UnknownParameter(String),

    #[error("shape mismatch for {name}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        name: String,
        expected: (usize, usize),
        found: (usize, usize),
    },
}
