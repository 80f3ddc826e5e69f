use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("{method} is not implemented for {family}")]
    NotImplemented {
        method: &'static str,
        family: &'static str,
    },

    #[error("missing component: {0}")]
    MissingComponent(String),

    #[error("{family} expects a {expected} latent value")]
    LatentKind {
        family: &'static str,
        expected: &'static str,
    },

    #[error("inconsistent Monte Carlo samples: {0}")]
    SampleMismatch(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
