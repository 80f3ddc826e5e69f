//! Black-box variational inference.
//!
//! A [`model::Model`] scores latent draws under the generative model
//! and a [`variational::Variational`] family proposes them. The
//! training loop in [`inference`] fits the family's parameters by
//! stochastic gradient ascent on the ELBO using score-function
//! gradients estimated in [`bbvi`].

pub mod bbvi;
pub mod config;
pub mod dirichlet;
pub mod errors;
pub mod gaussian_mixture;
pub mod inference;
pub mod latent;
pub mod model;
pub mod normal;
pub mod variational;

pub use config::Config;
pub use errors::ModelError;
pub use inference::{EngineState, InferenceConfig, TrainStats, VariationalInference};
pub use latent::{Latent, Nested, Score};
pub use model::{CompositeModel, Model};
pub use variational::{CompositeVariational, ParamRegistry, ScoreFn, Variational};
