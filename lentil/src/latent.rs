use crate::errors::ModelError;
use ndarray::prelude::*;
use std::collections::BTreeMap;

/// A value of a flat family (`Leaf`) or a name-keyed collection of
/// values of a hierarchical family (`Named`)
#[derive(Debug, Clone, PartialEq)]
pub enum Nested<T> {
    Leaf(T),
    Named(BTreeMap<String, Nested<T>>),
}

/// One latent draw
pub type Latent = Nested<Array1<f64>>;

/// Score functions of one latent draw: `rows x n_params` per leaf
pub type Score = Nested<Array2<f64>>;

impl<T> Nested<T> {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Nested::Leaf(_))
    }

    /// The leaf value, or `LatentKind` for a named collection
    pub fn leaf(&self, family: &'static str) -> anyhow::Result<&T> {
        match self {
            Nested::Leaf(x) => Ok(x),
            Nested::Named(_) => Err(ModelError::LatentKind {
                family,
                expected: "flat",
            }
            .into()),
        }
    }

    /// The named collection, or `LatentKind` for a leaf
    pub fn named(&self, family: &'static str) -> anyhow::Result<&BTreeMap<String, Nested<T>>> {
        match self {
            Nested::Named(x) => Ok(x),
            Nested::Leaf(_) => Err(ModelError::LatentKind {
                family,
                expected: "hierarchical",
            }
            .into()),
        }
    }

    /// The component called `name`
    pub fn get(&self, name: &str) -> anyhow::Result<&Nested<T>> {
        match self {
            Nested::Named(x) => x
                .get(name)
                .ok_or_else(|| ModelError::MissingComponent(name.to_string()).into()),
            Nested::Leaf(_) => Err(ModelError::MissingComponent(name.to_string()).into()),
        }
    }
}

impl<T> FromIterator<(String, Nested<T>)> for Nested<T> {
    fn from_iter<I: IntoIterator<Item = (String, Nested<T>)>>(iter: I) -> Self {
        Nested::Named(iter.into_iter().collect())
    }
}
