use crate::errors::ModelError;
use crate::latent::Latent;
use ndarray::prelude::*;
use std::collections::BTreeMap;

/// Log-joint density of a generative model
pub trait Model: Send + Sync {
    fn family(&self) -> &'static str;

    /// Log prior density `log p(z)` of one latent draw
    fn log_p(&self, z: &Latent) -> anyhow::Result<f64>;

    /// Data log-likelihood `sum_j log p(x_j | z)` over the columns
    /// of `x`. Only models of observed data implement this.
    fn log_lik(&self, _x: ArrayView2<f64>, _z: &Latent) -> anyhow::Result<f64> {
        Err(ModelError::NotImplemented {
            method: "log_lik",
            family: self.family(),
        }
        .into())
    }
}

/// Named sub-models whose log densities add up
#[derive(Default)]
pub struct CompositeModel {
    components: BTreeMap<String, Box<dyn Model>>,
}

impl CompositeModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, model: Box<dyn Model>) {
        self.components.insert(name.to_string(), model);
    }

    pub fn get(&self, name: &str) -> anyhow::Result<&dyn Model> {
        self.components
            .get(name)
            .map(|m| m.as_ref())
            .ok_or_else(|| ModelError::MissingComponent(name.to_string()).into())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl Model for CompositeModel {
    fn family(&self) -> &'static str {
        "composite"
    }

    fn log_p(&self, z: &Latent) -> anyhow::Result<f64> {
        z.named(self.family())?;
        let mut ret = 0.0;
        for (name, model) in self.components.iter() {
            ret += model.log_p(z.get(name)?)?;
        }
        Ok(ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::latent::Nested;

    struct Constant(f64);

    impl Model for Constant {
        fn family(&self) -> &'static str {
            "constant"
        }
        fn log_p(&self, z: &Latent) -> anyhow::Result<f64> {
            z.leaf(self.family())?;
            Ok(self.0)
        }
    }

    #[test]
    fn composite_sums_components() -> anyhow::Result<()> {
        let mut model = CompositeModel::new();
        model.insert("a", Box::new(Constant(-1.0)));
        model.insert("b", Box::new(Constant(-2.5)));

        let z: Latent = vec![
            ("a".to_string(), Nested::Leaf(array![0.0])),
            ("b".to_string(), Nested::Leaf(array![0.0])),
        ]
        .into_iter()
        .collect();
        assert_eq!(model.log_p(&z)?, -3.5);

        let partial: Latent = vec![("a".to_string(), Nested::Leaf(array![0.0]))]
            .into_iter()
            .collect();
        assert!(model.log_p(&partial).is_err());
        assert!(model.log_p(&Nested::Leaf(array![0.0])).is_err());
        Ok(())
    }

    #[test]
    fn log_lik_is_not_implemented_by_default() {
        let err = Constant(0.0)
            .log_lik(Array2::zeros((1, 1)).view(), &Nested::Leaf(array![0.0]))
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ModelError>(),
            Some(&ModelError::NotImplemented {
                method: "log_lik",
                family: "constant"
            })
        );
    }
}
