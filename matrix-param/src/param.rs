use crate::errors::ParamError;
use crate::link::LinkFunction;
use ndarray::prelude::*;

/// A named parameter matrix stored in the unconstrained space
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    value: Array2<f64>,
    link: LinkFunction,
}

impl Parameter {
    /// * `name` - parameter name
    /// * `value` - unconstrained value
    /// * `link` - link function to the constrained space
    pub fn new(name: &str, value: Array2<f64>, link: LinkFunction) -> Self {
        Self {
            name: name.to_string(),
            value,
            link,
        }
    }

    /// Build a parameter from its constrained value
    pub fn from_constrained(
        name: &str,
        constrained: &Array2<f64>,
        link: LinkFunction,
    ) -> anyhow::Result<Self> {
        Ok(Self::new(name, link.inverse(constrained)?, link))
    }

    /// A `dims.0 x dims.1` parameter whose constrained entries all
    /// equal `init`
    pub fn filled(
        name: &str,
        dims: (usize, usize),
        init: f64,
        link: LinkFunction,
    ) -> anyhow::Result<Self> {
        let w0 = link.f_inv(init)?;
        Ok(Self::new(name, Array2::from_elem(dims, w0), link))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn link(&self) -> LinkFunction {
        self.link
    }

    pub fn dims(&self) -> (usize, usize) {
        self.value.dim()
    }

    pub fn value(&self) -> &Array2<f64> {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Array2<f64> {
        &mut self.value
    }

    /// Replace the unconstrained value, keeping the shape
    pub fn set_value(&mut self, value: Array2<f64>) -> anyhow::Result<()> {
        if value.dim() != self.value.dim() {
            return Err(ParamError::ShapeMismatch {
                name: self.name.clone(),
                expected: self.value.dim(),
                found: value.dim(),
            }
            .into());
        }
        self.value = value;
        Ok(())
    }

    /// The value mapped through the link function
    pub fn constrained(&self) -> Array2<f64> {
        self.link.forward(&self.value)
    }
}

/// Read-only copy of the current parameter values of one
/// variational family, indexed in registration order. Score
/// functions only see this snapshot, never the live parameters.
#[derive(Debug, Clone, Default)]
pub struct ParamSnapshot {
    unconstrained: Vec<Array1<f64>>,
    constrained: Vec<Array1<f64>>,
}

impl ParamSnapshot {
    pub fn from_params(params: &[Parameter]) -> Self {
        let unconstrained: Vec<Array1<f64>> = params
            .iter()
            .map(|p| p.value().iter().cloned().collect())
            .collect();
        let constrained = params
            .iter()
            .zip(unconstrained.iter())
            .map(|(p, w)| p.link().forward(w))
            .collect();
        Self {
            unconstrained,
            constrained,
        }
    }

    pub fn len(&self) -> usize {
        self.constrained.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constrained.is_empty()
    }

    /// constrained value of the `k`-th parameter, flattened in
    /// row-major order
    pub fn constrained(&self, k: usize) -> &Array1<f64> {
        &self.constrained[k]
    }

    /// unconstrained value of the `k`-th parameter, flattened in
    /// row-major order
    pub fn unconstrained(&self, k: usize) -> &Array1<f64> {
        &self.unconstrained[k]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn constrained_value_follows_the_link() -> anyhow::Result<()> {
        let p = Parameter::filled("alpha", (3, 1), 1.0, LinkFunction::SoftPlus)?;
        assert_relative_eq!(p.value()[[0, 0]], (1f64.exp() - 1.0).ln(), epsilon = 1e-12);
        assert_relative_eq!(p.constrained(), Array2::ones((3, 1)), epsilon = 1e-12);

        let snapshot = ParamSnapshot::from_params(&[p.clone()]);
        assert_eq!(snapshot.len(), 1);
        assert_relative_eq!(snapshot.constrained(0)[2], 1.0, epsilon = 1e-12);
        assert_eq!(snapshot.unconstrained(0)[1], p.value()[[1, 0]]);
        Ok(())
    }

    #[test]
    fn shape_is_fixed() -> anyhow::Result<()> {
        let mut p = Parameter::filled("loc", (2, 1), 0.0, LinkFunction::Identity)?;
        assert!(p.set_value(Array2::zeros((3, 1))).is_err());
        p.set_value(array![[1.0], [2.0]])?;
        assert_eq!(p.constrained(), array![[1.0], [2.0]]);
        Ok(())
    }
}
