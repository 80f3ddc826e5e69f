//! Link functions between the unconstrained optimization space and
//! the constrained natural parameter space.
//!
//! * `f` maps unconstrained `x` to constrained `y`
//! * `f_inv` maps `y` back to `x`
//! * `g` is `df/dx` at `x`, the chain-rule factor of score functions

use crate::errors::ParamError;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

/// below this input softplus is `exp(x)`
const SOFTPLUS_LOWER: f64 = -5.0;
/// above this input softplus is `x`
const SOFTPLUS_UPPER: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkFunction {
    #[serde(rename = "id")]
    Identity,
    #[serde(rename = "softplus")]
    SoftPlus,
}

impl LinkFunction {
    /// Look up a link function by its registered name
    ///
    /// * `name` - `id` (or `identity`), `softplus`
    pub fn by_name(name: &str) -> anyhow::Result<Self> {
        match name {
            "id" | "identity" => Ok(Self::Identity),
            "softplus" => Ok(Self::SoftPlus),
            _ => Err(ParamError::InvalidLinkFunctionName(name.to_string()).into()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Identity => "id",
            Self::SoftPlus => "softplus",
        }
    }

    /// unconstrained -> constrained
    pub fn f(&self, x: f64) -> f64 {
        match self {
            Self::Identity => x,
            Self::SoftPlus => {
                if x < SOFTPLUS_LOWER {
                    x.exp()
                } else if x > SOFTPLUS_UPPER {
                    x
                } else {
                    x.exp().ln_1p()
                }
            }
        }
    }

    /// constrained -> unconstrained
    pub fn f_inv(&self, y: f64) -> anyhow::Result<f64> {
        match self {
            Self::Identity => Ok(y),
            Self::SoftPlus => {
                if !y.is_finite() || y <= 0.0 {
                    return Err(ParamError::DomainError {
                        link: self.name(),
                        value: y,
                    }
                    .into());
                }
                if y > SOFTPLUS_UPPER {
                    Ok(y)
                } else if y < SOFTPLUS_LOWER.exp() {
                    // inverse of the exponential branch
                    Ok(y.ln())
                } else {
                    Ok(y.exp_m1().ln())
                }
            }
        }
    }

    /// `df/dx` evaluated at unconstrained `x`
    pub fn g(&self, x: f64) -> f64 {
        match self {
            Self::Identity => 1.0,
            Self::SoftPlus => {
                if x < SOFTPLUS_LOWER {
                    x.exp()
                } else if x > SOFTPLUS_UPPER {
                    1.0
                } else {
                    1.0 / (1.0 + (-x).exp())
                }
            }
        }
    }

    pub fn forward<D: Dimension>(&self, x: &Array<f64, D>) -> Array<f64, D> {
        x.mapv(|v| self.f(v))
    }

    pub fn inverse<D: Dimension>(&self, y: &Array<f64, D>) -> anyhow::Result<Array<f64, D>> {
        let mut ret = Array::zeros(y.raw_dim());
        for (r, &v) in ret.iter_mut().zip(y.iter()) {
            *r = self.f_inv(v)?;
        }
        Ok(ret)
    }

    pub fn derivative<D: Dimension>(&self, x: &Array<f64, D>) -> Array<f64, D> {
        x.mapv(|v| self.g(v))
    }
}

impl std::fmt::Display for LinkFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const LINKS: [LinkFunction; 2] = [LinkFunction::Identity, LinkFunction::SoftPlus];

    #[test]
    fn round_trip_on_every_branch() -> anyhow::Result<()> {
        for lf in LINKS {
            for &y in &[1e-4, 5e-3, 6.8e-3, 0.1, 0.5, 1.0, 2.0, 9.99, 10.0, 25.0, 1e4] {
                assert_relative_eq!(lf.f(lf.f_inv(y)?), y, max_relative = 1e-10);
            }
        }
        for &y in &[-3.0, 0.0] {
            assert_relative_eq!(LinkFunction::Identity.f(LinkFunction::Identity.f_inv(y)?), y);
        }
        Ok(())
    }

    #[test]
    fn g_is_the_derivative_of_f() {
        let h = 1e-6;
        for lf in LINKS {
            for &x in &[-8.0, -6.0, -4.0, -1.0, 0.0, 0.3, 2.0, 9.0, 12.0, 40.0] {
                let numerical = (lf.f(x + h) - lf.f(x - h)) / (2.0 * h);
                assert_relative_eq!(lf.g(x), numerical, max_relative = 1e-5);
            }
        }
    }

    #[test]
    fn softplus_does_not_overflow() {
        let lf = LinkFunction::SoftPlus;
        assert_eq!(lf.f(1000.0), 1000.0);
        assert!(lf.f(-1000.0) >= 0.0);
        assert_eq!(lf.g(1000.0), 1.0);
        assert!(lf.g(-1000.0).is_finite());
    }

    #[test]
    fn registry_and_domain() {
        assert_eq!(
            LinkFunction::by_name("softplus").ok(),
            Some(LinkFunction::SoftPlus)
        );
        assert_eq!(LinkFunction::by_name("id").ok(), Some(LinkFunction::Identity));

        let err = LinkFunction::by_name("exp").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ParamError>(),
            Some(&ParamError::InvalidLinkFunctionName("exp".into()))
        );

        for y in [0.0, -1.0, f64::NAN] {
            let err = LinkFunction::SoftPlus.f_inv(y).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<ParamError>(),
                Some(ParamError::DomainError { .. })
            ));
        }
    }

    #[test]
    fn elementwise_helpers() -> anyhow::Result<()> {
        let lf = LinkFunction::SoftPlus;
        let y = array![[0.5], [1.0], [3.0]];
        let x = lf.inverse(&y)?;
        assert_relative_eq!(lf.forward(&x), y, max_relative = 1e-12);
        assert_eq!(lf.derivative(&x).shape(), &[3, 1]);
        Ok(())
    }
}
