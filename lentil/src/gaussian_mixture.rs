//! Gaussian mixture with a Dirichlet prior on the mixture weights and
//! normal priors on the component locations.
//!
//! Latent draws are named collections with one `mixture_weight` entry
//! and one `component_loc_{k}` entry per component.

use crate::bbvi::GradStats;
use crate::config::Config;
use crate::dirichlet::{PDirichlet, QDirichlet};
use crate::errors::ModelError;
use crate::latent::{Latent, Score};
use crate::model::{CompositeModel, Model};
use crate::normal::{PNormal, QNormal};
use crate::variational::{CompositeVariational, Variational};

use matrix_param::io::ParamRecord;
use ndarray::prelude::*;
use rand::RngCore;

pub const MIXTURE_WEIGHT: &str = "mixture_weight";

pub fn component_name(k: usize) -> String {
    format!("component_loc_{}", k)
}

pub struct PGaussianMixture {
    prior: CompositeModel,
    likelihood: PNormal,
    n_components: usize,
}

impl PGaussianMixture {
    /// * `n_components` - number of mixture components
    /// * `dim` - data dimension
    /// * `init_alpha` - concentration of the weight prior
    /// * `prior_scale` - scale of the location priors
    /// * `likelihood_scale` - scale of each component around its location
    pub fn new(
        n_components: usize,
        dim: usize,
        init_alpha: f64,
        prior_scale: f64,
        likelihood_scale: f64,
    ) -> Self {
        let mut prior = CompositeModel::new();
        prior.insert(
            MIXTURE_WEIGHT,
            Box::new(PDirichlet::new(n_components, init_alpha)),
        );
        for k in 0..n_components {
            prior.insert(&component_name(k), Box::new(PNormal::new(dim, prior_scale)));
        }
        Self {
            prior,
            likelihood: PNormal::new(dim, likelihood_scale),
            n_components,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.p.n_components,
            config.data_dimension,
            config.p.init_alpha,
            config.p.init_scale,
            config.likelihood_scale(),
        )
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }
}

impl Model for PGaussianMixture {
    fn family(&self) -> &'static str {
        "gaussian_mixture"
    }

    fn log_p(&self, z: &Latent) -> anyhow::Result<f64> {
        self.prior.log_p(z)
    }

    /// `sum_j sum_k pi_k ln N(x_j | mu_k)` over the columns `x_j`
    fn log_lik(&self, x: ArrayView2<f64>, z: &Latent) -> anyhow::Result<f64> {
        let weight = z.get(MIXTURE_WEIGHT)?.leaf(self.family())?;
        if weight.len() != self.n_components {
            return Err(ModelError::SampleMismatch(format!(
                "{} weights for {} components",
                weight.len(),
                self.n_components
            ))
            .into());
        }
        let locs = (0..self.n_components)
            .map(|k| z.get(&component_name(k))?.leaf(self.family()))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut ret = 0.0;
        for x_j in x.axis_iter(Axis(1)) {
            for (k, loc) in locs.iter().enumerate() {
                ret += weight[k] * self.likelihood.log_p_at(x_j, loc.view());
            }
        }
        Ok(ret)
    }
}

pub struct QGaussianMixture {
    components: CompositeVariational,
}

impl QGaussianMixture {
    /// One location family per component; `mixture_weight` must have
    /// as many components as there are `locs`
    pub fn new(mixture_weight: QDirichlet, locs: Vec<QNormal>) -> anyhow::Result<Self> {
        if mixture_weight.alpha().len() != locs.len() {
            return Err(ModelError::InvalidConfig(format!(
                "{} mixture weights for {} component locations",
                mixture_weight.alpha().len(),
                locs.len()
            ))
            .into());
        }
        let mut components = CompositeVariational::new();
        components.insert(MIXTURE_WEIGHT, Box::new(mixture_weight));
        for (k, q) in locs.into_iter().enumerate() {
            components.insert(&component_name(k), Box::new(q));
        }
        Ok(Self { components })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let locs = (0..config.p.n_components)
            .map(|_| QNormal::from_config(config))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Self::new(QDirichlet::from_config(config)?, locs)
    }

    pub fn components(&self) -> &CompositeVariational {
        &self.components
    }
}

impl Variational for QGaussianMixture {
    fn family(&self) -> &'static str {
        "gaussian_mixture"
    }

    fn sample(&self, rng: &mut dyn RngCore) -> anyhow::Result<Latent> {
        self.components.sample(rng)
    }

    fn log_q(&self, z: &Latent) -> anyhow::Result<f64> {
        self.components.log_q(z)
    }

    fn grad_lq_matrix(&self, z: &Latent) -> anyhow::Result<Score> {
        self.components.grad_lq_matrix(z)
    }

    fn update(
        &mut self,
        scores: &[&Score],
        log_p: &[f64],
        log_q: &[f64],
    ) -> anyhow::Result<GradStats> {
        self.components.update(scores, log_p, log_q)
    }

    fn summary(&self) -> String {
        self.components.summary()
    }

    fn records(&self, prefix: &str) -> Vec<ParamRecord> {
        self.components.records(prefix)
    }

    fn load_records(&mut self, prefix: &str, records: &[ParamRecord]) -> anyhow::Result<()> {
        self.components.load_records(prefix, records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::latent::Nested;
    use crate::normal::normal_log_pdf;
    use approx::assert_abs_diff_eq;
    use matrix_param::{LinkFunction, OptimizerConfig};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn mixture_latent(weight: Array1<f64>, locs: &[Array1<f64>]) -> Latent {
        let mut z = vec![(MIXTURE_WEIGHT.to_string(), Nested::Leaf(weight))];
        for (k, loc) in locs.iter().enumerate() {
            z.push((component_name(k), Nested::Leaf(loc.clone())));
        }
        z.into_iter().collect()
    }

    #[test]
    fn each_example_counts_once() -> anyhow::Result<()> {
        let p = PGaussianMixture::new(2, 1, 1.0, 1.0, 1.0);
        let z = mixture_latent(array![0.25, 0.75], &[array![-1.0], array![2.0]]);
        let x = array![[0.0, 1.0, 3.0]];

        let unit = array![1.0];
        let mut expected = 0.0;
        for &x_j in x.iter() {
            let x_j = array![x_j];
            expected += 0.25 * normal_log_pdf(x_j.view(), array![-1.0].view(), unit.view());
            expected += 0.75 * normal_log_pdf(x_j.view(), array![2.0].view(), unit.view());
        }
        assert_abs_diff_eq!(p.log_lik(x.view(), &z)?, expected, epsilon = 1e-12);

        // one column at a time adds up to the whole batch
        let by_column: f64 = (0..3)
            .map(|j| p.log_lik(x.slice(s![.., j..j + 1]), &z))
            .sum::<anyhow::Result<f64>>()?;
        assert_abs_diff_eq!(by_column, expected, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn component_counts_must_agree() -> anyhow::Result<()> {
        let p = PGaussianMixture::new(3, 1, 1.0, 1.0, 1.0);
        let z = mixture_latent(array![0.5, 0.5], &[array![0.0], array![1.0], array![2.0]]);
        let err = p.log_lik(array![[0.0]].view(), &z).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ModelError>(),
            Some(ModelError::SampleMismatch(_))
        ));

        let opt = OptimizerConfig::default();
        let link = LinkFunction::SoftPlus;
        let q = QGaussianMixture::new(
            QDirichlet::new(3, 1.0, link, opt)?,
            vec![QNormal::new(1, 0.0, 1.0, link, opt)?],
        );
        assert!(matches!(
            q.err().as_ref().and_then(|e| e.downcast_ref::<ModelError>()),
            Some(ModelError::InvalidConfig(_))
        ));
        Ok(())
    }

    #[test]
    fn prior_adds_up_components() -> anyhow::Result<()> {
        let p = PGaussianMixture::new(2, 1, 1.0, 2.0, 1.0);
        let z = mixture_latent(array![0.5, 0.5], &[array![0.0], array![1.0]]);
        let weight = PDirichlet::new(2, 1.0).log_p(&Nested::Leaf(array![0.5, 0.5]))?;
        let loc = PNormal::new(1, 2.0);
        let expected = weight
            + loc.log_p(&Nested::Leaf(array![0.0]))?
            + loc.log_p(&Nested::Leaf(array![1.0]))?;
        assert_abs_diff_eq!(p.log_p(&z)?, expected, epsilon = 1e-12);
        assert!(p.log_p(&Nested::Leaf(array![0.5, 0.5])).is_err());
        Ok(())
    }

    #[test]
    fn variational_draws_are_named() -> anyhow::Result<()> {
        let opt = OptimizerConfig::default();
        let link = LinkFunction::SoftPlus;
        let q = QGaussianMixture::new(
            QDirichlet::new(2, 1.0, link, opt)?,
            vec![
                QNormal::new(3, 0.0, 1.0, link, opt)?,
                QNormal::new(3, 0.0, 1.0, link, opt)?,
            ],
        )?;
        let mut rng = StdRng::seed_from_u64(0);
        let z = q.sample(&mut rng)?;
        assert_eq!(z.get(MIXTURE_WEIGHT)?.leaf("test")?.len(), 2);
        assert_eq!(z.get("component_loc_1")?.leaf("test")?.len(), 3);

        let score = q.grad_lq_matrix(&z)?;
        assert_eq!(score.get("component_loc_0")?.leaf("test")?.dim(), (3, 2));
        assert!(q.log_q(&z)?.is_finite());

        let names: Vec<String> = q.records("q").into_iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "q/component_loc_0/loc",
                "q/component_loc_0/scale",
                "q/component_loc_1/loc",
                "q/component_loc_1/scale",
                "q/mixture_weight/alpha",
            ]
        );
        Ok(())
    }
}
