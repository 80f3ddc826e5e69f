use crate::bbvi::GradStats;
use crate::config::Config;
use crate::latent::{Latent, Nested, Score};
use crate::model::Model;
use crate::variational::{leaf_scores, ParamRegistry, ScoreFn, Variational};

use matrix_param::io::ParamRecord;
use matrix_param::{LinkFunction, OptimizerConfig, ParamSnapshot, Parameter};
use ndarray::prelude::*;
use rand::RngCore;
use rand_distr::{Distribution, Gamma as GammaDist};
use special::Gamma;
use std::sync::Arc;

/// `ln Dir(z | alpha)`
pub fn dirichlet_log_pdf(z: &Array1<f64>, alpha: &Array1<f64>) -> f64 {
    let norm = Gamma::ln_gamma(alpha.sum()).0
        - alpha.iter().map(|&a| Gamma::ln_gamma(a).0).sum::<f64>();
    norm + z
        .iter()
        .zip(alpha.iter())
        .map(|(&z_k, &a_k)| (a_k - 1.0) * z_k.ln())
        .sum::<f64>()
}

/// Symmetric Dirichlet prior
pub struct PDirichlet {
    alpha: Array1<f64>,
}

impl PDirichlet {
    pub fn new(n_components: usize, init_alpha: f64) -> Self {
        Self {
            alpha: Array1::from_elem(n_components, init_alpha),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.p.n_components, config.p.init_alpha)
    }

    pub fn alpha(&self) -> &Array1<f64> {
        &self.alpha
    }
}

impl Model for PDirichlet {
    fn family(&self) -> &'static str {
        "dirichlet"
    }

    fn log_p(&self, z: &Latent) -> anyhow::Result<f64> {
        Ok(dirichlet_log_pdf(z.leaf(self.family())?, &self.alpha))
    }
}

const ALPHA: usize = 0;

/// Dirichlet variational family with one concentration parameter per
/// component
pub struct QDirichlet {
    registry: ParamRegistry,
}

impl QDirichlet {
    pub fn new(
        n_components: usize,
        init_alpha: f64,
        link: LinkFunction,
        optimizer: OptimizerConfig,
    ) -> anyhow::Result<Self> {
        let mut registry = ParamRegistry::new("dirichlet", optimizer);

        let alpha = Parameter::filled("alpha", (n_components, 1), init_alpha, link)?;

        // d/dw_i ln Dir(z | f(w)) = g(w_i) (psi(sum alpha) - psi(alpha_i) + ln z_i)
        let score_alpha: ScoreFn =
            Arc::new(move |params: &ParamSnapshot, z: &Array1<f64>, i: usize| {
                let alpha = params.constrained(ALPHA);
                let w = params.unconstrained(ALPHA);
                link.g(w[i])
                    * (Gamma::digamma(alpha.sum()) - Gamma::digamma(alpha[i]) + z[i].ln())
            });

        registry.register_param(alpha, score_alpha, false)?;
        Ok(Self { registry })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(
            config.p.n_components,
            config.q.init_alpha,
            config.link()?,
            config.optimizer_config()?,
        )
    }

    /// Current concentration in the constrained space
    pub fn alpha(&self) -> Array1<f64> {
        self.registry.snapshot().constrained(ALPHA).clone()
    }

    pub fn registry(&self) -> &ParamRegistry {
        &self.registry
    }
}

impl Variational for QDirichlet {
    fn family(&self) -> &'static str {
        "dirichlet"
    }

    fn sample(&self, rng: &mut dyn RngCore) -> anyhow::Result<Latent> {
        let alpha = self.registry.snapshot().constrained(ALPHA);
        let mut z = Array1::zeros(alpha.len());
        for (z_k, &a_k) in z.iter_mut().zip(alpha.iter()) {
            let x: f64 = GammaDist::new(a_k, 1.0)?.sample(rng);
            *z_k = x.max(f64::MIN_POSITIVE);
        }
        let tot = z.sum();
        z /= tot;
        Ok(Nested::Leaf(z))
    }

    fn log_q(&self, z: &Latent) -> anyhow::Result<f64> {
        let alpha = self.registry.snapshot().constrained(ALPHA);
        Ok(dirichlet_log_pdf(z.leaf(self.family())?, alpha))
    }

    fn grad_lq_matrix(&self, z: &Latent) -> anyhow::Result<Score> {
        Ok(Nested::Leaf(self.registry.grad_lq_matrix(z.leaf(self.family())?)))
    }

    fn update(
        &mut self,
        scores: &[&Score],
        log_p: &[f64],
        log_q: &[f64],
    ) -> anyhow::Result<GradStats> {
        let scores = leaf_scores(self.family(), scores)?;
        self.registry.update(&scores, log_p, log_q)
    }

    fn summary(&self) -> String {
        self.registry.summary()
    }

    fn records(&self, prefix: &str) -> Vec<ParamRecord> {
        self.registry.records(prefix)
    }

    fn load_records(&mut self, prefix: &str, records: &[ParamRecord]) -> anyhow::Result<()> {
        self.registry.load_records(prefix, records)
    }
}
