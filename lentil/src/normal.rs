use crate::bbvi::GradStats;
use crate::config::Config;
use crate::latent::{Latent, Nested, Score};
use crate::model::Model;
use crate::variational::{leaf_scores, ParamRegistry, ScoreFn, Variational};

use matrix_param::io::ParamRecord;
use matrix_param::{LinkFunction, OptimizerConfig, ParamSnapshot, Parameter};
use ndarray::prelude::*;
use rand::RngCore;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;
use std::sync::Arc;

/// `sum_i ln N(z_i | loc_i, scale_i^2)`
pub fn normal_log_pdf(z: ArrayView1<f64>, loc: ArrayView1<f64>, scale: ArrayView1<f64>) -> f64 {
    z.iter()
        .zip(loc.iter())
        .zip(scale.iter())
        .map(|((&z_i, &mu_i), &sd_i)| {
            let var = sd_i * sd_i;
            let d = z_i - mu_i;
            -0.5 * (2.0 * PI * var).ln() - d * d / (2.0 * var)
        })
        .sum()
}

/// Isotropic normal prior centred at zero
pub struct PNormal {
    loc: Array1<f64>,
    scale: Array1<f64>,
}

impl PNormal {
    pub fn new(dim: usize, scale: f64) -> Self {
        Self {
            loc: Array1::zeros(dim),
            scale: Array1::from_elem(dim, scale),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.data_dimension, config.p.init_scale)
    }

    /// Density of `x` under the same scale but centred at `loc`
    pub fn log_p_at(&self, x: ArrayView1<f64>, loc: ArrayView1<f64>) -> f64 {
        normal_log_pdf(x, loc, self.scale.view())
    }
}

impl Model for PNormal {
    fn family(&self) -> &'static str {
        "normal"
    }

    fn log_p(&self, z: &Latent) -> anyhow::Result<f64> {
        let z = z.leaf(self.family())?;
        Ok(normal_log_pdf(z.view(), self.loc.view(), self.scale.view()))
    }
}

const LOC: usize = 0;
const SCALE: usize = 1;

/// Mean-field normal variational family
pub struct QNormal {
    registry: ParamRegistry,
}

impl QNormal {
    pub fn new(
        dim: usize,
        init_loc: f64,
        init_scale: f64,
        link: LinkFunction,
        optimizer: OptimizerConfig,
    ) -> anyhow::Result<Self> {
        let mut registry = ParamRegistry::new("normal", optimizer);

        let loc = Parameter::filled("loc", (dim, 1), init_loc, LinkFunction::Identity)?;
        let scale = Parameter::filled("scale", (dim, 1), init_scale, link)?;

        let score_loc: ScoreFn =
            Arc::new(|params: &ParamSnapshot, z: &Array1<f64>, i: usize| {
                let mu = params.constrained(LOC)[i];
                let sd = params.constrained(SCALE)[i];
                (z[i] - mu) / (sd * sd)
            });

        let score_scale: ScoreFn =
            Arc::new(move |params: &ParamSnapshot, z: &Array1<f64>, i: usize| {
                let mu = params.constrained(LOC)[i];
                let sd = params.constrained(SCALE)[i];
                let w = params.unconstrained(SCALE)[i];
                let d = z[i] - mu;
                link.g(w) * (d * d / (sd * sd * sd) - 1.0 / sd)
            });

        registry.register_param(loc, score_loc, false)?;
        registry.register_param(scale, score_scale, false)?;
        Ok(Self { registry })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(
            config.data_dimension,
            config.q.init_loc,
            config.q.init_scale,
            config.link()?,
            config.optimizer_config()?,
        )
    }

    pub fn loc(&self) -> &Array1<f64> {
        self.registry.snapshot().constrained(LOC)
    }

    pub fn scale(&self) -> &Array1<f64> {
        self.registry.snapshot().constrained(SCALE)
    }

    pub fn registry(&self) -> &ParamRegistry {
        &self.registry
    }
}

impl Variational for QNormal {
    fn family(&self) -> &'static str {
        "normal"
    }

    fn sample(&self, rng: &mut dyn RngCore) -> anyhow::Result<Latent> {
        let mut z = Array1::zeros(self.loc().len());
        for ((z_i, &mu), &sd) in z.iter_mut().zip(self.loc().iter()).zip(self.scale().iter()) {
            *z_i = Normal::new(mu, sd)?.sample(rng);
        }
        Ok(Nested::Leaf(z))
    }

    fn log_q(&self, z: &Latent) -> anyhow::Result<f64> {
        let z = z.leaf(self.family())?;
        Ok(normal_log_pdf(z.view(), self.loc().view(), self.scale().view()))
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
