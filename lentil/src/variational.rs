use crate::bbvi::{grad_bbvi, GradStats};
use crate::errors::ModelError;
use crate::latent::{Latent, Nested, Score};

use log::{info, warn};
use matrix_param::io::ParamRecord;
use matrix_param::{Optimizer, OptimizerConfig, ParamError, ParamSnapshot, Parameter};
use ndarray::prelude::*;
use rand::RngCore;
use std::collections::BTreeMap;
use std::sync::Arc;

/// `d log q(z) / d w` for the `i`-th coordinate of a latent draw `z`,
/// with `w` the unconstrained parameter, evaluated at a snapshot of
/// the current parameter values
pub type ScoreFn = Arc<dyn Fn(&ParamSnapshot, &Array1<f64>, usize) -> f64 + Send + Sync>;

/// An approximating family `q(z; w)`
pub trait Variational: Send + Sync {
    fn family(&self) -> &'static str;

    /// Draw one latent value
    fn sample(&self, rng: &mut dyn RngCore) -> anyhow::Result<Latent>;

    /// `log q(z)` at the current parameters
    fn log_q(&self, z: &Latent) -> anyhow::Result<f64>;

    /// Every score function at every coordinate of `z`
    fn grad_lq_matrix(&self, z: &Latent) -> anyhow::Result<Score>;

    /// Take one optimizer step per parameter from the Monte Carlo
    /// samples of an iteration
    ///
    /// * `scores` - score matrices of each sample
    /// * `log_p` - log joint density of each sample
    /// * `log_q` - log variational density of each sample
    fn update(&mut self, scores: &[&Score], log_p: &[f64], log_q: &[f64])
        -> anyhow::Result<GradStats>;

    /// Constrained parameter values, one line per parameter
    fn summary(&self) -> String;

    /// Parameter records with names prefixed by `prefix`
    fn records(&self, prefix: &str) -> Vec<ParamRecord>;

    /// Restore parameters from `records` without resetting the
    /// optimizers
    fn load_records(&mut self, prefix: &str, records: &[ParamRecord]) -> anyhow::Result<()>;

    fn print(&self) {
        for line in self.summary().lines() {
            info!("{}", line);
        }
    }
}

pub(crate) fn join_name(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Parameters of a flat family with their score functions and
/// optimizers, index-aligned
pub struct ParamRegistry {
    family: &'static str,
    params: Vec<Parameter>,
    score_funcs: Vec<ScoreFn>,
    optimizers: Vec<Box<dyn Optimizer>>,
    optimizer_config: OptimizerConfig,
    snapshot: ParamSnapshot,
}

impl ParamRegistry {
    pub fn new(family: &'static str, optimizer_config: OptimizerConfig) -> Self {
        Self {
            family,
            params: vec![],
            score_funcs: vec![],
            optimizers: vec![],
            optimizer_config,
            snapshot: ParamSnapshot::default(),
        }
    }

    /// Bind a parameter to its score function and return its index.
    ///
    /// A new parameter gets a fresh optimizer. With `is_reload` the
    /// parameter replaces an already registered one of the same name
    /// and keeps that parameter's optimizer state.
    pub fn register_param(
        &mut self,
        param: Parameter,
        score_func: ScoreFn,
        is_reload: bool,
    ) -> anyhow::Result<usize> {
        let existing = self.index_of(param.name());

        let k = match (existing, is_reload) {
            (Some(k), true) => {
                let expected = self.params[k].dims();
                if param.dims() != expected {
                    return Err(ParamError::ShapeMismatch {
                        name: param.name().to_string(),
                        expected,
                        found: param.dims(),
                    }
                    .into());
                }
                self.params[k] = param;
                self.score_funcs[k] = score_func;
                k
            }
            (None, true) => {
                return Err(ParamError::UnknownParameter(param.name().to_string()).into());
            }
            (Some(_), false) => {
                return Err(ModelError::InvalidConfig(format!(
                    "{} registered twice in {}",
                    param.name(),
                    self.family
                ))
                .into());
            }
            (None, false) => {
                self.optimizers.push(self.optimizer_config.build(param.dims()));
                self.params.push(param);
                self.score_funcs.push(score_func);
                self.params.len() - 1
            }
        };

        self.refresh_snapshot();
        Ok(k)
    }

    fn refresh_snapshot(&mut self) {
        self.snapshot = ParamSnapshot::from_params(&self.params);
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name() == name)
    }

    pub fn n_params(&self) -> usize {
        self.params.len()
    }

    pub fn n_optimizers(&self) -> usize {
        self.optimizers.len()
    }

    pub fn n_score_funcs(&self) -> usize {
        self.score_funcs.len()
    }

    pub fn param(&self, k: usize) -> &Parameter {
        &self.params[k]
    }

    pub fn snapshot(&self) -> &ParamSnapshot {
        &self.snapshot
    }

    /// `rows x n_params` matrix of every score function at every
    /// coordinate of `z`
    pub fn grad_lq_matrix(&self, z: &Array1<f64>) -> Array2<f64> {
        let rows = z.len();
        let mut ret = Array2::zeros((rows, self.score_funcs.len()));
        for (k, score_func) in self.score_funcs.iter().enumerate() {
            for i in 0..rows {
                ret[[i, k]] = score_func(&self.snapshot, z, i);
            }
        }
        ret
    }

    /// One gradient estimate and optimizer step per parameter
    pub fn update(
        &mut self,
        scores: &[&Array2<f64>],
        log_p: &[f64],
        log_q: &[f64],
    ) -> anyhow::Result<GradStats> {
        let n_params = self.params.len();
        let nchunks = rayon::current_num_threads();
        let mut stats = GradStats::default();

        for k in 0..n_params {
            let est = grad_bbvi(scores, log_p, log_q, k, nchunks)?;
            stats += GradStats::from(&est);

            let dims = self.params[k].dims();
            if est.grad.len() != dims.0 * dims.1 {
                return Err(ParamError::ShapeMismatch {
                    name: self.params[k].name().to_string(),
                    expected: dims,
                    found: (est.grad.len(), 1),
                }
                .into());
            }
            let grad = est.grad.into_shape_with_order(dims)?;
            self.optimizers[k].step(self.params[k].value_mut(), &grad);
        }

        if n_params > 0 {
            stats /= n_params as f64;
        }
        self.refresh_snapshot();
        Ok(stats)
    }

    pub fn summary(&self) -> String {
        self.params
            .iter()
            .map(|p| {
                let vals = p
                    .constrained()
                    .iter()
                    .map(|x| format!("{:.4}", x))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("{}: [{}]", p.name(), vals)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn records(&self, prefix: &str) -> Vec<ParamRecord> {
        self.params
            .iter()
            .map(|p| ParamRecord::from_param(&join_name(prefix, p.name()), p))
            .collect()
    }

    pub fn load_records(&mut self, prefix: &str, records: &[ParamRecord]) -> anyhow::Result<()> {
        for k in 0..self.params.len() {
            let name = join_name(prefix, self.params[k].name());
            match records.iter().find(|r| r.name == name) {
                Some(rec) => {
                    let restored = rec.to_param()?;
                    let param = Parameter::new(
                        self.params[k].name(),
                        restored.value().clone(),
                        restored.link(),
                    );
                    let score_func = self.score_funcs[k].clone();
                    self.register_param(param, score_func, true)?;
                }
                None => warn!("no stored value for {}; keeping the initial value", name),
            }
        }
        Ok(())
    }
}

/// A hierarchical family: named sub-families sampled and updated
/// independently
#[derive(Default)]
pub struct CompositeVariational {
    components: BTreeMap<String, Box<dyn Variational>>,
}

impl CompositeVariational {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, q: Box<dyn Variational>) {
        self.components.insert(name.to_string(), q);
    }

    pub fn get(&self, name: &str) -> anyhow::Result<&dyn Variational> {
        self.components
            .get(name)
            .map(|q| q.as_ref())
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

impl Variational for CompositeVariational {
    fn family(&self) -> &'static str {
        "composite"
    }

    fn sample(&self, rng: &mut dyn RngCore) -> anyhow::Result<Latent> {
        let mut ret = BTreeMap::new();
        for (name, q) in self.components.iter() {
            ret.insert(name.clone(), q.sample(rng)?);
        }
        Ok(Nested::Named(ret))
    }

    fn log_q(&self, z: &Latent) -> anyhow::Result<f64> {
        z.named(self.family())?;
        let mut ret = 0.0;
        for (name, q) in self.components.iter() {
            ret += q.log_q(z.get(name)?)?;
        }
        Ok(ret)
    }

    fn grad_lq_matrix(&self, z: &Latent) -> anyhow::Result<Score> {
        z.named(self.family())?;
        let mut ret = BTreeMap::new();
        for (name, q) in self.components.iter() {
            ret.insert(name.clone(), q.grad_lq_matrix(z.get(name)?)?);
        }
        Ok(Nested::Named(ret))
    }

    fn update(
        &mut self,
        scores: &[&Score],
        log_p: &[f64],
        log_q: &[f64],
    ) -> anyhow::Result<GradStats> {
        let mut stats = GradStats::default();
        for (name, q) in self.components.iter_mut() {
            let sub_scores = scores
                .iter()
                .map(|&s| s.get(name))
                .collect::<anyhow::Result<Vec<_>>>()?;
            stats += q.update(&sub_scores, log_p, log_q)?;
        }
        if !self.components.is_empty() {
            stats /= self.components.len() as f64;
        }
        Ok(stats)
    }

    fn summary(&self) -> String {
        self.components
            .iter()
            .map(|(name, q)| {
                let body = q
                    .summary()
                    .lines()
                    .map(|l| format!("  {}", l))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("{}:\n{}", name, body)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn records(&self, prefix: &str) -> Vec<ParamRecord> {
        self.components
            .iter()
            .flat_map(|(name, q)| q.records(&join_name(prefix, name)))
            .collect()
    }

    fn load_records(&mut self, prefix: &str, records: &[ParamRecord]) -> anyhow::Result<()> {
        for (name, q) in self.components.iter_mut() {
            q.load_records(&join_name(prefix, name), records)?;
        }
        Ok(())
    }
}

/// Score matrices of a flat family from the samples of an iteration
pub(crate) fn leaf_scores<'a>(
    family: &'static str,
    scores: &[&'a Score],
) -> anyhow::Result<Vec<&'a Array2<f64>>> {
    scores.iter().map(|&s| s.leaf(family)).collect()
}
