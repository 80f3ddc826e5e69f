//! Per-parameter stochastic gradient *ascent* rules.
//!
//! Every registered parameter owns one optimizer, so any state
//! (accumulated squared gradients, moments) belongs to exactly one
//! parameter matrix.

use crate::errors::ParamError;
use log::warn;
use ndarray::prelude::*;

const EPS: f64 = 1e-8;

pub trait Optimizer: Send + Sync {
    /// Move `param` along `grad` (same shape)
    fn step(&mut self, param: &mut Array2<f64>, grad: &Array2<f64>);

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    Sgd,
    AdaGrad,
    RmsProp,
    Adam,
}

impl OptimizerKind {
    pub fn by_name(name: &str) -> anyhow::Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sgd" => Ok(Self::Sgd),
            "adagrad" => Ok(Self::AdaGrad),
            "rmsprop" => Ok(Self::RmsProp),
            "adam" => Ok(Self::Adam),
            _ => Err(ParamError::InvalidOptimizerName(name.to_string()).into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerConfig {
    pub kind: OptimizerKind,
    pub learning_rate: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            kind: OptimizerKind::AdaGrad,
            learning_rate: 0.1,
        }
    }
}

impl OptimizerConfig {
    /// A fresh optimizer for a parameter of shape `dims`
    pub fn build(&self, dims: (usize, usize)) -> Box<dyn Optimizer> {
        let lr = self.learning_rate;
        match self.kind {
            OptimizerKind::Sgd => Box::new(Sgd { lr }),
            OptimizerKind::AdaGrad => Box::new(AdaGrad {
                lr,
                sum_sq: Array2::zeros(dims),
            }),
            OptimizerKind::RmsProp => Box::new(RmsProp {
                lr,
                decay: 0.9,
                mean_sq: Array2::zeros(dims),
            }),
            OptimizerKind::Adam => Box::new(Adam {
                lr,
                beta1: 0.9,
                beta2: 0.999,
                m: Array2::zeros(dims),
                v: Array2::zeros(dims),
                t: 0,
            }),
        }
    }
}

/// Apply `update(i, g)` to every finite gradient coordinate; the
/// others stay where they are.
fn for_each_finite(
    name: &str,
    param: &mut Array2<f64>,
    grad: &Array2<f64>,
    mut update: impl FnMut((usize, usize), f64) -> f64,
) {
    let mut skipped = 0;
    for ((ij, w), &g) in param.indexed_iter_mut().zip(grad.iter()) {
        if g.is_finite() {
            *w += update(ij, g);
        } else {
            skipped += 1;
        }
    }
    if skipped > 0 {
        warn!("{}: skipped {} non-finite gradient coordinates", name, skipped);
    }
}

pub struct Sgd {
    lr: f64,
}

impl Optimizer for Sgd {
    fn step(&mut self, param: &mut Array2<f64>, grad: &Array2<f64>) {
        let lr = self.lr;
        for_each_finite(self.name(), param, grad, |_, g| lr * g);
    }

    fn name(&self) -> &'static str {
        "sgd"
    }
}

pub struct AdaGrad {
    lr: f64,
    sum_sq: Array2<f64>,
}

impl Optimizer for AdaGrad {
    fn step(&mut self, param: &mut Array2<f64>, grad: &Array2<f64>) {
        let lr = self.lr;
        let sum_sq = &mut self.sum_sq;
        for_each_finite("adagrad", param, grad, |ij, g| {
            sum_sq[ij] += g * g;
            lr * g / (sum_sq[ij].sqrt() + EPS)
        });
    }

    fn name(&self) -> &'static str {
        "adagrad"
    }
}

pub struct RmsProp {
    lr: f64,
    decay: f64,
    mean_sq: Array2<f64>,
}

impl Optimizer for RmsProp {
    fn step(&mut self, param: &mut Array2<f64>, grad: &Array2<f64>) {
        let (lr, decay) = (self.lr, self.decay);
        let mean_sq = &mut self.mean_sq;
        for_each_finite("rmsprop", param, grad, |ij, g| {
            mean_sq[ij] = decay * mean_sq[ij] + (1.0 - decay) * g * g;
            lr * g / (mean_sq[ij].sqrt() + EPS)
        });
    }

    fn name(&self) -> &'static str {
        "rmsprop"
    }
}

pub struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    m: Array2<f64>,
    v: Array2<f64>,
    t: i32,
}

impl Optimizer for Adam {
    fn step(&mut self, param: &mut Array2<f64>, grad: &Array2<f64>) {
        self.t += 1;
        let (beta1, beta2) = (self.beta1, self.beta2);
        // bias correction folded into the step size
        let step_size =
            self.lr * (1.0 - beta2.powi(self.t)).sqrt() / (1.0 - beta1.powi(self.t));
        let (m, v) = (&mut self.m, &mut self.v);
        for_each_finite("adam", param, grad, |ij, g| {
            m[ij] = beta1 * m[ij] + (1.0 - beta1) * g;
            v[ij] = beta2 * v[ij] + (1.0 - beta2) * g * g;
            step_size * m[ij] / (v[ij].sqrt() + EPS)
        });
    }

    fn name(&self) -> &'static str {
        "adam"
    }
}
