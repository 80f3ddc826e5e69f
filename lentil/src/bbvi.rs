//! Score-function (REINFORCE) estimate of the ELBO gradient.
//!
//! For `S` draws `z_s ~ q`,
//!
//! ```text
//! grad[i] = (1/S) sum_s score[i, s] * (log p(z_s) - log q(z_s))
//! ```
//!
//! estimates `E_q[d log q / dw_i * (log p - log q)]`, the gradient of
//! the ELBO with respect to the unconstrained coordinate `w_i`.

use crate::errors::ModelError;
use ndarray::prelude::*;
use rayon::prelude::*;
use std::ops::{AddAssign, DivAssign};

/// Monte Carlo gradient of one parameter and the variance of that
/// estimate, per coordinate
#[derive(Debug, Clone, PartialEq)]
pub struct GradEstimate {
    pub grad: Array1<f64>,
    pub var: Array1<f64>,
}

/// Summary of the gradient estimates behind one update. Adds up over
/// parameters and sub-families and is then averaged over the number
/// of parameter groups.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GradStats {
    /// squared norm of the gradient estimate
    pub grad_sq_norm: f64,
    /// average Monte Carlo variance over coordinates
    pub mc_variance: f64,
}

impl From<&GradEstimate> for GradStats {
    fn from(est: &GradEstimate) -> Self {
        Self {
            grad_sq_norm: est.grad.dot(&est.grad),
            mc_variance: est.var.mean().unwrap_or(0.0),
        }
    }
}

impl AddAssign for GradStats {
    fn add_assign(&mut self, other: Self) {
        self.grad_sq_norm += other.grad_sq_norm;
        self.mc_variance += other.mc_variance;
    }
}

impl DivAssign<f64> for GradStats {
    fn div_assign(&mut self, denom: f64) {
        self.grad_sq_norm /= denom;
        self.mc_variance /= denom;
    }
}

/// Sum `term(s)` over `s in 0..nsamples` in `nchunks` contiguous
/// chunks. Chunks run in parallel; partial sums are added in chunk
/// order, so the result only depends on `nchunks`.
fn chunked_sum<F>(nsamples: usize, nchunks: usize, dim: usize, term: F) -> Array1<f64>
where
    F: Fn(usize) -> Array1<f64> + Sync,
{
    let chunk_size = nsamples.div_ceil(nchunks.max(1)).max(1);
    let partial: Vec<Array1<f64>> = (0..nsamples)
        .step_by(chunk_size)
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|lb| {
            let ub = (lb + chunk_size).min(nsamples);
            let mut acc = Array1::zeros(dim);
            for s in lb..ub {
                acc += &term(s);
            }
            acc
        })
        .collect();

    partial
        .into_iter()
        .fold(Array1::zeros(dim), |acc, x| acc + x)
}

/// Score-function gradient of the `k`-th parameter
///
/// * `scores` - per-sample `rows x n_params` score matrices
/// * `log_p` - per-sample log joint density
/// * `log_q` - per-sample log variational density
/// * `k` - parameter index (column of the score matrices)
/// * `nchunks` - number of parallel partial sums
pub fn grad_bbvi(
    scores: &[&Array2<f64>],
    log_p: &[f64],
    log_q: &[f64],
    k: usize,
    nchunks: usize,
) -> anyhow::Result<GradEstimate> {
    let nsamples = scores.len();

    if nsamples == 0 {
        return Err(ModelError::SampleMismatch("no samples".into()).into());
    }

    if log_p.len() != nsamples || log_q.len() != nsamples {
        return Err(ModelError::SampleMismatch(format!(
            "{} score matrices, {} log_p, {} log_q",
            nsamples,
            log_p.len(),
            log_q.len()
        ))
        .into());
    }

    let dim = scores[0].nrows();
    if let Some(s) = scores.iter().position(|x| x.nrows() != dim || k >= x.ncols()) {
        return Err(ModelError::SampleMismatch(format!(
            "score matrix #{} has shape {:?}, expected {} rows and column {}",
            s,
            scores[s].dim(),
            dim,
            k
        ))
        .into());
    }

    // h[i, s] = score[i, s] * (log p - log q)
    let h = |s: usize| -> Array1<f64> { &scores[s].column(k) * (log_p[s] - log_q[s]) };

    let n = nsamples as f64;
    let grad = chunked_sum(nsamples, nchunks, dim, h) / n;

    let var = if nsamples > 1 {
        let ss = chunked_sum(nsamples, nchunks, dim, |s| {
            let d = h(s) - &grad;
            &d * &d
        });
        ss / (n * (n - 1.0))
    } else {
        Array1::zeros(dim)
    };

    Ok(GradEstimate { grad, var })
}
