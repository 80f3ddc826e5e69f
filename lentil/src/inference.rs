use crate::bbvi::GradStats;
use crate::config::Config;
use crate::errors::ModelError;
use crate::latent::{Latent, Score};
use crate::model::Model;
use crate::variational::Variational;

use indicatif::{ProgressBar, ProgressDrawTarget};
use log::{debug, info};
use matrix_param::io::{read_records, write_records, write_records_tsv};
use matrix_util::{BatchOrder, DenseDataOps, MinibatchSampler};
use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

/// Name prefix of the variational parameters in saved records
pub const PARAM_PREFIX: &str = "q";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InferenceConfig {
    pub seed: u64,
    pub samples: usize,
    pub batch_size: usize,
    pub n_iterations: usize,
    pub print_every: usize,
    pub n_threads: usize,
    pub observations: bool,
    pub batch_order: BatchOrder,
    pub show_progress: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            samples: 10,
            batch_size: 1,
            n_iterations: 100,
            print_every: 10,
            n_threads: 1,
            observations: false,
            batch_order: BatchOrder::Sequential,
            show_progress: false,
        }
    }
}

/// ELBO estimates of one iteration
#[derive(Debug, Clone, PartialEq)]
pub struct TrainStats {
    pub iteration: usize,
    /// one estimate per Monte Carlo sample
    pub elbo: Array1<f64>,
    pub grad: GradStats,
}

impl TrainStats {
    pub fn mean(&self) -> f64 {
        self.elbo.mean().unwrap_or(0.0)
    }

    pub fn sd(&self) -> f64 {
        if self.elbo.len() > 1 {
            self.elbo.std(1.0)
        } else {
            0.0
        }
    }
}

/// `(log p, log q)` of one latent draw.
///
/// The prior and variational terms are scaled by `ratio`; the data
/// log-likelihood of `x`, when given, is added to `log p`.
pub fn evaluate_log_densities<M, V>(
    model: &M,
    variational: &V,
    x: Option<ArrayView2<f64>>,
    ratio: f64,
    z: &Latent,
) -> anyhow::Result<(f64, f64)>
where
    M: Model + ?Sized,
    V: Variational + ?Sized,
{
    let mut log_p = ratio * model.log_p(z)?;
    let log_q = ratio * variational.log_q(z)?;
    if let Some(x) = x {
        log_p += model.log_lik(x, z)?;
    }
    Ok((log_p, log_q))
}

/// ELBO of the draw `z` on the examples `example_ids`. Scaled by
/// `n_examples / example_ids.len()` it is an unbiased estimate of the
/// full-data ELBO.
pub fn minibatch_elbo<M, V>(
    model: &M,
    variational: &V,
    data: &dyn DenseDataOps,
    example_ids: &[usize],
    z: &Latent,
) -> anyhow::Result<f64>
where
    M: Model + ?Sized,
    V: Variational + ?Sized,
{
    let ratio = example_ids.len() as f64 / data.n_examples() as f64;
    let x = data.slice_data(example_ids)?;
    let (log_p, log_q) = evaluate_log_densities(model, variational, Some(x.view()), ratio, z)?;
    Ok(log_p - log_q)
}

/// Whether the 1-based `iteration` is reported: the first one, then
/// every `print_every`-th after it
fn reports_at(iteration: usize, print_every: usize) -> bool {
    iteration > 0 && (iteration - 1) % print_every.max(1) == 0
}

struct SampleEval {
    score: Score,
    log_p: f64,
    log_q: f64,
}

/// Fits the parameters of `variational` to `model` by stochastic
/// gradient ascent on the ELBO
pub struct VariationalInference<M: Model, V: Variational> {
    config: InferenceConfig,
    model: M,
    variational: V,
    data: Option<Box<dyn DenseDataOps>>,
    sampler: Option<MinibatchSampler>,
    /// one stream per Monte Carlo sample
    rngs: Vec<StdRng>,
    pool: rayon::ThreadPool,
    ratio: f64,
    iteration: usize,
    state: EngineState,
}

impl<M: Model, V: Variational> VariationalInference<M, V> {
    pub fn new(
        config: InferenceConfig,
        model: M,
        variational: V,
        data: Option<Box<dyn DenseDataOps>>,
    ) -> anyhow::Result<Self> {
        if config.samples < 1 {
            return Err(ModelError::InvalidConfig("samples must be at least 1".into()).into());
        }
        if config.observations && data.is_none() {
            return Err(
                ModelError::InvalidConfig("observations = true needs a data set".into()).into(),
            );
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.n_threads.max(1))
            .build()?;

        let rngs = (0..config.samples)
            .map(|s| StdRng::seed_from_u64(config.seed.wrapping_add(s as u64)))
            .collect();

        let (sampler, ratio) = match data.as_ref() {
            Some(data) if config.observations && data.n_examples() > 0 => {
                if config.batch_size > data.n_examples() {
                    return Err(ModelError::InvalidConfig(format!(
                        "batch_size = {} exceeds the {} examples",
                        config.batch_size,
                        data.n_examples()
                    ))
                    .into());
                }
                let sampler = MinibatchSampler::new(
                    config.batch_order,
                    config.batch_size,
                    data.n_examples(),
                    config.seed.wrapping_add(config.samples as u64),
                );
                let ratio = config.batch_size as f64 / data.n_examples() as f64;
                (Some(sampler), ratio)
            }
            _ => (None, 1.0),
        };

        info!(
            "{} iterations, {} samples, {} threads, ratio {:.3e}",
            config.n_iterations,
            config.samples,
            pool.current_num_threads(),
            ratio
        );

        Ok(Self {
            config,
            model,
            variational,
            data,
            sampler,
            rngs,
            pool,
            ratio,
            iteration: 0,
            state: EngineState::Idle,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn variational(&self) -> &V {
        &self.variational
    }

    pub fn variational_mut(&mut self) -> &mut V {
        &mut self.variational
    }

    pub fn into_parts(self) -> (M, V) {
        (self.model, self.variational)
    }

    /// One iteration on the examples `example_ids`: draw every Monte
    /// Carlo sample, then update the variational parameters
    pub fn train_batch(&mut self, example_ids: &[usize]) -> anyhow::Result<TrainStats> {
        let x = match self.data.as_ref() {
            Some(data) if self.config.observations => Some(data.slice_data(example_ids)?),
            _ => None,
        };

        let model = &self.model;
        let variational = &self.variational;
        let ratio = self.ratio;
        let rngs = &mut self.rngs;

        // parameters are read-only until every sample is done
        let evals = self.pool.install(|| {
            rngs.par_iter_mut()
                .map(|rng| -> anyhow::Result<SampleEval> {
                    let z = variational.sample(rng)?;
                    let (log_p, log_q) = evaluate_log_densities(
                        model,
                        variational,
                        x.as_ref().map(|x| x.view()),
                        ratio,
                        &z,
                    )?;
                    let score = variational.grad_lq_matrix(&z)?;
                    Ok(SampleEval {
                        score,
                        log_p,
                        log_q,
                    })
                })
                .collect::<anyhow::Result<Vec<_>>>()
        })?;

        let scores: Vec<&Score> = evals.iter().map(|e| &e.score).collect();
        let log_p: Vec<f64> = evals.iter().map(|e| e.log_p).collect();
        let log_q: Vec<f64> = evals.iter().map(|e| e.log_q).collect();
        let elbo: Array1<f64> = log_p.iter().zip(log_q.iter()).map(|(p, q)| p - q).collect();

        let variational = &mut self.variational;
        let grad = self
            .pool
            .install(|| variational.update(&scores, &log_p, &log_q))?;

        self.iteration += 1;
        Ok(TrainStats {
            iteration: self.iteration,
            elbo,
            grad,
        })
    }

    /// Run all configured iterations
    pub fn train(&mut self) -> anyhow::Result<Vec<TrainStats>> {
        if self.state != EngineState::Idle {
            return Err(ModelError::InvalidConfig("train() can only run once".into()).into());
        }
        self.state = EngineState::Running;

        let n_iterations = self.config.n_iterations;
        let print_every = self.config.print_every.max(1);

        let pb = ProgressBar::new(n_iterations as u64);
        if !self.config.show_progress || log::log_enabled!(log::Level::Debug) {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }

        let mut trace = Vec::with_capacity(n_iterations);

        for _ in 0..n_iterations {
            let example_ids = match self.sampler.as_mut() {
                Some(sampler) => sampler.next_batch(),
                None => vec![],
            };

            let stats = self.train_batch(&example_ids)?;

            debug!(
                "[{}] |grad|^2 {:.3e}, MC variance {:.3e}",
                stats.iteration, stats.grad.grad_sq_norm, stats.grad.mc_variance
            );

            if reports_at(stats.iteration, print_every) {
                info!(
                    "Iteration {}, ELBO {:.3e}, std {:.3e}",
                    stats.iteration,
                    stats.mean(),
                    stats.sd()
                );
                self.variational.print();
            }

            pb.inc(1);
            trace.push(stats);
        }

        pb.finish_and_clear();
        self.state = EngineState::Done;
        Ok(trace)
    }
}

/// Load data and stored parameters as configured, train, then save
/// the learned parameters
pub fn run<M: Model, V: Variational>(
    config: &Config,
    model: M,
    variational: V,
) -> anyhow::Result<(V, Vec<TrainStats>)> {
    let data = config.load_data()?;
    let mut vi = VariationalInference::new(config.inference()?, model, variational, data)?;

    if let Some(param_in) = config.param_in.as_ref() {
        info!("restoring parameters from {}", param_in);
        let records = read_records(param_in)?;
        vi.variational_mut().load_records(PARAM_PREFIX, &records)?;
    }

    let trace = vi.train()?;

    if let Some(param_out) = config.param_out.as_ref() {
        write_records(&vi.variational().records(PARAM_PREFIX), param_out)?;
        info!("wrote parameters to {}", param_out);
    }

    if let Some(param_tsv) = config.param_tsv.as_ref() {
        write_records_tsv(&vi.variational().records(PARAM_PREFIX), param_tsv)?;
        info!("wrote parameter values to {}", param_tsv);
    }

    let (_, variational) = vi.into_parts();
    Ok((variational, trace))
}
