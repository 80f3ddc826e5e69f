//! Run configuration read from a sectioned TOML file.
//!
//! ```toml
//! seed = 42
//! samples = 10
//! n_iterations = 1000
//! observations = true
//! data_file = "data.txt"
//! data_dimension = 2
//!
//! [p]
//! n_components = 3
//!
//! [q]
//! link_function = "softplus"
//! ```

use crate::errors::ModelError;
use crate::inference::InferenceConfig;

use log::info;
use matrix_param::{LinkFunction, OptimizerConfig, OptimizerKind};
use matrix_util::common_io::read_lines;
use matrix_util::{build_data, BatchOrder, DenseDataOps};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub seed: u64,
    /// Monte Carlo samples per iteration
    pub samples: usize,
    pub batch_size: usize,
    pub n_iterations: usize,
    pub print_every: usize,
    /// 0 means one thread per logical core
    pub n_threads: usize,
    pub observations: bool,
    pub data_type: String,
    pub data_file: Option<String>,
    pub data_dimension: usize,
    /// `seq` or `random`
    pub batch_order: String,
    pub learning_rate: f64,
    pub optimizer: String,
    pub show_progress: bool,
    pub param_in: Option<String>,
    pub param_out: Option<String>,
    /// constrained values as `name row column value` lines
    pub param_tsv: Option<String>,
    pub p: PriorConfig,
    pub q: PosteriorConfig,
}

/// Prior hyperparameters
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PriorConfig {
    pub n_components: usize,
    pub init_alpha: f64,
    pub init_scale: f64,
    pub likelihood_scale: Option<f64>,
}

/// Initial values of the variational family
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PosteriorConfig {
    pub link_function: String,
    pub init_alpha: f64,
    pub init_scale: f64,
    pub init_loc: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: 42,
            samples: 10,
            batch_size: 1,
            n_iterations: 100,
            print_every: 10,
            n_threads: 0,
            observations: false,
            data_type: "dense".to_string(),
            data_file: None,
            data_dimension: 1,
            batch_order: "seq".to_string(),
            learning_rate: 0.1,
            optimizer: "adagrad".to_string(),
            show_progress: false,
            param_in: None,
            param_out: None,
            param_tsv: None,
            p: PriorConfig::default(),
            q: PosteriorConfig::default(),
        }
    }
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            n_components: 2,
            init_alpha: 1.0,
            init_scale: 1.0,
            likelihood_scale: None,
        }
    }
}

impl Default for PosteriorConfig {
    fn default() -> Self {
        Self {
            link_function: "softplus".to_string(),
            init_alpha: 1.0,
            init_scale: 1.0,
            init_loc: 0.01,
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(config_file: &str) -> anyhow::Result<Self> {
        info!("reading configuration from {}", config_file);
        let lines = read_lines(config_file)?;
        Self::from_toml_str(&lines.join("\n"))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let fail = |msg: &str| -> anyhow::Result<()> {
            Err(ModelError::InvalidConfig(msg.to_string()).into())
        };

        if self.samples < 1 {
            return fail("samples must be at least 1");
        }
        if self.batch_size < 1 {
            return fail("batch_size must be at least 1");
        }
        if self.print_every < 1 {
            return fail("print_every must be at least 1");
        }
        if self.observations && self.data_file.is_none() {
            return fail("observations = true needs a data_file");
        }
        if BatchOrder::by_name(&self.batch_order).is_none() {
            return fail(&format!("unknown batch_order: {}", self.batch_order));
        }

        // surface registry errors at load time
        self.link()?;
        OptimizerKind::by_name(&self.optimizer)?;
        Ok(())
    }

    pub fn link(&self) -> anyhow::Result<LinkFunction> {
        LinkFunction::by_name(&self.q.link_function)
    }

    pub fn optimizer_config(&self) -> anyhow::Result<OptimizerConfig> {
        Ok(OptimizerConfig {
            kind: OptimizerKind::by_name(&self.optimizer)?,
            learning_rate: self.learning_rate,
        })
    }

    pub fn likelihood_scale(&self) -> f64 {
        self.p.likelihood_scale.unwrap_or(self.p.init_scale)
    }

    pub fn n_threads(&self) -> usize {
        if self.n_threads == 0 {
            num_cpus::get()
        } else {
            self.n_threads
        }
    }

    pub fn inference(&self) -> anyhow::Result<InferenceConfig> {
        let batch_order = BatchOrder::by_name(&self.batch_order).ok_or_else(|| {
            ModelError::InvalidConfig(format!("unknown batch_order: {}", self.batch_order))
        })?;

        Ok(InferenceConfig {
            seed: self.seed,
            samples: self.samples,
            batch_size: self.batch_size,
            n_iterations: self.n_iterations,
            print_every: self.print_every,
            n_threads: self.n_threads(),
            observations: self.observations,
            batch_order,
            show_progress: self.show_progress,
        })
    }

    /// The dense data named by `data_file`, if any
    pub fn load_data(&self) -> anyhow::Result<Option<Box<dyn DenseDataOps>>> {
        match self.data_file.as_ref() {
            Some(data_file) => {
                let data = build_data(&self.data_type, data_file)?;
                info!(
                    "read {} examples of dimension {} from {}",
                    data.n_examples(),
                    data.n_dim_y(),
                    data_file
                );
                if data.n_dim_y() != self.data_dimension {
                    return Err(ModelError::InvalidConfig(format!(
                        "data_dimension = {}, but {} has {} rows",
                        self.data_dimension,
                        data_file,
                        data.n_dim_y()
                    ))
                    .into());
                }
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }
}
