use crate::common_io::read_words;
use crate::errors::DataError;
use crate::traits::DenseDataOps;

use log::info;
use ndarray::prelude::*;
use rayon::prelude::*;

/// Dense `n_dim_y x n_examples` data held in memory
#[derive(Debug, Clone)]
pub struct DenseData {
    data: Array2<f64>,
}

impl DenseData {
    pub fn new(data: Array2<f64>) -> Self {
        Self { data }
    }

    /// Read a dense data file.
    ///
    /// The first two numbers are the row count `R` and the column
    /// count `C`, followed by `R * C` values in row-major order.
    /// Line breaks carry no meaning beyond separating words, and
    /// `.gz` files are decompressed on the fly.
    ///
    /// * `data_file` - file name--either gzipped or not
    pub fn from_file(data_file: &str) -> anyhow::Result<Self> {
        let malformed = |reason: String| DataError::Malformed {
            file: data_file.to_string(),
            reason,
        };

        let words = read_words(data_file)?;

        if words.len() < 2 {
            return Err(malformed("missing `rows cols` header".into()).into());
        }

        let nrows = words[0]
            .parse::<usize>()
            .map_err(|e| malformed(format!("row count `{}`: {}", words[0], e)))?;
        let ncols = words[1]
            .parse::<usize>()
            .map_err(|e| malformed(format!("column count `{}`: {}", words[1], e)))?;

        let values = &words[2..];
        if values.len() != nrows * ncols {
            return Err(malformed(format!(
                "expected {} x {} = {} values, found {}",
                nrows,
                ncols,
                nrows * ncols,
                values.len()
            ))
            .into());
        }

        let values = values
            .par_iter()
            .enumerate()
            .map(|(i, w)| {
                w.parse::<f64>()
                    .map_err(|e| malformed(format!("value #{} `{}`: {}", i, w, e)))
            })
            .collect::<Result<Vec<f64>, DataError>>()?;

        let data = Array2::from_shape_vec((nrows, ncols), values)?;
        info!("read {} x {} dense data from {}", nrows, ncols, data_file);
        Ok(Self { data })
    }
}

impl DenseDataOps for DenseData {
    fn n_examples(&self) -> usize {
        self.data.ncols()
    }

    fn n_dim_y(&self) -> usize {
        self.data.nrows()
    }

    fn get_mat(&self) -> &Array2<f64> {
        &self.data
    }

    fn slice_data(&self, example_ids: &[usize]) -> anyhow::Result<Array2<f64>> {
        let n_examples = self.n_examples();
        if let Some(&id) = example_ids.iter().find(|&&j| j >= n_examples) {
            return Err(DataError::ExampleOutOfRange { id, n_examples }.into());
        }
        Ok(self.data.select(Axis(1), example_ids))
    }

    fn transpose(&self) -> Box<dyn DenseDataOps> {
        Box::new(DenseData {
            data: self.data.t().to_owned(),
        })
    }

    fn transform(&mut self, func: &dyn Fn(f64) -> f64) {
        self.data.mapv_inplace(func);
    }
}

/// Construct a data source of the given kind. Only `"dense"` is
/// supported.
///
/// * `data_type` - kind of the data source
/// * `data_file` - file name--either gzipped or not
pub fn build_data(data_type: &str, data_file: &str) -> anyhow::Result<Box<dyn DenseDataOps>> {
    match data_type {
        "dense" => Ok(Box::new(DenseData::from_file(data_file)?)),
        _ => Err(DataError::UnsupportedDataType(data_type.to_string()).into()),
    }
}
