use ndarray::prelude::*;

/// Read-only access to a dense data matrix whose rows are features
/// and whose columns are examples
pub trait DenseDataOps: Send + Sync {
    /// number of examples (columns)
    fn n_examples(&self) -> usize;

    /// feature dimension (rows)
    fn n_dim_y(&self) -> usize;

    fn get_mat(&self) -> &Array2<f64>;

    /// Extract the columns `example_ids` in the given order as a
    /// `n_dim_y x example_ids.len()` matrix
    fn slice_data(&self, example_ids: &[usize]) -> anyhow::Result<Array2<f64>>;

    /// A new data source with rows and columns swapped
    fn transpose(&self) -> Box<dyn DenseDataOps>;

    /// Apply `func` to every element in place
    fn transform(&mut self, func: &dyn Fn(f64) -> f64);

    /// Indicator of training examples when the data carry a
    /// train/test split
    fn train_filter(&self) -> Option<&Array2<f64>> {
        None
    }
}
