use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Example indexes of a minibatch. The order defines the column
/// order of the sliced data.
pub type ExampleIds = Vec<usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOrder {
    /// consecutive examples, wrapping around the end of the data
    Sequential,
    /// uniform draws with replacement
    Random,
}

impl BatchOrder {
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "seq" | "sequential" => Some(Self::Sequential),
            "random" | "rand" => Some(Self::Random),
            _ => None,
        }
    }
}

/// Generates the example ids of successive minibatches
pub struct MinibatchSampler {
    order: BatchOrder,
    batch_size: usize,
    n_examples: usize,
    cursor: usize,
    rng: StdRng,
}

impl MinibatchSampler {
    /// * `order` - sequential or random
    /// * `batch_size` - number of ids per batch
    /// * `n_examples` - total number of examples
    /// * `seed` - seed of the stream used by random batches
    pub fn new(order: BatchOrder, batch_size: usize, n_examples: usize, seed: u64) -> Self {
        Self {
            order,
            batch_size,
            n_examples,
            cursor: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn n_examples(&self) -> usize {
        self.n_examples
    }

    /// The next minibatch; empty when there are no examples
    pub fn next_batch(&mut self) -> ExampleIds {
        if self.n_examples == 0 {
            return vec![];
        }
        match self.order {
            BatchOrder::Sequential => {
                self.cursor %= self.n_examples;
                let mut ids = Vec::with_capacity(self.batch_size);
                for _ in 0..self.batch_size {
                    ids.push(self.cursor);
                    self.cursor = (self.cursor + 1) % self.n_examples;
                }
                ids
            }
            BatchOrder::Random => (0..self.batch_size)
                .map(|_| self.rng.random_range(0..self.n_examples))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_wraps_around() {
        let mut sampler = MinibatchSampler::new(BatchOrder::Sequential, 2, 3, 0);
        assert_eq!(sampler.next_batch(), vec![0, 1]);
        assert_eq!(sampler.next_batch(), vec![2, 0]);
        assert_eq!(sampler.next_batch(), vec![1, 2]);
    }

    #[test]
    fn random_is_seeded_and_in_range() {
        let mut a = MinibatchSampler::new(BatchOrder::Random, 50, 7, 42);
        let mut b = MinibatchSampler::new(BatchOrder::Random, 50, 7, 42);
        let ids = a.next_batch();
        assert_eq!(ids, b.next_batch());
        assert_eq!(ids.len(), 50);
        assert!(ids.iter().all(|&j| j < 7));
    }
}
