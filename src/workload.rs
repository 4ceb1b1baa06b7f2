use serde::{Deserialize, Serialize};

use crate::matrix::MatrixPair;

/// Round input whose problem size can be reported and grown.
pub trait Dimensioned {
    fn size(&self) -> usize;
}

impl Dimensioned for MatrixPair {
    #[inline]
    fn size(&self) -> usize {
        MatrixPair::size(self)
    }
}

/// The computation a worker runs once per round.
///
/// Failures are reported for that worker and the worker still signals
/// completion, so one bad round cannot block the others.
pub trait Workload<T>: Send {
    type Output: Send;

    fn run(&mut self, input: &T) -> anyhow::Result<Self::Output>;
}

/// Summary of one matrix product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Product {
    pub size: usize,
    pub checksum: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiplyMode {
    /// One thread per worker, as many workers as configured.
    #[default]
    Sequential,
    /// Each worker additionally splits its product across the rayon pool.
    Parallel,
}

/// Multiplies the round's two operands.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatrixMultiply {
    mode: MultiplyMode,
}

impl MatrixMultiply {
    pub fn new(mode: MultiplyMode) -> Self {
        MatrixMultiply { mode }
    }
}

impl Workload<MatrixPair> for MatrixMultiply {
    type Output = Product;

    fn run(&mut self, input: &MatrixPair) -> anyhow::Result<Product> {
        let product = match self.mode {
            MultiplyMode::Sequential => input.a().multiply(input.b()),
            MultiplyMode::Parallel => input.a().par_multiply(input.b()),
        };
        Ok(Product {
            size: product.size(),
            checksum: product.checksum(),
        })
    }
}
