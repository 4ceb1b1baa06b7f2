//! Square integer matrices: the default round payload.

use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::barrier::Round;

/// A dense, row-major `size × size` matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    size: usize,
    data: Vec<i64>,
}

/// Number of entries in a `size × size` matrix, or `None` if it does not fit
/// in `usize`.
#[inline]
pub fn checked_area(size: usize) -> Option<usize> {
    size.checked_mul(size)
}

#[inline]
fn area(size: usize) -> usize {
    match checked_area(size) {
        Some(area) => area,
        None => panic!("Matrix size {}x{} overflows usize", size, size),
    }
}

impl Matrix {
    /// Creates a matrix with every entry set to `value`.
    ///
    /// # Panics
    ///
    /// Panics if `size * size` overflows `usize`.
    pub fn filled(size: usize, value: i64) -> Self {
        Matrix {
            size,
            data: vec![value; area(size)],
        }
    }

    /// # Panics
    ///
    /// Panics if `size * size` overflows `usize`.
    pub fn from_fn(size: usize, mut f: impl FnMut(usize, usize) -> i64) -> Self {
        let mut data = Vec::with_capacity(area(size));
        for row in 0..size {
            for col in 0..size {
                data.push(f(row, col));
            }
        }
        Matrix { size, data }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// # Panics
    ///
    /// Panics if `row` or `col` is out of bounds.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> i64 {
        if row >= self.size || col >= self.size {
            panic!(
                "Index ({}, {}) out of bounds for {}x{} matrix",
                row, col, self.size, self.size
            );
        }
        self.data[row * self.size + col]
    }

    #[inline]
    pub fn row(&self, row: usize) -> &[i64] {
        &self.data[row * self.size..(row + 1) * self.size]
    }

    /// Wrapping sum of all entries.
    pub fn checksum(&self) -> i64 {
        self.data.iter().fold(0i64, |acc, &x| acc.wrapping_add(x))
    }

    /// `self × rhs`, single threaded. Arithmetic wraps on overflow.
    pub fn multiply(&self, rhs: &Matrix) -> Matrix {
        assert_eq!(self.size, rhs.size, "Matrix dimensions do not match");

        let n = self.size;
        let mut out = vec![0i64; area(n)];
        for (i, out_row) in out.chunks_mut(n.max(1)).enumerate().take(n) {
            multiply_row(self.row(i), rhs, out_row);
        }
        Matrix { size: n, data: out }
    }

    /// `self × rhs` with output rows computed in parallel on the rayon pool.
    pub fn par_multiply(&self, rhs: &Matrix) -> Matrix {
        assert_eq!(self.size, rhs.size, "Matrix dimensions do not match");

        let n = self.size;
        let mut out = vec![0i64; area(n)];
        out.par_chunks_mut(n.max(1))
            .enumerate()
            .take(n)
            .for_each(|(i, out_row)| multiply_row(self.row(i), rhs, out_row));
        Matrix { size: n, data: out }
    }
}

// i-k-j order keeps the inner loop on contiguous memory of both rhs and out.
#[inline]
fn multiply_row(lhs_row: &[i64], rhs: &Matrix, out_row: &mut [i64]) {
    for (k, &lhs) in lhs_row.iter().enumerate() {
        for (out, &r) in out_row.iter_mut().zip(rhs.row(k)) {
            *out = out.wrapping_add(lhs.wrapping_mul(r));
        }
    }
}

/// How the producer fills a new round's operands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FillPolicy {
    /// Every entry of A is `a`, every entry of B is `b`.
    Constant { a: i64, b: i64 },
    /// Uniform entries in `0..=max`, reproducible from `seed` and the round.
    Random { seed: u64, max: i64 },
}

impl Default for FillPolicy {
    fn default() -> Self {
        FillPolicy::Constant { a: 1, b: 2 }
    }
}

/// The two operands of one round. Both are always `size × size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixPair {
    a: Matrix,
    b: Matrix,
}

impl MatrixPair {
    /// # Panics
    ///
    /// Panics if the operands differ in size.
    pub fn new(a: Matrix, b: Matrix) -> Self {
        assert_eq!(a.size(), b.size(), "Operands must have matching dimensions");
        MatrixPair { a, b }
    }

    /// Builds the operands for `round` at the given size.
    pub fn generate(size: usize, fill: &FillPolicy, round: Round) -> Self {
        match *fill {
            FillPolicy::Constant { a, b } => {
                MatrixPair::new(Matrix::filled(size, a), Matrix::filled(size, b))
            }
            FillPolicy::Random { seed, max } => {
                let mut rng = StdRng::seed_from_u64(seed ^ round);
                let a = Matrix::from_fn(size, |_, _| rng.gen_range(0..=max));
                let b = Matrix::from_fn(size, |_, _| rng.gen_range(0..=max));
                MatrixPair::new(a, b)
            }
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.a.size()
    }

    #[inline]
    pub fn a(&self) -> &Matrix {
        &self.a
    }

    #[inline]
    pub fn b(&self) -> &Matrix {
        &self.b
    }
}
