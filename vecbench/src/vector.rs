use rand::rngs::{SmallRng, StdRng};
use rand::{Rng, SeedableRng};
use std::fmt;
use std::num::NonZeroUsize;
use vecbench_core::MAX_PRECISION;

/// A query vector together with its text form (`[0.12,0.5,...]`).
///
/// The text form is built up front so that formatting never lands inside a timed query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryVector {
    values: Vec<f32>,
    literal: String,
}

impl QueryVector {
    pub fn new(values: Vec<f32>) -> Self {
        let literal = format!(
            "[{}]",
            values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",")
        );
        Self { values, literal }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn literal(&self) -> &str {
        &self.literal
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }
}

impl fmt::Display for QueryVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.literal)
    }
}

/// Generates fixed-dimension vectors with components drawn uniformly from `[0, 1]` and rounded to
/// `precision` decimal places. Precision is capped at [`MAX_PRECISION`].
pub struct VectorGenerator<R = SmallRng> {
    dimensions: usize,
    scale: f64,
    rng: R,
}

impl VectorGenerator<SmallRng> {
    pub fn new(dimensions: NonZeroUsize, precision: u32) -> Self {
        Self::with_rng(dimensions, precision, SmallRng::from_entropy())
    }
}

impl VectorGenerator<StdRng> {
    /// Reproducible sequence for a given seed, used when populating tables.
    pub fn seeded(dimensions: NonZeroUsize, precision: u32, seed: u64) -> Self {
        Self::with_rng(dimensions, precision, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> VectorGenerator<R> {
    pub fn with_rng(dimensions: NonZeroUsize, precision: u32, rng: R) -> Self {
        Self {
            dimensions: dimensions.get(),
            scale: 10f64.powi(precision.min(MAX_PRECISION) as i32),
            rng,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn generate_values(&mut self) -> Vec<f32> {
        (0..self.dimensions)
            .map(|_| {
                let v: f64 = self.rng.gen_range(0.0..=1.0);
                ((v * self.scale).round() / self.scale) as f32
            })
            .collect()
    }

    pub fn generate(&mut self) -> QueryVector {
        QueryVector::new(self.generate_values())
    }
}
