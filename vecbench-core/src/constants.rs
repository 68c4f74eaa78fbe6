/// Number of nearest rows requested by every similarity query.
pub const DEFAULT_K: usize = 5;

/// Decimal places kept on generated vector components.
pub const DEFAULT_PRECISION: u32 = 2;

/// Beyond this many decimal places an `f64` carries no further digits.
pub const MAX_PRECISION: u32 = 15;

pub const DEFAULT_DB_PORT: u16 = 5432;

pub const DEFAULT_RESULTS_DIR: &str = "results";
