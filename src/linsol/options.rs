//! Configuration for factorization backends

/// Numerical options passed to a backend factory
#[derive(Debug, Clone, PartialEq)]
pub struct LinsolOptions {
    /// Relative pivot threshold (default: 1e-12)
    ///
    /// Numeric factorization fails when a pivot magnitude does not exceed
    /// `pivot_threshold * max |a_ij|`.
    pub pivot_threshold: f64,

    /// Relative tolerance for numerical rank decisions (default: 1e-10)
    ///
    /// A diagonal entry of a rank-revealing factor counts towards the rank
    /// when its magnitude exceeds `rank_tolerance * max |diag|`.
    pub rank_tolerance: f64,
}

impl Default for LinsolOptions {
    fn default() -> Self {
        Self {
            pivot_threshold: 1e-12,
            rank_tolerance: 1e-10,
        }
    }
}

impl LinsolOptions {
    /// Options with a custom pivot threshold
    pub fn with_pivot_threshold(threshold: f64) -> Self {
        Self {
            pivot_threshold: threshold,
            ..Default::default()
        }
    }

    /// Options with a custom rank tolerance
    pub fn with_rank_tolerance(tolerance: f64) -> Self {
        Self {
            rank_tolerance: tolerance,
            ..Default::default()
        }
    }
}
