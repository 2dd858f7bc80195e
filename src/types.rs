//! Types specific to series-expansion

use std::fmt::Debug;

use num::traits::FloatConst;

/// Real scalar type used for coordinates, coefficients and kernel values.
pub trait RealScalar: num::Float + FloatConst + Debug + Send + Sync + 'static {}

impl<T: num::Float + FloatConst + Debug + Send + Sync + 'static> RealScalar for T {}

/// Errors raised when an expansion or its auxiliary data is used outside its configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ExpansionError {
    /// A catalog or kernel was requested for zero dimensions.
    #[error("Invalid dimension: {0}")]
    InvalidDimension(usize),
    /// Requested truncation order is larger than the catalog supports.
    #[error("Requested order {requested} exceeds the maximum order {maximum}")]
    OrderExceedsMaximum {
        /// Requested order
        requested: usize,
        /// Maximum order of the multi-index catalog
        maximum: usize,
    },
    /// The kernel bandwidth is not a positive finite number.
    #[error("Invalid bandwidth: {0}")]
    InvalidBandwidth(String),
    /// A point range does not fit into the point set.
    #[error("Invalid point range [{begin}, {end}) for {npoints} points")]
    InvalidRange {
        /// First point of the range
        begin: usize,
        /// One past the last point of the range
        end: usize,
        /// Number of points available
        npoints: usize,
    },
    /// Coordinates or expansions of the wrong dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the catalog
        expected: usize,
        /// Dimension that was supplied
        actual: usize,
    },
    /// The center of an expansion that already holds contributions cannot move.
    #[error("Cannot move the center of an expansion that holds contributions")]
    CenterFixed,
}

/// Result Type
pub type Result<T> = std::result::Result<T, ExpansionError>;
