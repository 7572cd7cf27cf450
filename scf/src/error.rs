//! Error type shared by the SCF host and the polarizable embedding.

use basis::cgto::BasisError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScfError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("multipole integrals not implemented for order {order} (maximum is 2)")]
    UnsupportedOrder { order: usize },

    #[error("{0}")]
    Unimplemented(String),

    #[error("induced moments not converged after {iterations} iterations (residual: {residual:.2e})")]
    InducedNotConverged { iterations: usize, residual: f64 },

    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("integral evaluation failed: {0}")]
    Integral(String),

    #[error(transparent)]
    Basis(#[from] BasisError),
}

pub type Result<T> = std::result::Result<T, ScfError>;
