//! Structured error types for CMC evaluation.

use thiserror::Error;

/// Unified error type for all CMC operations.
#[derive(Debug, Error)]
pub enum CmcError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error (malformed input data)
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid input (bad arguments, out-of-range values)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A cumulative value was requested for a rank outside `[1, n_ranks]`.
    #[error("rank {rank} is outside the computed window [1, {n_ranks}]")]
    OutOfRange { rank: usize, n_ranks: usize },

    /// The similarity matrix violates a structural invariant.
    #[error("invalid similarity matrix: {0}")]
    InvalidMatrix(String),

    /// A curve accessor was used before the curve was computed.
    #[error("CMC curve has not been computed")]
    NotComputed,

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the CMC crates.
pub type Result<T> = std::result::Result<T, CmcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_message_names_window() {
        let err = CmcError::OutOfRange { rank: 7, n_ranks: 5 };
        assert_eq!(err.to_string(), "rank 7 is outside the computed window [1, 5]");
    }

    #[test]
    fn io_error_converts() {
        fn open() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"))?;
            Ok(())
        }
        assert!(matches!(open(), Err(CmcError::Io(_))));
    }
}
