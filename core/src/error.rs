/// Error type shared by construction, stepping and checkpoint I/O.
///
/// Configuration errors are fatal: they come out of constructors and are
/// never retried. Shape errors guard the tensor contract at step boundaries.
/// NonFinite / Simplex are reported by `interface::check_state` and mean a
/// numerical defect, not an expected outcome.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NtmError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    Shape {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("non-finite value in {0}")]
    NonFinite(String),

    #[error("{head} attention left the simplex at batch {batch} (sum={sum}, min={min})")]
    Simplex {
        head: String,
        batch: usize,
        sum: f32,
        min: f32,
    },

    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint format error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NtmError>;

/// Shorthand for a length check on a flat buffer.
pub(crate) fn check_len(what: &'static str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(NtmError::Shape { what, expected: vec![expected], actual: vec![actual] });
    }
    Ok(())
}
