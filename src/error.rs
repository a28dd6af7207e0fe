use std::io;

/// Every fallible operation in the crate returns this error type, surfacing
/// each failure kind as a proper value instead of aborting the process.
/// Absence is deliberately not one of these variants: a missing
/// relationship between two nodes is returned as `Ok(None)` from
/// `contains_relationship_from_to`, never as an `Err`, since "not found" is
/// an ordinary outcome there, not a failure.
#[derive(thiserror::Error, Debug)]
pub enum GraphError {
    #[error("argument error: {0}")]
    Argument(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("cache capacity exhausted: every frame is pinned")]
    Capacity,

    #[error("invariant violation: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;

impl GraphError {
    pub fn argument(msg: impl Into<String>) -> Self {
        GraphError::Argument(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        GraphError::Invariant(msg.into())
    }
}
