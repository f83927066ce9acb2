//! Cache error taxonomy.
//!
//! Infrastructure failures (remote unreachable, serialization trouble,
//! timeouts) are recovered inside the engine and never cross the public
//! API; these types exist for internal plumbing and for invalidation sinks
//! that need to report a failed task. Compute failures are the caller's
//! error type and pass through untouched.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("remote cache operation failed: {message}")]
    Remote { message: String },
    #[error("invalidation failed: {message}")]
    Invalidation { message: String },
}

impl CacheError {
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    pub fn invalidation(message: impl Into<String>) -> Self {
        Self::Invalidation {
            message: message.into(),
        }
    }
}
