//! Error Types
//!
//! All presentation-pipeline operations report failure through
//! [`PresentError`]. Errors are synchronous return values; nothing is
//! retried internally.

use thiserror::Error;

/// Errors surfaced by the presentation pipeline
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PresentError {
    /// The native window descriptor failed bounds/size validation
    #[error("malformed native window descriptor: {0}")]
    MalformedDescriptor(&'static str),

    /// A remote call to the display service, producer channel, or
    /// graphics backend failed
    #[error("transport error: {0}")]
    Transport(String),

    /// An operation requiring the Ready state was invoked outside it
    #[error("presentation pipeline is not initialized")]
    NotReady,

    /// The configured slot count is zero or not a power of two
    #[error("invalid slot count {0}: must be a non-zero power of two")]
    BadSlotCount(u32),
}

impl PresentError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

/// Result type for presentation operations
pub type Result<T> = std::result::Result<T, PresentError>;
