//! Error types shared by the capture engine and the registry.

/// Configuration errors raised synchronously by the policy normalizers.
///
/// These are programmer errors: a stream is never left half-configured by
/// one, and runtime hook failures are never reported through this type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// An option value could not be normalized (limit, clock, hook, patch).
    #[error("capture invalid config: {0}")]
    InvalidConfig(String),

    /// A stream name was empty, non-string, or otherwise unusable.
    #[error("capture invalid name: {0}")]
    InvalidName(String),
}

