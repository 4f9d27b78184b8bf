use thiserror::Error;

/// Failures of the blend engine and the voice graph.
///
/// None of these reach the user as a dead pad: the coordinator answers
/// every ML failure with a bilinear blend, and audio graph failures are
/// swallowed during teardown.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BlendError {
    /// The latent model could not be prepared. Fallback for the session.
    #[error("latent model unavailable: {0}")]
    ModelUnavailable(String),

    /// Encoding the corners failed. Fallback for the session.
    #[error("encode failed: {0}")]
    EncodeFailure(String),

    /// A single decode failed. Fallback for that position only.
    #[error("decode failed: {0}")]
    DecodeFailure(String),

    #[error("audio graph error: {0}")]
    AudioGraphError(String),
}
