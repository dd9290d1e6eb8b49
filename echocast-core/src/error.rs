//! Stage error taxonomy
//!
//! Collaborator failures are terminal for the job but never for the worker
//! process: the runner records them verbatim into the job record and exits
//! cleanly.

use thiserror::Error;

/// A failure in one pipeline stage.
///
/// The message is preserved verbatim for diagnosis; no retry happens at
/// this layer (retry policy, if any, belongs to the collaborator).
#[derive(Debug, Error)]
pub enum StageError {
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("script generation failed: {0}")]
    Generation(String),
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
    #[error("publish failed: {0}")]
    Publish(String),
}

impl StageError {
    /// Stable kind tag for this error, used in job records and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::Fetch(_) => "FetchError",
            StageError::Generation(_) => "GenerationError",
            StageError::Synthesis(_) => "SynthesisError",
            StageError::Publish(_) => "PublishError",
        }
    }
}
