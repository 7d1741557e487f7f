//! Error types for credential handling, image acquisition and transformation.

use std::time::Duration;

use crate::session::FlowStep;

/// Maximum length of a remote error message surfaced to the user.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors raised while acquiring the service credential.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    /// No host selector, no manual value and no environment default.
    #[error("no API key available; enter one or set GEMINI_API_KEY")]
    Missing,

    /// A manually entered key was not longer than the minimum.
    #[error("API key is too short (must be longer than {min} characters)")]
    TooShort {
        /// Minimum length the key must exceed.
        min: usize,
    },

    /// The host key selector failed or was dismissed.
    #[error("host key selection failed: {0}")]
    HostSelection(String),
}

/// Errors raised while accepting an uploaded file.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// The declared content type is not in the `image/` family.
    #[error("not an image file (declared type: {0})")]
    NotAnImage(String),

    /// The file could not be read.
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),

    /// A data URI could not be parsed or decoded.
    #[error("invalid data URI: {0}")]
    InvalidDataUri(String),

    /// Background decoding task was aborted.
    #[error("image decoding was interrupted")]
    Interrupted,
}

/// Errors raised by the transformation request service.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// The response carried no candidates.
    #[error("no candidates returned from the image service")]
    NoCandidates,

    /// The first candidate had no inline image part.
    #[error("the model responded but no image data was found")]
    NoImageInResponse,

    /// The service rejected the credential.
    #[error("API key rejected ({status}): {message}")]
    Unauthorized {
        /// HTTP status of the rejection.
        status: u16,
        /// Sanitized message from the service.
        message: String,
    },

    /// Prompt or output was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Suggested delay from the `Retry-After` header.
        retry_after: Option<Duration>,
    },

    /// Any other non-success response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Sanitized message from the service.
        message: String,
    },

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The in-flight request was cancelled.
    #[error("generation cancelled")]
    Cancelled,

    /// Unexpected payload shape or local failure.
    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl TransformError {
    /// Returns true when the failure means the credential itself was refused.
    pub fn is_credential_rejection(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Returns true if this error is likely transient and worth retrying by hand.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Network(_))
    }
}

/// Errors raised when an action is not valid in the current flow step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    /// The action is not allowed from this step.
    #[error("cannot {action} while {step}")]
    InvalidTransition {
        /// Step the session was in.
        step: FlowStep,
        /// Action that was attempted.
        action: &'static str,
    },

    /// No preset with the given id exists.
    #[error("unknown preset id {0}")]
    UnknownPreset(u32),

    /// Download requested with nothing to export.
    #[error("no result available to download")]
    NoResult,
}

/// Top-level error for the crate.
#[derive(Debug, thiserror::Error)]
pub enum MagicLensError {
    /// Credential acquisition failed.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Image acquisition failed.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Transformation failed.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Invalid flow transition.
    #[error(transparent)]
    Flow(#[from] FlowError),

    /// I/O error (e.g., saving the download).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, MagicLensError>;

/// Strips control characters and caps the length of a remote error message.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let cleaned: String = text.chars().filter(|c| !c.is_control()).collect();
    let trimmed = cleaned.trim();
    if trimmed.chars().count() <= MAX_ERROR_MESSAGE_LEN {
        return trimmed.to_string();
    }
    let truncated: String = trimmed.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
    format!("{truncated}...")
}

/// Parses a `Retry-After` header given in whole seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
