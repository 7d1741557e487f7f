#![warn(missing_docs)]
//! MagicLens - apply preset generative-AI styles to photos.
//!
//! The crate models a small interactive flow: obtain an API key, pick a
//! style preset, upload a photo, send both to the Gemini image API and
//! view or download the transformed result.
//!
//! # Quick Start
//!
//! ```no_run
//! use magiclens::{CredentialHolder, GeminiTransformer, RawFile, Session};
//!
//! #[tokio::main]
//! async fn main() -> magiclens::Result<()> {
//!     let provider = GeminiTransformer::builder().build()?;
//!     let mut session = Session::new(provider, CredentialHolder::from_env());
//!     session.check_credential().await;
//!
//!     session.select_preset(5)?;
//!     session.accept_upload(RawFile::from_path("me.jpg").await?).await?;
//!     session.generate().await;
//!
//!     if session.result().is_some() {
//!         let path = session.download(".").await?;
//!         println!("saved {}", path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Components
//!
//! - [`credential`]: session-scoped API key with host, manual and
//!   environment sources.
//! - [`image`]: file validation, data URI encoding, drop-zone state.
//! - [`presets`]: the fixed catalog of style presets.
//! - [`transform`]: request shaping and the Gemini provider.
//! - [`session`]: the flow state machine tying everything together.

pub mod credential;
mod error;
pub mod image;
pub mod presets;
pub mod session;
pub mod transform;

// Re-export error types at crate root
pub use error::{CredentialError, FlowError, ImageError, MagicLensError, Result, TransformError};

pub use credential::{Credential, CredentialHolder, CredentialOrigin, HostKeySelector};
pub use image::{DataUri, DropZone, GenerationResult, RawFile, UploadedImage};
pub use presets::{Preset, PresetCategory, PresetIcon};
pub use session::{FlowSnapshot, FlowStep, GenerationOutcome, PendingGeneration, Session};
pub use transform::{GeminiModel, GeminiTransformer, GeminiTransformerBuilder, TransformProvider};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::credential::{CredentialHolder, CredentialOrigin};
    pub use crate::error::{MagicLensError, Result};
    pub use crate::image::{RawFile, UploadedImage};
    pub use crate::session::{FlowStep, Session};
    pub use crate::transform::{GeminiTransformer, TransformProvider};
}
