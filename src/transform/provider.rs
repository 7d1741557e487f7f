//! Transformation provider trait.

use async_trait::async_trait;

use crate::credential::Credential;
use crate::error::TransformError;
use crate::image::{GenerationResult, UploadedImage};

/// A service that restyles an uploaded image according to an instruction.
///
/// Implementations issue exactly one remote call per invocation and never
/// retry on their own.
#[async_trait]
pub trait TransformProvider: Send + Sync {
    /// Transforms `image` according to `instruction`, authorized by `credential`.
    async fn transform(
        &self,
        image: &UploadedImage,
        instruction: &str,
        credential: &Credential,
    ) -> Result<GenerationResult, TransformError>;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str;
}
