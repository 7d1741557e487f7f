//! Image acquisition and the image types shared across the crate.

mod acquire;
mod types;

pub use acquire::{accept, declared_content_type, DropZone, RawFile};
pub use types::{
    DataUri, GenerationMetadata, GenerationResult, ImageFormat, SourceFile, UploadedImage,
};
