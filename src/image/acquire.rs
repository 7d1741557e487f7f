//! Accepting user-supplied files and decoding them for preview.

use std::path::Path;

use crate::error::ImageError;
use crate::image::types::{DataUri, SourceFile, UploadedImage};

/// A file as handed over by a picker or a drop event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    /// File name.
    pub name: String,
    /// Content type declared by the file source.
    pub content_type: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl RawFile {
    /// Creates a file from in-memory contents.
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Reads a file from disk, declaring its content type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, declared_content_type(path), bytes))
    }

    /// Returns true if the declared content type is in the `image/` family.
    pub fn is_image(&self) -> bool {
        self.content_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

/// Maps a file extension to the content type a file picker would declare.
pub fn declared_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Validates a file and decodes it into an [`UploadedImage`].
///
/// Non-image files fail immediately with [`ImageError::NotAnImage`]. Encoding
/// runs on the blocking pool so the caller's task stays responsive.
pub async fn accept(file: RawFile) -> Result<UploadedImage, ImageError> {
    if !file.is_image() {
        tracing::warn!(
            name = %file.name,
            content_type = %file.content_type,
            "rejected non-image upload"
        );
        return Err(ImageError::NotAnImage(file.content_type));
    }

    let RawFile {
        name,
        content_type,
        bytes,
    } = file;
    let size = bytes.len();
    let mime = content_type.trim().to_ascii_lowercase();

    let preview = tokio::task::spawn_blocking(move || DataUri::encode(mime, &bytes))
        .await
        .map_err(|_| ImageError::Interrupted)?;

    tracing::debug!(name = %name, size, "decoded upload");

    Ok(UploadedImage::new(
        SourceFile {
            name,
            content_type,
            size,
        },
        preview,
    ))
}

/// Drag-and-drop target state. Only a drop carries a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropZone {
    active: bool,
}

impl DropZone {
    /// Creates an inactive drop zone.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while something is being dragged over the zone.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Marks the zone as a live drop target.
    pub fn drag_enter(&mut self) {
        self.active = true;
    }

    /// Clears the live drop target flag.
    pub fn drag_leave(&mut self) {
        self.active = false;
    }

    /// Ends the drag and hands over the first dropped file, if any.
    pub fn drop_files(&mut self, files: Vec<RawFile>) -> Option<RawFile> {
        self.active = false;
        files.into_iter().next()
    }
}
