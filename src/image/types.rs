//! Core image types: formats, data URIs, uploads and results.

use std::fmt;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::ImageError;

/// Image formats the transformation service distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    Png,
    /// JPEG format (lossy). Assumed when nothing else is detected.
    #[default]
    Jpeg,
    /// WebP format.
    WebP,
}

impl ImageFormat {
    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }
}

/// A `data:<mime>;base64,<payload>` string split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime_type: String,
    payload: String,
}

impl DataUri {
    /// Encodes raw bytes under the given MIME type.
    pub fn encode(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            payload: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Wraps an already base64-encoded payload.
    pub fn from_base64(mime_type: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            payload: payload.into(),
        }
    }

    /// Parses a base64 data URI.
    pub fn parse(uri: &str) -> Result<Self, ImageError> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| ImageError::InvalidDataUri("missing `data:` scheme".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ImageError::InvalidDataUri("missing `,` separator".into()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| ImageError::InvalidDataUri("only base64 payloads are supported".into()))?;
        Ok(Self::from_base64(mime_type, payload))
    }

    /// Returns the MIME type.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Returns the base64 payload without the scheme prefix.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Decodes the payload back into bytes.
    pub fn decode(&self) -> Result<Vec<u8>, ImageError> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.payload)
            .map_err(|e| ImageError::InvalidDataUri(e.to_string()))
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.payload)
    }
}

/// Metadata about the file the user supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// File name as supplied.
    pub name: String,
    /// Declared content type.
    pub content_type: String,
    /// Size in bytes.
    pub size: usize,
}

/// A validated upload with its preview encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    source: SourceFile,
    preview: DataUri,
}

impl UploadedImage {
    pub(crate) fn new(source: SourceFile, preview: DataUri) -> Self {
        Self { source, preview }
    }

    /// Returns metadata about the supplied file.
    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    /// Returns the full preview data URI string.
    pub fn preview_data_uri(&self) -> String {
        self.preview.to_string()
    }
}

/// Metadata about one transformation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Model used for generation.
    pub model: Option<String>,
    /// Round-trip duration in milliseconds.
    pub duration_ms: Option<u64>,
}

/// The transformed image, always labelled as PNG.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "generation result should be shown or downloaded"]
pub struct GenerationResult {
    image: DataUri,
    /// Generation metadata.
    pub metadata: GenerationMetadata,
}

impl GenerationResult {
    /// Wraps a base64 payload returned by the service as a PNG data URI.
    pub fn from_base64(payload: impl Into<String>, metadata: GenerationMetadata) -> Self {
        Self {
            image: DataUri::from_base64(ImageFormat::Png.mime_type(), payload),
            metadata,
        }
    }

    /// Returns the result as a `data:image/png;base64,...` string.
    pub fn result_data_uri(&self) -> String {
        self.image.to_string()
    }

    /// Returns the parsed data URI.
    pub fn image(&self) -> &DataUri {
        &self.image
    }

    /// Decodes the image bytes.
    pub fn bytes(&self) -> Result<Vec<u8>, ImageError> {
        self.image.decode()
    }
}
