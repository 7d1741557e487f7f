//! Normalizes an image data URI into the inline payload the service expects.

use crate::image::ImageFormat;

/// Raw base64 image data plus the MIME type it is sent under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlinePayload<'a> {
    /// Format announced to the service.
    pub format: ImageFormat,
    /// Base64 payload with any `data:` prefix removed.
    pub data: &'a str,
}

impl<'a> InlinePayload<'a> {
    /// Splits a data URI (or a bare base64 string) into MIME type and payload.
    ///
    /// PNG and WebP are recognised from the prefix; everything else,
    /// including a missing prefix, is sent as JPEG.
    pub fn from_data_uri(image_data: &'a str) -> Self {
        let trimmed = image_data.trim_start();
        let lower_prefix: String = trimmed
            .chars()
            .take(16)
            .collect::<String>()
            .to_ascii_lowercase();

        let format = if lower_prefix.starts_with("data:image/png") {
            ImageFormat::Png
        } else if lower_prefix.starts_with("data:image/webp") {
            ImageFormat::WebP
        } else {
            ImageFormat::Jpeg
        };

        let data = if lower_prefix.starts_with("data:") {
            match trimmed.find(',') {
                Some(pos) => &trimmed[pos + 1..],
                None => trimmed,
            }
        } else {
            trimmed
        };

        Self { format, data }
    }

    /// Returns the MIME type string.
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}
