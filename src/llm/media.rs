use std::fmt;

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

pub fn normalize_image_mime_type(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" => "image/jpeg".to_string(),
        _ => lowered,
    }
}

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match normalize_image_mime_type(mime_type).as_str() {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/heic" | "image/heif" => "heic",
        "image/gif" => "gif",
        _ => "png",
    }
}

/// Raw image bytes plus the MIME type they are sent or received as.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImageData {
    pub fn new(bytes: Vec<u8>, mime_type: &str) -> Self {
        ImageData {
            bytes,
            mime_type: normalize_image_mime_type(mime_type),
        }
    }

    /// Sniffs the MIME type, falling back to PNG.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let mime_type = detect_mime_type(&bytes).unwrap_or_else(|| "image/png".to_string());
        ImageData::new(bytes, &mime_type)
    }

    pub fn from_base64(mime_type: &str, data: &str) -> Result<Self> {
        let bytes = general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|err| anyhow!("Invalid base64 image payload: {err}"))?;
        Ok(ImageData::new(bytes, mime_type))
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let rest = uri
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| anyhow!("Not a data URI"))?;
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| anyhow!("Data URI is missing its payload"))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| anyhow!("Only base64 data URIs are supported"))?;
        let mime_type = if mime_type.is_empty() {
            "image/png"
        } else {
            mime_type
        };
        ImageData::from_base64(mime_type, data)
    }

    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

/// Where an image can be fetched from: an inline `data:` URI for generated or
/// uploaded images, or a plain URL for stock placeholders.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageHandle(String);

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_data_uri() {
            let header = self.0.split(',').next().unwrap_or("data:");
            write!(f, "ImageHandle({header},<{} chars>)", self.0.len())
        } else {
            write!(f, "ImageHandle({})", self.0)
        }
    }
}

impl fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl ImageHandle {
    pub fn from_url(url: impl Into<String>) -> Self {
        ImageHandle(url.into())
    }

    pub fn from_image(image: &ImageData) -> Self {
        ImageHandle(image.to_data_uri())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_data_uri(&self) -> bool {
        self.0.starts_with("data:")
    }

    pub fn to_image_data(&self) -> Result<ImageData> {
        if !self.is_data_uri() {
            return Err(anyhow!("Image {} is not inline data", self.0));
        }
        ImageData::from_data_uri(&self.0)
    }
}

impl From<&ImageData> for ImageHandle {
    fn from(image: &ImageData) -> Self {
        ImageHandle::from_image(image)
    }
}
