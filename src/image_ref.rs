//! Image references.
//!
//! An [`ImageRef`] is an opaque handle to encoded image bytes. Two forms exist:
//!
//! - **Remote**: a URL (`http://`, `https://`, `file://`) or a plain filesystem
//!   path. Bytes are fetched when the image is decoded.
//! - **Inline**: the payload itself plus its MIME type, the Rust side of a
//!   `data:` URL. Every fit result is inline.
//!
//! The fitter and the slider treat both forms the same; only the backend's
//! byte loader cares which one it got.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageRefError {
    #[error("Not a data URL: missing 'data:' prefix")]
    NotDataUrl,
    #[error("Malformed data URL: no ',' separating header and payload")]
    MissingPayload,
    #[error("Only base64 data URLs are supported")]
    NotBase64,
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, PartialEq, Eq)]
pub enum ImageRef {
    Remote(String),
    Inline { mime: String, data: Vec<u8> },
}

impl ImageRef {
    pub fn remote(location: impl Into<String>) -> Self {
        Self::Remote(location.into())
    }

    pub fn inline(mime: impl Into<String>, data: Vec<u8>) -> Self {
        Self::Inline {
            mime: mime.into(),
            data,
        }
    }

    /// Parse a reference as a user or collaborator would hand it over:
    /// `data:` URLs become inline refs, anything else is remote.
    pub fn parse(s: &str) -> Result<Self, ImageRefError> {
        let trimmed = s.trim();
        if trimmed.starts_with("data:") {
            Self::from_data_url(trimmed)
        } else {
            Ok(Self::Remote(trimmed.to_string()))
        }
    }

    /// Decode a `data:<mime>[;param]*;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self, ImageRefError> {
        let rest = url.strip_prefix("data:").ok_or(ImageRefError::NotDataUrl)?;
        let (header, payload) = rest.split_once(',').ok_or(ImageRefError::MissingPayload)?;

        let mut parts = header.split(';');
        let mime = parts.next().unwrap_or_default().trim();
        if !parts.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return Err(ImageRefError::NotBase64);
        }

        // Line-wrapped payloads are common when data URLs pass through email or JSON.
        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let data = STANDARD.decode(compact)?;

        let mime = if mime.is_empty() {
            "application/octet-stream"
        } else {
            mime
        };
        Ok(Self::inline(mime, data))
    }

    /// Read a local file into an inline reference, tagging it with the sniffed MIME type.
    pub fn from_file(path: &Path) -> Result<Self, ImageRefError> {
        let data = std::fs::read(path)?;
        let mime = sniff_mime(&data).unwrap_or("application/octet-stream");
        Ok(Self::inline(mime, data))
    }

    /// Encode an inline reference as a `data:` URL. Remote refs have none.
    pub fn to_data_url(&self) -> Option<String> {
        match self {
            Self::Inline { mime, data } => {
                Some(format!("data:{mime};base64,{}", STANDARD.encode(data)))
            }
            Self::Remote(_) => None,
        }
    }

    pub fn mime(&self) -> Option<&str> {
        match self {
            Self::Inline { mime, .. } => Some(mime),
            Self::Remote(_) => None,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline { .. })
    }

    /// Payload bytes of an inline reference.
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Inline { data, .. } => Some(data),
            Self::Remote(_) => None,
        }
    }
}

/// Short form for logs and errors; inline payloads are never printed in full.
impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(location) => write!(f, "{location}"),
            Self::Inline { mime, data } => write!(f, "data:{mime} ({} bytes)", data.len()),
        }
    }
}

impl fmt::Debug for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(location) => f.debug_tuple("Remote").field(location).finish(),
            Self::Inline { mime, data } => f
                .debug_struct("Inline")
                .field("mime", mime)
                .field("len", &data.len())
                .finish(),
        }
    }
}

/// Detect the image type from leading magic bytes.
///
/// Only the three upload formats are recognised: JPEG, PNG and WebP.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        _ => None,
    }
}
