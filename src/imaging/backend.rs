//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the fitter needs:
//! identify (pixel dimensions of a reference) and cover fit (render a source
//! into a fixed-size canvas and hand back the encoded result).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use the recording `MockBackend` in this module.

use super::params::FitParams;
use crate::image_ref::ImageRef;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    /// The source could not be turned into pixels: fetch failure, unreadable
    /// file, malformed payload, unsupported encoding.
    #[error("Failed to decode {reference}: {reason}")]
    Decode { reference: String, reason: String },
    #[error("Failed to encode result: {0}")]
    Encode(String),
}

impl BackendError {
    pub fn decode(image: &ImageRef, reason: impl ToString) -> Self {
        Self::Decode {
            reference: image.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Implementations must be `Sync`: [`fit_all`](super::operations::fit_all)
/// shares one backend across rayon workers.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, image: &ImageRef) -> Result<Dimensions, BackendError>;

    /// Render `params.source` onto a `params.width × params.height` canvas
    /// with cover scaling and return the encoded canvas as an inline ref.
    fn cover_fit(&self, params: &FitParams) -> Result<ImageRef, BackendError>;
}
