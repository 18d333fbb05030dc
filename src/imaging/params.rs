//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between [`operations`](super::operations), which decides what to
//! render, and the [`backend`](super::backend), which does the pixel work.
//!
//! - [`Quality`]: JPEG quality (1–100, default 95). Clamped on construction.
//! - [`Background`]: solid fill behind the drawn image (default white).
//! - [`FitParams`]: one cover fit: source, target size, quality, background.

use crate::image_ref::ImageRef;
use thiserror::Error;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    /// Build from a `0.0..=1.0` fraction, the scale browsers use for
    /// `toDataURL` quality.
    pub fn from_fraction(fraction: f32) -> Self {
        Self::new((fraction.clamp(0.0, 1.0) * 100.0).round() as u32)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(95)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Invalid color '{0}': expected #rgb or #rrggbb")]
pub struct ColorParseError(pub String);

/// Solid background color, visible only where the drawn image does not reach
/// (transparent source pixels or rounding slivers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Background(pub [u8; 3]);

impl Background {
    pub const WHITE: Background = Background([255, 255, 255]);

    /// Parse a CSS-style hex color (`#fff` or `#ffffff`).
    pub fn parse_hex(s: &str) -> Result<Self, ColorParseError> {
        let err = || ColorParseError(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(err)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }
        let channel = |i: usize, len: usize| u8::from_str_radix(&hex[i..i + len], 16);
        let rgb = match hex.len() {
            3 => [
                channel(0, 1).map_err(|_| err())? * 17,
                channel(1, 1).map_err(|_| err())? * 17,
                channel(2, 1).map_err(|_| err())? * 17,
            ],
            6 => [
                channel(0, 2).map_err(|_| err())?,
                channel(2, 2).map_err(|_| err())?,
                channel(4, 2).map_err(|_| err())?,
            ],
            _ => return Err(err()),
        };
        Ok(Self(rgb))
    }
}

impl Default for Background {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Parameters for a single cover-fit render.
#[derive(Debug, Clone, PartialEq)]
pub struct FitParams<'a> {
    pub source: &'a ImageRef,
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
    pub background: Background,
}
