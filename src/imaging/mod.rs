//! The image fitter: cover-fit a source image into a fixed format.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageDecoder::dimensions`, EXIF orientation applied |
//! | **Fetch** | `reqwest` (blocking) for `http(s)://` references |
//! | **Cover fit** | Lanczos3 resize + composite onto a solid canvas |
//! | **Encode** | JPEG, quality 95 |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for cover geometry (unit testable)
//! - **Parameters**: Data structures describing a fit
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Fetch**: [`RemoteFetcher`] trait + [`HttpFetcher`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod fetch;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{CoverPlacement, DrawRect, SourceRect, cover_placement};
pub use fetch::{FetchError, HttpFetcher, RemoteFetcher};
pub use operations::{FitConfig, FitResult, fit, fit_all, get_dimensions, plan_fit, plan_placements};
pub use params::{Background, ColorParseError, FitParams, Quality};
pub use rust_backend::{RustBackend, render_cover};
