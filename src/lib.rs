//! # Photo Reframe
//!
//! Re-renders an edited photograph into fixed social-media formats (Instagram
//! portrait, square, landscape; Stories/Reels) by cover fitting: the image is
//! scaled until it fills the whole target, centered, and the overhang cropped.
//! No letterboxing, no distortion.
//!
//! Around the fitter sit the pieces of the photo editor it belongs to: a
//! before/after comparison slider model, sequencing of overlapping fit
//! requests, pre-upload checks, and storage plus validation of the API key for
//! the AI editing provider.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`formats`] | Named target formats and their exact pixel dimensions |
//! | [`image_ref`] | Image references: remote locations and inline `data:` URLs |
//! | [`imaging`] | Cover-fit geometry, the `image`-crate backend, remote fetch |
//! | [`session`] | Result view state; only the latest requested fit is applied |
//! | [`slider`] | Before/after comparison slider state machine |
//! | [`upload`] | Upload checks and the round trip to the editing webhook |
//! | [`credentials`] | API key storage, format check, and online check |
//! | [`config`] | `config.toml` loading, validation, and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Exact Output Dimensions
//!
//! A fit always produces exactly the format's width and height. Geometry is
//! computed in floating point ([`imaging::cover_placement`]) and rasterized
//! into an integer rectangle that reaches every canvas edge, so rounding never
//! leaves a background sliver.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, Lanczos3 resampling, and JPEG encoding all go through the `image`
//! crate. No system libraries are needed.
//!
//! ## Fits Read the Edited Image
//!
//! Every reformat reads the image currently displayed, not the original
//! upload. Reformatting twice therefore compounds crops; see
//! [`session::ResultView::source`].

pub mod config;
pub mod credentials;
pub mod formats;
pub mod image_ref;
pub mod imaging;
pub mod output;
pub mod session;
pub mod slider;
pub mod upload;
