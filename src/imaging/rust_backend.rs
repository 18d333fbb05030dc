//! Pure Rust image backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Load bytes (inline) | payload of the [`ImageRef`] itself |
//! | Load bytes (path, `file://`) | `std::fs::read` |
//! | Load bytes (`http(s)://`) | [`RemoteFetcher`] (reqwest) |
//! | Decode (JPEG, PNG, WebP) | `ImageReader::into_decoder` + `DynamicImage::from_decoder` |
//! | EXIF orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Identify | `ImageDecoder::dimensions` (header only), axes swapped for 90° orientations |
//! | Scale | `image::imageops::resize` with `Lanczos3` filter |
//! | Composite | `image::imageops::replace` / `overlay` onto a solid canvas |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::cover_placement;
use super::fetch::{RemoteFetcher, is_network_url};
use super::params::{Background, FitParams, Quality};
use crate::image_ref::ImageRef;
use image::imageops::{self, FilterType};
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader, Rgba, RgbaImage, RgbImage};
use std::borrow::Cow;
use std::io::Cursor;
use std::path::Path;

/// MIME type of every fit result.
pub const OUTPUT_MIME: &str = "image/jpeg";

/// Largest scaled intermediate, as a multiple of the canvas area, before the
/// source is trimmed to its visible window first.
const MAX_OVERSCAN: u64 = 4;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// Remote `http(s)://` references need a fetcher; without one they fail to
/// decode. Local paths and inline references always work.
#[derive(Default)]
pub struct RustBackend {
    fetcher: Option<Box<dyn RemoteFetcher>>,
}

impl RustBackend {
    pub fn new() -> Self {
        Self { fetcher: None }
    }

    pub fn with_fetcher(fetcher: impl RemoteFetcher + 'static) -> Self {
        Self {
            fetcher: Some(Box::new(fetcher)),
        }
    }

    /// Resolve a reference to its encoded bytes.
    fn load_bytes<'a>(&self, image: &'a ImageRef) -> Result<Cow<'a, [u8]>, BackendError> {
        match image {
            ImageRef::Inline { data, .. } => Ok(Cow::Borrowed(data)),
            ImageRef::Remote(location) if is_network_url(location) => {
                let fetcher = self
                    .fetcher
                    .as_ref()
                    .ok_or_else(|| BackendError::decode(image, "network fetching is disabled"))?;
                fetcher
                    .fetch(location)
                    .map(Cow::Owned)
                    .map_err(|e| BackendError::decode(image, e))
            }
            ImageRef::Remote(location) => {
                let path = location.strip_prefix("file://").unwrap_or(location);
                std::fs::read(Path::new(path))
                    .map(Cow::Owned)
                    .map_err(|e| BackendError::decode(image, e))
            }
        }
    }

    /// Load and decode a reference into pixels, upright.
    ///
    /// The EXIF orientation tag is applied, so the pixels match what a browser
    /// displays for the same file.
    pub fn decode(&self, image: &ImageRef) -> Result<DynamicImage, BackendError> {
        let bytes = self.load_bytes(image)?;
        let mut decoder = ImageReader::new(Cursor::new(bytes.as_ref()))
            .with_guessed_format()
            .map_err(|e| BackendError::decode(image, e))?
            .into_decoder()
            .map_err(|e| BackendError::decode(image, e))?;
        let orientation = read_orientation(&mut decoder);
        let mut decoded =
            DynamicImage::from_decoder(decoder).map_err(|e| BackendError::decode(image, e))?;
        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(BackendError::decode(image, "image has no pixels"));
        }
        decoded.apply_orientation(orientation);
        Ok(decoded)
    }
}

/// Orientation recorded in the file's EXIF block. Missing or unreadable
/// metadata means the pixels are stored upright.
fn read_orientation(decoder: &mut impl ImageDecoder) -> Orientation {
    match decoder.orientation() {
        Ok(orientation) => orientation,
        Err(e) => {
            log::debug!("ignoring unreadable EXIF orientation: {e}");
            Orientation::NoTransforms
        }
    }
}

/// Whether `orientation` turns the image a quarter turn, swapping its axes.
pub fn swaps_axes(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH
    )
}

/// Draw `source` onto a `target`-sized canvas filled with `background`,
/// scaled to cover and centered.
///
/// Sources with an alpha channel are composited over the background the way a
/// canvas `drawImage` would; opaque sources replace the canvas pixels outright.
/// A source that already has the target's dimensions is copied unscaled, so
/// re-fitting a fitted image is pixel-identical.
pub fn render_cover(source: &DynamicImage, target: (u32, u32), background: Background) -> RgbImage {
    let (width, height) = target;
    let [r, g, b] = background.0;
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255]));

    let placement = cover_placement((source.width(), source.height()), target);
    log::debug!(
        "cover {}x{} → {}x{}: scale {:.4}, origin ({:.2}, {:.2})",
        source.width(),
        source.height(),
        width,
        height,
        placement.scale,
        placement.x,
        placement.y
    );

    let (layer, x, y) = if placement.is_identity() {
        (source.to_rgba8(), 0, 0)
    } else {
        let rect = placement.draw_rect(target);
        let canvas_area = width as u64 * height as u64;
        let window = placement.visible_source_rect((source.width(), source.height()), target);
        let trims = window.width < source.width() || window.height < source.height();
        if trims && rect.width as u64 * rect.height as u64 > MAX_OVERSCAN * canvas_area {
            // Extreme aspect ratios: scale only the visible window.
            let cropped = source.crop_imm(window.x, window.y, window.width, window.height);
            return render_cover(&cropped, target, background);
        }
        let scaled = imageops::resize(&source.to_rgba8(), rect.width, rect.height, FilterType::Lanczos3);
        (scaled, rect.x, rect.y)
    };

    if source.color().has_alpha() {
        imageops::overlay(&mut canvas, &layer, x, y);
    } else {
        imageops::replace(&mut canvas, &layer, x, y);
    }

    DynamicImage::ImageRgba8(canvas).to_rgb8()
}

/// Encode an RGB canvas as JPEG.
pub fn encode_jpeg(canvas: RgbImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.value());
    DynamicImage::ImageRgb8(canvas)
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::Encode(e.to_string()))?;
    Ok(buf)
}

impl ImageBackend for RustBackend {
    fn identify(&self, image: &ImageRef) -> Result<Dimensions, BackendError> {
        let bytes = self.load_bytes(image)?;
        let mut decoder = ImageReader::new(Cursor::new(bytes.as_ref()))
            .with_guessed_format()
            .map_err(|e| BackendError::decode(image, e))?
            .into_decoder()
            .map_err(|e| BackendError::decode(image, e))?;
        let (width, height) = decoder.dimensions();
        if swaps_axes(read_orientation(&mut decoder)) {
            Ok(Dimensions {
                width: height,
                height: width,
            })
        } else {
            Ok(Dimensions { width, height })
        }
    }

    fn cover_fit(&self, params: &FitParams) -> Result<ImageRef, BackendError> {
        let source = self.decode(params.source)?;
        let canvas = render_cover(&source, (params.width, params.height), params.background);
        let bytes = encode_jpeg(canvas, params.quality)?;
        Ok(ImageRef::inline(OUTPUT_MIME, bytes))
    }
}
