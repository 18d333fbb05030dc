//! Pure calculation functions for cover-fit geometry.
//!
//! All functions here are pure and testable without any I/O or images.

/// Where a source image lands on a target canvas under cover fitting.
///
/// All values are in target-canvas pixels and unrounded. `x` and `y` are the
/// top-left corner of the scaled image; both are `<= 0` because the scaled
/// image overhangs the canvas on at least one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverPlacement {
    pub scale: f64,
    pub width: f64,
    pub height: f64,
    pub x: f64,
    pub y: f64,
}

/// Compute the cover placement of `source` on `target`.
///
/// The scale is the larger of the two axis ratios, so the scaled image covers
/// the whole target and the excess is cropped symmetrically. No letterboxing.
///
/// # Arguments
/// * `source` - Source image dimensions (width, height), both non-zero
/// * `target` - Target canvas dimensions (width, height), both non-zero
///
/// # Examples
/// ```
/// # use photo_reframe::imaging::cover_placement;
/// // 500x500 square onto a 1080x566 landscape canvas
/// let p = cover_placement((500, 500), (1080, 566));
/// assert_eq!(p.scale, 2.16);
/// assert_eq!((p.width, p.height), (1080.0, 1080.0));
/// assert_eq!((p.x, p.y), (0.0, -257.0));
/// ```
pub fn cover_placement(source: (u32, u32), target: (u32, u32)) -> CoverPlacement {
    let (src_w, src_h) = (source.0 as f64, source.1 as f64);
    let (tgt_w, tgt_h) = (target.0 as f64, target.1 as f64);

    let scale = (tgt_w / src_w).max(tgt_h / src_h);
    let width = src_w * scale;
    let height = src_h * scale;

    CoverPlacement {
        scale,
        width,
        height,
        x: (tgt_w - width) / 2.0,
        y: (tgt_h - height) / 2.0,
    }
}

/// Integer rectangle the scaled image is rasterized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl CoverPlacement {
    /// True when the source already has the target's dimensions.
    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.x == 0.0 && self.y == 0.0
    }

    /// Whether the scaled image reaches every edge of `target`.
    pub fn covers(&self, target: (u32, u32)) -> bool {
        self.width >= target.0 as f64 && self.height >= target.1 as f64
    }

    /// Round the placement to whole pixels for drawing.
    ///
    /// The origin is rounded to the nearest pixel. The size is rounded too,
    /// then widened if needed so the rect still reaches the far edge of the
    /// canvas; float error never opens a background gap. Sizes beyond
    /// `u32::MAX` saturate.
    pub fn draw_rect(&self, target: (u32, u32)) -> DrawRect {
        let x = self.x.round() as i64;
        let y = self.y.round() as i64;
        let width = (self.width.round() as i64).max(target.0 as i64 - x).max(1);
        let height = (self.height.round() as i64).max(target.1 as i64 - y).max(1);

        DrawRect {
            x,
            y,
            width: u32::try_from(width).unwrap_or(u32::MAX),
            height: u32::try_from(height).unwrap_or(u32::MAX),
        }
    }

    /// The part of the source that ends up on the canvas, in source pixels,
    /// widened to whole pixels and clamped to the source bounds.
    pub fn visible_source_rect(&self, source: (u32, u32), target: (u32, u32)) -> SourceRect {
        let axis = |offset: f64, visible: f64, len: u32| {
            let start = (-offset / self.scale).max(0.0);
            let end = (start + visible / self.scale).min(len as f64);
            let lo = (start.floor() as u32).min(len.saturating_sub(1));
            let hi = (end.ceil() as u32).clamp(lo + 1, len.max(1));
            (lo, hi - lo)
        };
        let (x, width) = axis(self.x, target.0 as f64, source.0);
        let (y, height) = axis(self.y, target.1 as f64, source.1);
        SourceRect {
            x,
            y,
            width,
            height,
        }
    }
}

/// Integer crop window in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}
