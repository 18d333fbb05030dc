//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.
//!
//! Nothing is cached: fitting the same source into the same format twice runs
//! the full decode → draw → encode pipeline twice.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{CoverPlacement, cover_placement};
use super::params::{Background, FitParams, Quality};
use crate::formats::FormatSpec;
use crate::image_ref::ImageRef;
use rayon::prelude::*;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, image: &ImageRef) -> Result<(u32, u32)> {
    let dims = backend.identify(image)?;
    Ok((dims.width, dims.height))
}

/// Encoding settings shared by every fit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FitConfig {
    pub quality: Quality,
    pub background: Background,
}

/// A source re-rendered into a format's exact dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub format: &'static FormatSpec,
    /// Always inline JPEG.
    pub image: ImageRef,
}

impl FitResult {
    pub fn dimensions(&self) -> (u32, u32) {
        self.format.dimensions()
    }
}

/// Plan a fit without executing it.
pub fn plan_fit<'a>(source: &'a ImageRef, format: &FormatSpec, config: &FitConfig) -> FitParams<'a> {
    FitParams {
        source,
        width: format.width,
        height: format.height,
        quality: config.quality,
        background: config.background,
    }
}

/// Cover placement of a `source_dims` image in each of `formats`.
///
/// Pure geometry, used for dry runs.
pub fn plan_placements(
    source_dims: (u32, u32),
    formats: &[&'static FormatSpec],
) -> Vec<(&'static FormatSpec, CoverPlacement)> {
    formats
        .iter()
        .map(|f| (*f, cover_placement(source_dims, f.dimensions())))
        .collect()
}

/// Fit `source` into `format`.
///
/// Fails with [`BackendError::Decode`] when the source cannot be loaded or
/// decoded; no partial result is ever returned.
pub fn fit(
    backend: &impl ImageBackend,
    source: &ImageRef,
    format: &'static FormatSpec,
    config: &FitConfig,
) -> Result<FitResult> {
    let params = plan_fit(source, format, config);
    let image = backend.cover_fit(&params)?;
    log::info!(
        "fitted {} into {} ({}x{})",
        source,
        format.name,
        format.width,
        format.height
    );
    Ok(FitResult { format, image })
}

/// Fit one source into several formats in parallel.
///
/// Each fit owns its own canvas, so concurrent fits share nothing mutable.
/// Results come back in the order of `formats`, each with its own outcome.
pub fn fit_all<B: ImageBackend>(
    backend: &B,
    source: &ImageRef,
    formats: &[&'static FormatSpec],
    config: &FitConfig,
) -> Vec<(&'static FormatSpec, Result<FitResult>)> {
    formats
        .par_iter()
        .map(|&format| (format, fit(backend, source, format, config)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::FORMATS;
    use crate::imaging::Dimensions;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};

    #[test]
    fn get_dimensions_calls_backend() {
        let backend = MockBackend::with_dimensions(vec![Dimensions {
            width: 1920,
            height: 1080,
        }]);

        let dims = get_dimensions(&backend, &ImageRef::remote("/test.jpg")).unwrap();
        assert_eq!(dims, (1920, 1080));
    }

    #[test]
    fn plan_fit_uses_format_dimensions() {
        let source = ImageRef::remote("/edited.jpg");
        let params = plan_fit(
            &source,
            FormatSpec::named("instagram-landscape"),
            &FitConfig::default(),
        );
        assert_eq!((params.width, params.height), (1080, 566));
        assert_eq!(params.quality.value(), 95);
        assert_eq!(params.background, Background::WHITE);
    }

    #[test]
    fn fit_passes_config_to_backend() {
        let backend = MockBackend::new();
        let config = FitConfig {
            quality: Quality::new(80),
            background: Background([0, 0, 0]),
        };
        let result = fit(
            &backend,
            &ImageRef::remote("/edited.jpg"),
            FormatSpec::named("stories"),
            &config,
        )
        .unwrap();

        assert_eq!(result.dimensions(), (1080, 1920));
        assert!(result.image.is_inline());
        assert_eq!(backend.get_operations(), vec![RecordedOp::CoverFit {
            source: "/edited.jpg".into(),
            width: 1080,
            height: 1920,
            quality: 80,
            background: [0, 0, 0],
        }]);
    }

    #[test]
    fn fit_is_not_cached() {
        let backend = MockBackend::new();
        let source = ImageRef::remote("/edited.jpg");
        let square = FormatSpec::named("instagram-square");
        fit(&backend, &source, square, &FitConfig::default()).unwrap();
        fit(&backend, &source, square, &FitConfig::default()).unwrap();
        assert_eq!(backend.get_operations().len(), 2);
    }

    #[test]
    fn fit_propagates_decode_error() {
        let backend = MockBackend::failing();
        let err = fit(
            &backend,
            &ImageRef::remote("/broken.jpg"),
            FormatSpec::named("stories"),
            &FitConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, BackendError::Decode { .. }));
    }

    #[test]
    fn fit_all_keeps_format_order() {
        let backend = MockBackend::new();
        let formats: Vec<_> = FORMATS.iter().collect();
        let results = fit_all(
            &backend,
            &ImageRef::remote("/edited.jpg"),
            &formats,
            &FitConfig::default(),
        );

        let names: Vec<_> = results.iter().map(|(f, _)| f.name).collect();
        assert_eq!(names, vec![
            "instagram-3-4",
            "instagram-4-5",
            "instagram-square",
            "instagram-landscape",
            "stories"
        ]);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(backend.get_operations().len(), FORMATS.len());
    }

    #[test]
    fn plan_placements_covers_every_format() {
        let formats: Vec<_> = FORMATS.iter().collect();
        for (format, placement) in plan_placements((800, 1200), &formats) {
            assert!(placement.covers(format.dimensions()), "{}", format.name);
        }
    }
}
