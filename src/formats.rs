//! Social-media target formats.
//!
//! Every reframe targets one entry of a fixed table. The table is static: it is
//! compiled in, never mutated, and never loaded from config.
//!
//! | Name | Size | Ratio |
//! |---|---|---|
//! | `instagram-3-4` | 1080×1440 | 3:4 |
//! | `instagram-4-5` | 1080×1350 | 4:5 |
//! | `instagram-square` | 1080×1080 | 1:1 |
//! | `instagram-landscape` | 1080×566 | 1.91:1 |
//! | `stories` | 1080×1920 | 9:16 |
//!
//! ## Legacy names
//!
//! Earlier builds only knew `instagram` (1080×1350) and `tiktok` (1080×1920).
//! Those names are still accepted on input so old scripts and saved settings
//! keep working, but they are never listed as canonical and new output always
//! uses the canonical table. [`resolve`] can be told to reject them.

use serde::Serialize;
use thiserror::Error;

/// A named fixed-dimension target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FormatSpec {
    pub name: &'static str,
    /// Human-readable label for listings.
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
}

pub const FORMATS: &[FormatSpec] = &[
    FormatSpec {
        name: "instagram-3-4",
        label: "Instagram Portrait",
        width: 1080,
        height: 1440,
    },
    FormatSpec {
        name: "instagram-4-5",
        label: "Instagram Portrait",
        width: 1080,
        height: 1350,
    },
    FormatSpec {
        name: "instagram-square",
        label: "Instagram Square",
        width: 1080,
        height: 1080,
    },
    FormatSpec {
        name: "instagram-landscape",
        label: "Instagram Landscape",
        width: 1080,
        height: 566,
    },
    FormatSpec {
        name: "stories",
        label: "Stories/Reels",
        width: 1080,
        height: 1920,
    },
];

pub const LEGACY_FORMATS: &[FormatSpec] = &[
    FormatSpec {
        name: "instagram",
        label: "Instagram",
        width: 1080,
        height: 1350,
    },
    FormatSpec {
        name: "tiktok",
        label: "TikTok",
        width: 1080,
        height: 1920,
    },
];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FormatError {
    #[error("Unknown format '{name}' (available: {available})")]
    Unknown { name: String, available: String },
    #[error("Format '{0}' is a legacy name and legacy names are disabled")]
    LegacyDisabled(String),
}

impl FormatSpec {
    /// Look up a format that the caller knows exists.
    ///
    /// # Panics
    ///
    /// Panics if `name` is in neither table. An unknown name here is a bug in
    /// the caller, not bad user input; use [`resolve`] for user input.
    pub fn named(name: &str) -> &'static FormatSpec {
        lookup(name).unwrap_or_else(|| panic!("no such format: {name:?}"))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_legacy(&self) -> bool {
        LEGACY_FORMATS.iter().any(|f| f.name == self.name)
    }

    /// Reduced aspect ratio label, e.g. `4:5`.
    ///
    /// Ratios that do not reduce to small integers (1080×566) are shown as a
    /// two-decimal ratio against 1, which is how the platforms advertise them.
    pub fn aspect_label(&self) -> String {
        let g = gcd(self.width, self.height);
        let (w, h) = (self.width / g, self.height / g);
        if w <= 32 && h <= 32 {
            format!("{w}:{h}")
        } else if self.width >= self.height {
            format!("{:.2}:1", self.width as f64 / self.height as f64)
        } else {
            format!("1:{:.2}", self.height as f64 / self.width as f64)
        }
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 { a.max(1) } else { gcd(b, a % b) }
}

/// Find a format by name, canonical names first, then legacy names.
pub fn lookup(name: &str) -> Option<&'static FormatSpec> {
    FORMATS
        .iter()
        .chain(LEGACY_FORMATS.iter())
        .find(|f| f.name == name)
}

/// Resolve a user-supplied format name.
pub fn resolve(name: &str, accept_legacy: bool) -> Result<&'static FormatSpec, FormatError> {
    match lookup(name) {
        Some(spec) if spec.is_legacy() && !accept_legacy => {
            Err(FormatError::LegacyDisabled(name.to_string()))
        }
        Some(spec) => Ok(spec),
        None => Err(FormatError::Unknown {
            name: name.to_string(),
            available: canonical_names().join(", "),
        }),
    }
}

pub fn canonical_names() -> Vec<&'static str> {
    FORMATS.iter().map(|f| f.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_table_matches_platform_sizes() {
        let dims: Vec<_> = FORMATS.iter().map(|f| (f.name, f.dimensions())).collect();
        assert_eq!(
            dims,
            vec![
                ("instagram-3-4", (1080, 1440)),
                ("instagram-4-5", (1080, 1350)),
                ("instagram-square", (1080, 1080)),
                ("instagram-landscape", (1080, 566)),
                ("stories", (1080, 1920)),
            ]
        );
    }

    #[test]
    fn all_dimensions_positive() {
        for f in FORMATS.iter().chain(LEGACY_FORMATS) {
            assert!(f.width > 0 && f.height > 0, "{} has a zero edge", f.name);
        }
    }

    #[test]
    fn names_are_unique_across_tables() {
        let mut names: Vec<_> = FORMATS.iter().chain(LEGACY_FORMATS).map(|f| f.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), FORMATS.len() + LEGACY_FORMATS.len());
    }

    #[test]
    fn lookup_finds_legacy_names() {
        assert_eq!(lookup("instagram").unwrap().dimensions(), (1080, 1350));
        assert_eq!(lookup("tiktok").unwrap().dimensions(), (1080, 1920));
        assert!(lookup("tiktok").unwrap().is_legacy());
        assert!(!lookup("stories").unwrap().is_legacy());
    }

    #[test]
    fn resolve_unknown_lists_canonical_names() {
        let err = resolve("facebook", true).unwrap_err();
        match err {
            FormatError::Unknown { name, available } => {
                assert_eq!(name, "facebook");
                assert!(available.contains("instagram-square"));
                assert!(!available.contains("tiktok"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn resolve_rejects_legacy_when_disabled() {
        assert_eq!(
            resolve("instagram", false),
            Err(FormatError::LegacyDisabled("instagram".into()))
        );
        assert!(resolve("instagram-4-5", false).is_ok());
    }

    #[test]
    #[should_panic(expected = "no such format")]
    fn named_panics_on_unknown() {
        FormatSpec::named("instagram-2-3");
    }

    #[test]
    fn aspect_labels() {
        assert_eq!(FormatSpec::named("instagram-3-4").aspect_label(), "3:4");
        assert_eq!(FormatSpec::named("instagram-4-5").aspect_label(), "4:5");
        assert_eq!(FormatSpec::named("instagram-square").aspect_label(), "1:1");
        assert_eq!(FormatSpec::named("instagram-landscape").aspect_label(), "1.91:1");
        assert_eq!(FormatSpec::named("stories").aspect_label(), "9:16");
    }
}
