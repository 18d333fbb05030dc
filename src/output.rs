//! CLI output formatting.
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.
//!
//! # Output Format
//!
//! ## Formats
//!
//! ```text
//! instagram-3-4        1080x1440  3:4     Instagram Portrait
//! instagram-4-5        1080x1350  4:5     Instagram Portrait
//! ...
//! ```
//!
//! ## Fit
//!
//! ```text
//! photo.jpg
//!     stories (1080x1920) → out/stories.jpg (183 KiB)
//!     instagram-square: FAILED Failed to decode photo.jpg: ...
//! Fitted 1 of 2 formats
//! ```
//!
//! ## Edit
//!
//! ```text
//! original: data:image/jpeg (2483310 bytes)
//! edited:   data:image/jpeg (411870 bytes)
//!     saved → fotografia-editada.jpg (402 KiB)
//! ```
//!
//! ## Inspect
//!
//! ```text
//! photo.jpg: 800x1200
//!     stories              scale 1.6000  offset (-100, 0)
//! ```

use crate::credentials::KeyCheck;
use crate::formats::FormatSpec;
use crate::image_ref::ImageRef;
use crate::imaging::CoverPlacement;
use crate::slider::{SliderEvent, SliderFrame};
use std::path::{Path, PathBuf};

/// Outcome of writing one format, as reported by the `fit` command.
#[derive(Debug)]
pub enum WriteOutcome {
    Written { path: PathBuf, bytes: usize },
    Failed(String),
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn human_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0))
    }
}

// ============================================================================
// Formats
// ============================================================================

pub fn format_formats_table(canonical: &[FormatSpec], legacy: &[FormatSpec]) -> Vec<String> {
    let row = |f: &FormatSpec| {
        format!(
            "{:<20} {:>4}x{:<5} {:<7} {}",
            f.name,
            f.width,
            f.height,
            f.aspect_label(),
            f.label
        )
    };
    let mut lines: Vec<String> = canonical.iter().map(row).collect();
    if !legacy.is_empty() {
        lines.push(String::new());
        lines.push("Legacy aliases".to_string());
        lines.extend(legacy.iter().map(|f| format!("{}{}", indent(1), row(f))));
    }
    lines
}

pub fn print_formats_table(canonical: &[FormatSpec], legacy: &[FormatSpec]) {
    for line in format_formats_table(canonical, legacy) {
        println!("{}", line);
    }
}

// ============================================================================
// Fit
// ============================================================================

pub fn format_fit_report(source: &str, results: &[(&FormatSpec, WriteOutcome)]) -> Vec<String> {
    let mut lines = vec![source.to_string()];
    let mut written = 0;
    for (format, outcome) in results {
        match outcome {
            WriteOutcome::Written { path, bytes } => {
                written += 1;
                lines.push(format!(
                    "{}{} ({}x{}) \u{2192} {} ({})",
                    indent(1),
                    format.name,
                    format.width,
                    format.height,
                    path.display(),
                    human_size(*bytes)
                ));
            }
            WriteOutcome::Failed(reason) => {
                lines.push(format!("{}{}: FAILED {}", indent(1), format.name, reason));
            }
        }
    }
    let noun = if results.len() == 1 { "format" } else { "formats" };
    lines.push(format!("Fitted {} of {} {}", written, results.len(), noun));
    lines
}

pub fn print_fit_report(source: &str, results: &[(&FormatSpec, WriteOutcome)]) {
    for line in format_fit_report(source, results) {
        println!("{}", line);
    }
}

// ============================================================================
// Inspect
// ============================================================================

pub fn format_inspect(
    source: &str,
    dims: (u32, u32),
    placements: &[(&'static FormatSpec, CoverPlacement)],
) -> Vec<String> {
    let mut lines = vec![format!("{}: {}x{}", source, dims.0, dims.1)];
    for (format, p) in placements {
        lines.push(format!(
            "{}{:<20} scale {:.4}  offset ({}, {})",
            indent(1),
            format.name,
            p.scale,
            p.x.round(),
            p.y.round()
        ));
    }
    lines
}

pub fn print_inspect(
    source: &str,
    dims: (u32, u32),
    placements: &[(&'static FormatSpec, CoverPlacement)],
) {
    for line in format_inspect(source, dims, placements) {
        println!("{}", line);
    }
}

// ============================================================================
// Slider
// ============================================================================

pub fn format_slider_frame(event: &SliderEvent, frame: &SliderFrame) -> Vec<String> {
    let state = if frame.dragging { "dragging" } else { "idle" };
    vec![format!(
        "{:<12} position {:>6.2}%  handle {:>8.2}px  {}",
        event.to_string(),
        frame.position,
        frame.handle_px,
        state
    )]
}

pub fn print_slider_frame(event: &SliderEvent, frame: &SliderFrame) {
    for line in format_slider_frame(event, frame) {
        println!("{}", line);
    }
}

// ============================================================================
// Upload / credentials
// ============================================================================

pub fn format_upload_result(path: &Path, result: &Result<&'static str, String>) -> Vec<String> {
    match result {
        Ok(mime) => vec![format!("{}: OK ({})", path.display(), mime)],
        Err(reason) => vec![format!("{}: REJECTED {}", path.display(), reason)],
    }
}

pub fn print_upload_result(path: &Path, result: &Result<&'static str, String>) {
    for line in format_upload_result(path, result) {
        println!("{}", line);
    }
}

pub fn format_edit_result(
    original: &ImageRef,
    edited: &ImageRef,
    saved: Option<&WriteOutcome>,
) -> Vec<String> {
    let mut lines = vec![
        format!("original: {}", original),
        format!("edited:   {}", edited),
    ];
    match saved {
        Some(WriteOutcome::Written { path, bytes }) => lines.push(format!(
            "{}saved \u{2192} {} ({})",
            indent(1),
            path.display(),
            human_size(*bytes)
        )),
        Some(WriteOutcome::Failed(reason)) => {
            lines.push(format!("{}save FAILED {}", indent(1), reason))
        }
        None => {}
    }
    lines
}

pub fn print_edit_result(original: &ImageRef, edited: &ImageRef, saved: Option<&WriteOutcome>) {
    for line in format_edit_result(original, edited, saved) {
        println!("{}", line);
    }
}

/// Show only the first and last four characters of a key.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 8), tail)
}

pub fn format_key_check(check: &KeyCheck) -> Vec<String> {
    let line = match check {
        KeyCheck::Valid => "API key is valid".to_string(),
        KeyCheck::Rejected => "API key is invalid or lacks permissions".to_string(),
        KeyCheck::QuotaExceeded => "API quota exceeded; the key itself looks valid".to_string(),
        KeyCheck::Unexpected(status) => format!("Unexpected response from provider (HTTP {status})"),
        KeyCheck::Unreachable(reason) => format!("Could not reach provider: {reason}"),
    };
    vec![line]
}

pub fn print_key_check(check: &KeyCheck) {
    for line in format_key_check(check) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
