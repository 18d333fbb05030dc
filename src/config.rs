//! Configuration module.
//!
//! Loads and validates an optional `config.toml` from the config directory
//! (the `--config-dir` flag, default: current directory). Stock defaults are
//! the base layer; the file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [output]
//! quality = 95                        # JPEG quality (1-100)
//! background = "#ffffff"              # Fill behind transparent pixels
//! filename = "fotografia-editada.jpg" # Default name for a single fit
//!
//! [formats]
//! accept_legacy = true      # Accept "instagram" and "tiktok" as aliases
//!
//! [upload]
//! max_file_size = 10485760  # Bytes (10 MiB)
//! accepted_formats = ["image/jpeg", "image/png", "image/webp"]
//! webhook_url = "https://olancador.pt/webhook/fotografo"
//! timeout_secs = 120        # The edit can take a while
//!
//! [fetch]
//! timeout_secs = 30         # Timeout for http(s) sources
//! max_bytes = 52428800      # Refuse remote images larger than this
//!
//! [credentials]
//! store = "credentials.json"  # Relative to the config directory
//! endpoint = "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{Background, FitConfig, Quality};
use crate::upload::{DEFAULT_EDIT_TIMEOUT, DEFAULT_MAX_FILE_SIZE, DEFAULT_WEBHOOK_URL, UploadConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Application configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub output: OutputConfig,
    pub formats: FormatsConfig,
    pub upload: UploadSettings,
    pub fetch: FetchConfig,
    pub credentials: CredentialsConfig,
    pub processing: ProcessingConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.output.quality) {
            return Err(ConfigError::Validation(
                "output.quality must be 1-100".into(),
            ));
        }
        Background::parse_hex(&self.output.background)
            .map_err(|e| ConfigError::Validation(format!("output.background: {e}")))?;
        if self.output.filename.trim().is_empty() {
            return Err(ConfigError::Validation(
                "output.filename must not be empty".into(),
            ));
        }
        if self.upload.max_file_size == 0 {
            return Err(ConfigError::Validation(
                "upload.max_file_size must be non-zero".into(),
            ));
        }
        if self.upload.accepted_formats.is_empty() {
            return Err(ConfigError::Validation(
                "upload.accepted_formats must not be empty".into(),
            ));
        }
        if self.upload.webhook_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "upload.webhook_url must not be empty".into(),
            ));
        }
        if self.upload.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "upload.timeout_secs must be non-zero".into(),
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "fetch.timeout_secs must be non-zero".into(),
            ));
        }
        if self.credentials.endpoint.trim().is_empty() {
            return Err(ConfigError::Validation(
                "credentials.endpoint must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Encoding settings for fits. Only call on a validated config.
    pub fn fit_config(&self) -> FitConfig {
        FitConfig {
            quality: Quality::new(self.output.quality),
            background: Background::parse_hex(&self.output.background).unwrap_or_default(),
        }
    }

    pub fn upload_config(&self) -> UploadConfig {
        UploadConfig {
            max_file_size: self.upload.max_file_size,
            accepted_formats: self.upload.accepted_formats.clone(),
        }
    }

    /// Credentials file path; relative paths resolve against `config_dir`.
    pub fn credentials_path(&self, config_dir: &Path) -> PathBuf {
        let store = Path::new(&self.credentials.store);
        if store.is_absolute() {
            store.to_path_buf()
        } else {
            config_dir.join(store)
        }
    }
}

/// Encoded output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// JPEG quality (1 = worst, 100 = best).
    pub quality: u32,
    /// Hex color painted where the source does not cover the canvas.
    pub background: String,
    /// File name used when a single format is written without `--output`.
    pub filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            quality: 95,
            background: "#ffffff".to_string(),
            filename: "fotografia-editada.jpg".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatsConfig {
    /// Accept the retired `instagram` and `tiktok` names.
    pub accept_legacy: bool,
}

impl Default for FormatsConfig {
    fn default() -> Self {
        Self {
            accept_legacy: true,
        }
    }
}

/// Upload limits and the editing webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadSettings {
    pub max_file_size: u64,
    pub accepted_formats: Vec<String>,
    /// Endpoint receiving the multipart upload for `edit`.
    pub webhook_url: String,
    pub timeout_secs: u64,
}

impl UploadSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        let defaults = UploadConfig::default();
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            accepted_formats: defaults.accepted_formats,
            webhook_url: DEFAULT_WEBHOOK_URL.to_string(),
            timeout_secs: DEFAULT_EDIT_TIMEOUT.as_secs(),
        }
    }
}

/// Remote source download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_bytes: u64,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialsConfig {
    /// JSON file holding the stored API key.
    pub store: String,
    /// Endpoint used by `key check --online`.
    pub endpoint: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            store: "credentials.json".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
                .to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel fit workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AppConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key-by-key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    Ok(Some(toml::from_str(&content)?))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in `dir`, on top of stock defaults.
pub fn load_config(dir: &Path) -> Result<AppConfig, ConfigError> {
    let config = resolve_config(stock_defaults_value(), load_raw_config(dir)?)?;
    log::debug!("loaded config from {}", dir.display());
    Ok(config)
}

/// A fully-commented stock `config.toml`. Printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# Photo Reframe Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Output encoding
# ---------------------------------------------------------------------------
[output]
# JPEG quality (1 = worst, 100 = best).
quality = 95

# Fill color where the source does not reach (transparent pixels).
background = "#ffffff"

# File written by `fit` for a single format when --output is not given.
filename = "fotografia-editada.jpg"

# ---------------------------------------------------------------------------
# Formats
# ---------------------------------------------------------------------------
[formats]
# Accept the retired names "instagram" (4:5) and "tiktok" (9:16).
accept_legacy = true

# ---------------------------------------------------------------------------
# Upload checks
# ---------------------------------------------------------------------------
[upload]
# Largest accepted file in bytes (10 MiB).
max_file_size = 10485760

# MIME types accepted both as declared and as sniffed from the file header.
accepted_formats = ["image/jpeg", "image/png", "image/webp"]

# Editing webhook used by `edit`. The photo is posted as multipart field "file".
webhook_url = "https://olancador.pt/webhook/fotografo"

# Seconds to wait for the edited image.
timeout_secs = 120

# ---------------------------------------------------------------------------
# Remote sources (http/https)
# ---------------------------------------------------------------------------
[fetch]
timeout_secs = 30
max_bytes = 52428800

# ---------------------------------------------------------------------------
# API key
# ---------------------------------------------------------------------------
[credentials]
# Where the key is stored, relative to the config directory.
store = "credentials.json"

# Endpoint probed by `key check --online`.
endpoint = "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel fit workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = AppConfig::default();
        assert_eq!(config.output.quality, 95);
        assert_eq!(config.output.background, "#ffffff");
        assert_eq!(config.output.filename, "fotografia-editada.jpg");
        assert!(config.formats.accept_legacy);
        assert_eq!(config.upload.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.upload.accepted_formats.len(), 3);
        assert_eq!(config.upload.webhook_url, "https://olancador.pt/webhook/fotografo");
        assert_eq!(config.upload.timeout(), Duration::from_secs(120));
        assert_eq!(config.credentials.store, "credentials.json");
    }

    #[test]
    fn parse_partial_config() {
        let config: AppConfig = toml::from_str(
            r##"
[output]
background = "#000"
"##,
        )
        .unwrap();
        assert_eq!(config.output.background, "#000");
        assert_eq!(config.output.quality, 95);
        assert_eq!(config.fetch.timeout_secs, 30);
    }

    #[test]
    fn fit_config_converts_output_section() {
        let mut config = AppConfig::default();
        config.output.quality = 80;
        config.output.background = "#102030".into();
        let fit = config.fit_config();
        assert_eq!(fit.quality.value(), 80);
        assert_eq!(fit.background, Background([0x10, 0x20, 0x30]));
    }

    #[test]
    fn upload_config_mirrors_section() {
        let mut config = AppConfig::default();
        config.upload.max_file_size = 1024;
        let upload = config.upload_config();
        assert_eq!(upload.max_file_size, 1024);
        assert_eq!(upload.accepted_formats, config.upload.accepted_formats);
    }

    #[test]
    fn credentials_path_relative_to_config_dir() {
        let config = AppConfig::default();
        assert_eq!(
            config.credentials_path(Path::new("/etc/reframe")),
            PathBuf::from("/etc/reframe/credentials.json")
        );
    }

    #[test]
    fn credentials_path_absolute_kept() {
        let mut config = AppConfig::default();
        config.credentials.store = "/var/lib/keys.json".into();
        assert_eq!(
            config.credentials_path(Path::new("/etc/reframe")),
            PathBuf::from("/var/lib/keys.json")
        );
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.output.quality, 95);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
[formats]
accept_legacy = false

[processing]
max_processes = 2
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert!(!config.formats.accept_legacy);
        assert_eq!(config.processing.max_processes, Some(2));
        assert_eq!(config.output.filename, "fotografia-editada.jpg");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
[output]
quality = 200
"#,
        )
        .unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    // =========================================================================
    // Processing config tests
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(99999),
        };
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_zero_means_one() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[output]
quality = 95
filename = "a.jpg"
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[output]
quality = 70
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let output = merged.get("output").unwrap();
        assert_eq!(output.get("quality").unwrap().as_integer(), Some(70));
        assert_eq!(output.get("filename").unwrap().as_str(), Some("a.jpg"));
    }

    #[test]
    fn merge_toml_arrays_replace() {
        let base: toml::Value =
            toml::from_str(r#"formats = ["image/jpeg", "image/png"]"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"formats = ["image/webp"]"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("formats").unwrap().as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<AppConfig, _> = toml::from_str(
            r#"
[output]
qualty = 90
"#,
        );
        assert!(result.unwrap_err().to_string().contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<AppConfig, _> = toml::from_str(
            r#"
[images]
quality = 90
"#,
        );
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_quality_bounds() {
        let mut config = AppConfig::default();
        config.output.quality = 100;
        assert!(config.validate().is_ok());
        config.output.quality = 0;
        assert!(config.validate().unwrap_err().to_string().contains("quality"));
    }

    #[test]
    fn validate_background_color() {
        let mut config = AppConfig::default();
        config.output.background = "white".into();
        assert!(config.validate().unwrap_err().to_string().contains("background"));
    }

    #[test]
    fn validate_upload_limits() {
        let mut config = AppConfig::default();
        config.upload.accepted_formats.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.upload.max_file_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_webhook_settings() {
        let mut config = AppConfig::default();
        config.upload.webhook_url = "  ".into();
        assert!(config.validate().unwrap_err().to_string().contains("webhook_url"));

        let mut config = AppConfig::default();
        config.upload.timeout_secs = 0;
        assert!(config.validate().unwrap_err().to_string().contains("timeout_secs"));
    }

    #[test]
    fn resolve_config_with_overlay() {
        let overlay: toml::Value = toml::from_str(
            r#"
[fetch]
timeout_secs = 5
"#,
        )
        .unwrap();
        let config = resolve_config(stock_defaults_value(), Some(overlay)).unwrap();
        assert_eq!(config.fetch.timeout(), Duration::from_secs(5));
        assert_eq!(config.fetch.max_bytes, 50 * 1024 * 1024);
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: AppConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config.output.quality, 95);
        assert_eq!(config.output.filename, "fotografia-editada.jpg");
        assert_eq!(config.upload.max_file_size, 10485760);
        assert_eq!(config.upload.webhook_url, DEFAULT_WEBHOOK_URL);
        assert_eq!(config.upload.timeout_secs, 120);
        assert_eq!(config.fetch.max_bytes, 52428800);
        assert_eq!(config.credentials.endpoint, CredentialsConfig::default().endpoint);
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        for section in [
            "[output]",
            "[formats]",
            "[upload]",
            "[fetch]",
            "[credentials]",
            "[processing]",
        ] {
            assert!(content.contains(section), "{section}");
        }
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        assert!(val.is_table());
        for section in ["output", "formats", "upload", "fetch", "credentials"] {
            assert!(val.get(section).is_some(), "{section}");
        }
    }
}
