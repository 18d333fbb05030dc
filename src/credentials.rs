//! API key storage and validation for the generative AI provider.
//!
//! The key is a single persisted string. Storage goes through the small
//! [`KeyValueStore`] trait so the slot can live in memory (tests), in a JSON
//! file (the CLI), or anywhere else a host provides.
//!
//! Validation happens in two stages:
//!
//! 1. [`validate_key_format`]: offline shape check (`AIza` prefix, length,
//!    character set). Catches copy/paste mistakes.
//! 2. [`check_key`]: one request against the provider through a [`KeyProbe`],
//!    with the HTTP status mapped to a [`KeyCheck`].

use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage slot holding the API key.
pub const API_KEY_SLOT: &str = "google_ai_api_key";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt store file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("API key must not be empty")]
    EmptyKey,
}

/// Minimal persisted string map.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn clear(&mut self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// A JSON object on disk, rewritten on every change.
///
/// A missing file reads as an empty store. Parent directories are created on
/// first write.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn clear(&mut self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

/// The API key slot on top of any store.
pub struct ApiKeyStore<S> {
    store: S,
}

impl<S: KeyValueStore> ApiKeyStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Save a key, trimmed. Blank keys are rejected.
    pub fn save(&mut self, key: &str) -> Result<(), StoreError> {
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(StoreError::EmptyKey);
        }
        self.store.set(API_KEY_SLOT, trimmed)?;
        log::info!("API key saved");
        Ok(())
    }

    pub fn get(&self) -> Result<Option<String>, StoreError> {
        self.store.get(API_KEY_SLOT)
    }

    pub fn has_key(&self) -> Result<bool, StoreError> {
        Ok(self.get()?.is_some_and(|k| !k.trim().is_empty()))
    }

    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.store.clear(API_KEY_SLOT)?;
        log::info!("API key removed");
        Ok(())
    }
}

/// Keys issued by the provider start with this prefix.
pub const KEY_PREFIX: &str = "AIza";
pub const MIN_KEY_LEN: usize = 30;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum KeyFormatError {
    #[error("API key must not be empty")]
    Empty,
    #[error("API key should start with \"AIza\"")]
    WrongPrefix,
    #[error("API key is too short; check that the whole key was copied")]
    TooShort,
    #[error("API key contains invalid characters")]
    InvalidCharacters,
}

/// Offline shape check for a provider API key.
pub fn validate_key_format(key: &str) -> Result<(), KeyFormatError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(KeyFormatError::Empty);
    }
    if !key.starts_with(KEY_PREFIX) {
        return Err(KeyFormatError::WrongPrefix);
    }
    if key.len() < MIN_KEY_LEN {
        return Err(KeyFormatError::TooShort);
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(KeyFormatError::InvalidCharacters);
    }
    Ok(())
}

/// Verdict of an online key check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyCheck {
    Valid,
    /// The provider refused the key (invalid or missing permissions).
    Rejected,
    QuotaExceeded,
    Unexpected(u16),
    /// The request never got a response.
    Unreachable(String),
}

impl KeyCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Map a provider status code to a verdict.
pub fn classify_status(status: u16) -> KeyCheck {
    match status {
        200 => KeyCheck::Valid,
        403 => KeyCheck::Rejected,
        429 => KeyCheck::QuotaExceeded,
        other => KeyCheck::Unexpected(other),
    }
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Sends one test request with a key and reports the HTTP status.
pub trait KeyProbe {
    fn probe(&self, key: &str) -> Result<u16, ProbeError>;
}

/// Run an online key check.
pub fn check_key(probe: &impl KeyProbe, key: &str) -> KeyCheck {
    match probe.probe(key.trim()) {
        Ok(status) => classify_status(status),
        Err(e) => {
            log::warn!("API key check failed: {e}");
            KeyCheck::Unreachable(e.to_string())
        }
    }
}

/// Probe against the Gemini `generateContent` endpoint.
pub struct GeminiProbe {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl GeminiProbe {
    pub fn new(endpoint: impl Into<String>, timeout: std::time::Duration) -> Result<Self, ProbeError> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl KeyProbe for GeminiProbe {
    fn probe(&self, key: &str) -> Result<u16, ProbeError> {
        let body = json!({ "contents": [{ "parts": [{ "text": "test" }] }] });
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", key)
            .json(&body)
            .send()?;
        Ok(response.status().as_u16())
    }
}
