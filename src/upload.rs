//! Sending a photo to the editing webhook.
//!
//! Two steps, always in this order:
//!
//! 1. [`validate_upload`]: size and type checks. The declared MIME type comes
//!    from the client and is not trusted on its own: the leading bytes are
//!    sniffed as well, and both must be accepted.
//! 2. [`send_for_edit`]: one multipart POST (field `file`) through an
//!    [`EditTransport`], with the reply turned into an [`UploadResult`].
//!
//! The webhook may answer with JSON (`editedImage` or `image`, plus an
//! optional `originalImage`) or with a bare body that is the edited image
//! reference itself. Without an `originalImage` the uploaded bytes stand in
//! for the original.

use crate::image_ref::{ImageRef, ImageRefError, sniff_mime};
use crate::session::UploadResult;
use std::time::Duration;
use thiserror::Error;

/// 10 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

pub const DEFAULT_WEBHOOK_URL: &str = "https://olancador.pt/webhook/fotografo";

/// Editing can take a while; the webhook runs a generative model.
pub const DEFAULT_EDIT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub max_file_size: u64,
    pub accepted_formats: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            accepted_formats: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
            ],
        }
    }
}

impl UploadConfig {
    fn accepts(&self, mime: &str) -> bool {
        self.accepted_formats
            .iter()
            .any(|m| m.eq_ignore_ascii_case(mime))
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UploadError {
    #[error("No file selected")]
    Empty,
    #[error("File is too large ({size} bytes, limit {limit} bytes)")]
    TooLarge { size: u64, limit: u64 },
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("File contents are not a supported image (declared {declared})")]
    ContentMismatch { declared: String },
}

/// Check an upload against `config`.
///
/// Returns the sniffed MIME type on success. `declared_mime` of `None` skips
/// the declared-type check and relies on sniffing alone.
pub fn validate_upload(
    bytes: &[u8],
    declared_mime: Option<&str>,
    config: &UploadConfig,
) -> Result<&'static str, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::Empty);
    }
    let size = bytes.len() as u64;
    if size > config.max_file_size {
        return Err(UploadError::TooLarge {
            size,
            limit: config.max_file_size,
        });
    }
    if let Some(declared) = declared_mime
        && !config.accepts(declared)
    {
        return Err(UploadError::UnsupportedType(declared.to_string()));
    }
    match sniff_mime(bytes) {
        Some(sniffed) if config.accepts(sniffed) => Ok(sniffed),
        Some(sniffed) if declared_mime.is_none() => {
            Err(UploadError::UnsupportedType(sniffed.to_string()))
        }
        _ => Err(UploadError::ContentMismatch {
            declared: declared_mime.unwrap_or("unknown").to_string(),
        }),
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error(transparent)]
    Rejected(#[from] UploadError),
    #[error("Timed out waiting for the editing service; the image may be too large")]
    Timeout,
    #[error("Could not reach the editing service: {0}")]
    Http(reqwest::Error),
    #[error("Editing service answered HTTP {0}")]
    Status(u16),
    #[error("Invalid JSON from the editing service: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid response from the editing service: no edited image")]
    MissingImage,
    #[error("Invalid image reference from the editing service: {0}")]
    ImageRef(#[from] ImageRefError),
}

impl From<reqwest::Error> for EditError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(e)
        }
    }
}

/// A photo that passed [`validate_upload`], ready to be sent.
#[derive(Debug, Clone, Copy)]
pub struct Upload<'a> {
    pub file_name: &'a str,
    pub mime: &'static str,
    pub bytes: &'a [u8],
}

/// What came back from the webhook, before interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// Delivers an upload to the editing service.
pub trait EditTransport {
    fn send(&self, upload: &Upload<'_>) -> Result<EditResponse, EditError>;
}

/// Multipart POST to the editing webhook.
pub struct WebhookTransport {
    client: reqwest::blocking::Client,
    url: String,
}

impl WebhookTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, EditError> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl EditTransport for WebhookTransport {
    fn send(&self, upload: &Upload<'_>) -> Result<EditResponse, EditError> {
        let part = reqwest::blocking::multipart::Part::bytes(upload.bytes.to_vec())
            .file_name(upload.file_name.to_string())
            .mime_str(upload.mime)?;
        let form = reqwest::blocking::multipart::Form::new().part("file", part);

        log::info!(
            "sending {} ({} KiB) to {}",
            upload.file_name,
            upload.bytes.len() / 1024,
            self.url
        );
        let response = self.client.post(&self.url).multipart(form).send()?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text()?;
        Ok(EditResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Interpret a webhook reply. `uploaded` is used as the original image when
/// the reply does not name one.
pub fn parse_edit_response(
    response: &EditResponse,
    uploaded: ImageRef,
) -> Result<UploadResult, EditError> {
    if !(200..300).contains(&response.status) {
        return Err(EditError::Status(response.status));
    }

    let is_json = response
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"));

    let (edited, original) = if is_json {
        let value: serde_json::Value = serde_json::from_str(&response.body)?;
        let field = |name: &str| {
            value
                .get(name)
                .and_then(serde_json::Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let edited = field("editedImage").or_else(|| field("image"));
        (edited, field("originalImage"))
    } else {
        log::debug!("non-JSON reply, using the body as the edited image");
        let body = response.body.trim();
        ((!body.is_empty()).then(|| body.to_string()), None)
    };

    let edited = ImageRef::parse(&edited.ok_or(EditError::MissingImage)?)?;
    let original = match original {
        Some(reference) => ImageRef::parse(&reference)?,
        None => uploaded,
    };
    Ok(UploadResult {
        original_image: original,
        edited_image: edited,
    })
}

/// Validate a photo, send it for editing, and interpret the reply.
///
/// Nothing is sent when validation fails.
pub fn send_for_edit(
    transport: &impl EditTransport,
    file_name: &str,
    bytes: &[u8],
    declared_mime: Option<&str>,
    config: &UploadConfig,
) -> Result<UploadResult, EditError> {
    let mime = validate_upload(bytes, declared_mime, config)?;
    let upload = Upload {
        file_name,
        mime,
        bytes,
    };
    let response = transport.send(&upload)?;
    let result = parse_edit_response(&response, ImageRef::inline(mime, bytes.to_vec()))?;
    log::info!("edited image received: {}", result.edited_image);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];
    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn accepts_jpeg() {
        let cfg = UploadConfig::default();
        assert_eq!(validate_upload(JPEG, Some("image/jpeg"), &cfg), Ok("image/jpeg"));
    }

    #[test]
    fn declared_type_is_case_insensitive() {
        let cfg = UploadConfig::default();
        assert_eq!(validate_upload(PNG, Some("IMAGE/PNG"), &cfg), Ok("image/png"));
    }

    #[test]
    fn empty_is_rejected() {
        let cfg = UploadConfig::default();
        assert_eq!(validate_upload(&[], Some("image/jpeg"), &cfg), Err(UploadError::Empty));
    }

    #[test]
    fn size_limit_is_inclusive() {
        let cfg = UploadConfig {
            max_file_size: JPEG.len() as u64,
            ..UploadConfig::default()
        };
        assert!(validate_upload(JPEG, None, &cfg).is_ok());

        let cfg = UploadConfig {
            max_file_size: JPEG.len() as u64 - 1,
            ..cfg
        };
        assert_eq!(
            validate_upload(JPEG, None, &cfg),
            Err(UploadError::TooLarge {
                size: JPEG.len() as u64,
                limit: JPEG.len() as u64 - 1
            })
        );
    }

    #[test]
    fn unsupported_declared_type() {
        let cfg = UploadConfig::default();
        assert_eq!(
            validate_upload(JPEG, Some("image/gif"), &cfg),
            Err(UploadError::UnsupportedType("image/gif".into()))
        );
    }

    #[test]
    fn mislabelled_content_is_rejected() {
        let cfg = UploadConfig::default();
        assert_eq!(
            validate_upload(b"GIF89a......", Some("image/jpeg"), &cfg),
            Err(UploadError::ContentMismatch {
                declared: "image/jpeg".into()
            })
        );
    }

    #[test]
    fn sniffed_type_must_be_accepted() {
        let cfg = UploadConfig {
            accepted_formats: vec!["image/jpeg".into()],
            ..UploadConfig::default()
        };
        assert_eq!(
            validate_upload(PNG, None, &cfg),
            Err(UploadError::UnsupportedType("image/png".into()))
        );
    }

    // =========================================================================
    // send_for_edit tests
    // =========================================================================

    /// Answers every upload with a canned reply and counts the calls.
    struct CannedTransport {
        response: EditResponse,
        calls: Cell<usize>,
    }

    impl CannedTransport {
        fn new(status: u16, content_type: Option<&str>, body: &str) -> Self {
            Self {
                response: EditResponse {
                    status,
                    content_type: content_type.map(str::to_string),
                    body: body.to_string(),
                },
                calls: Cell::new(0),
            }
        }

        fn json(body: &str) -> Self {
            Self::new(200, Some("application/json; charset=utf-8"), body)
        }
    }

    impl EditTransport for CannedTransport {
        fn send(&self, upload: &Upload<'_>) -> Result<EditResponse, EditError> {
            assert_eq!(upload.file_name, "photo.jpg");
            assert_eq!(upload.mime, "image/jpeg");
            self.calls.set(self.calls.get() + 1);
            Ok(self.response.clone())
        }
    }

    fn send(transport: &CannedTransport) -> Result<UploadResult, EditError> {
        send_for_edit(
            transport,
            "photo.jpg",
            JPEG,
            Some("image/jpeg"),
            &UploadConfig::default(),
        )
    }

    #[test]
    fn json_edited_image_with_local_original() {
        let transport = CannedTransport::json(r#"{"editedImage": "data:image/png;base64,iVBORw0KGgo="}"#);
        let result = send(&transport).unwrap();
        assert_eq!(result.edited_image.mime(), Some("image/png"));
        assert_eq!(result.original_image, ImageRef::inline("image/jpeg", JPEG.to_vec()));
        assert_eq!(transport.calls.get(), 1);
    }

    #[test]
    fn json_image_field_is_fallback() {
        let transport = CannedTransport::json(r#"{"image": "https://cdn.example.com/e.jpg"}"#);
        let result = send(&transport).unwrap();
        assert_eq!(result.edited_image, ImageRef::remote("https://cdn.example.com/e.jpg"));
    }

    #[test]
    fn json_original_image_is_used_when_present() {
        let transport = CannedTransport::json(
            r#"{"editedImage": "https://cdn.example.com/e.jpg", "image": "ignored",
                "originalImage": "https://cdn.example.com/o.jpg"}"#,
        );
        let result = send(&transport).unwrap();
        assert_eq!(result.edited_image, ImageRef::remote("https://cdn.example.com/e.jpg"));
        assert_eq!(result.original_image, ImageRef::remote("https://cdn.example.com/o.jpg"));
    }

    #[test]
    fn text_body_is_the_edited_image() {
        let transport =
            CannedTransport::new(200, Some("text/plain"), "  https://cdn.example.com/e.jpg\n");
        let result = send(&transport).unwrap();
        assert_eq!(result.edited_image, ImageRef::remote("https://cdn.example.com/e.jpg"));

        let untyped = CannedTransport::new(200, None, "data:image/jpeg;base64,/9j/");
        assert!(send(&untyped).unwrap().edited_image.is_inline());
    }

    #[test]
    fn reply_without_image_is_invalid() {
        let empty_json = CannedTransport::json(r#"{"editedImage": "", "status": "ok"}"#);
        assert!(matches!(send(&empty_json), Err(EditError::MissingImage)));

        let blank_text = CannedTransport::new(200, Some("text/plain"), "   ");
        assert!(matches!(send(&blank_text), Err(EditError::MissingImage)));
    }

    #[test]
    fn malformed_json_is_error() {
        let transport = CannedTransport::json("{not json");
        assert!(matches!(send(&transport), Err(EditError::Json(_))));
    }

    #[test]
    fn http_error_status() {
        let transport = CannedTransport::new(502, Some("text/html"), "<h1>Bad Gateway</h1>");
        let err = send(&transport).unwrap_err();
        assert!(matches!(err, EditError::Status(502)));
        assert_eq!(err.to_string(), "Editing service answered HTTP 502");
    }

    #[test]
    fn rejected_upload_is_never_sent() {
        let transport = CannedTransport::json(r#"{"editedImage": "x"}"#);
        let result = send_for_edit(
            &transport,
            "photo.jpg",
            JPEG,
            Some("image/gif"),
            &UploadConfig::default(),
        );
        assert!(matches!(
            result,
            Err(EditError::Rejected(UploadError::UnsupportedType(_)))
        ));
        assert_eq!(transport.calls.get(), 0);
    }

    #[test]
    fn unreachable_webhook_is_http_error() {
        let transport =
            WebhookTransport::new("http://127.0.0.1:9/webhook", Duration::from_millis(200)).unwrap();
        let result = send_for_edit(&transport, "photo.jpg", JPEG, None, &UploadConfig::default());
        assert!(matches!(result, Err(EditError::Http(_) | EditError::Timeout)));
    }
}
