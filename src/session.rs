//! Sequencing of overlapping fit requests.
//!
//! A user can click two format buttons faster than a fit completes. Fits may
//! finish in any order, and only the most recently *requested* one may replace
//! the displayed image. Each request takes a [`FitTicket`] stamped with a
//! generation number; a completion carrying an older generation is stale and
//! is dropped.
//!
//! [`ResultView`] is the state the result screen shows: the original image,
//! the currently displayed edited image, and the last error. It exists from a
//! successful upload until the user starts over.

use crate::image_ref::ImageRef;
use crate::imaging::{BackendError, FitResult};
use std::sync::atomic::{AtomicU64, Ordering};

/// Message shown when a reformat fails. The previous edited image stays up.
pub const FIT_FAILED_MESSAGE: &str = "Formatting failed, try again";

/// Generation stamp for one fit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FitTicket(u64);

impl FitTicket {
    pub fn generation(self) -> u64 {
        self.0
    }
}

/// Issues tickets and decides which one is current.
#[derive(Debug, Default)]
pub struct FitSequencer {
    latest: AtomicU64,
}

impl FitSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request. The returned ticket supersedes every earlier one.
    pub fn begin(&self) -> FitTicket {
        FitTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: FitTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// Make every outstanding ticket stale without issuing a new one.
    pub fn abandon(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }
}

/// What the upload collaborator hands over after a successful edit.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadResult {
    pub original_image: ImageRef,
    pub edited_image: ImageRef,
}

/// Outcome of delivering a fit completion to a [`ResultView`].
#[derive(Debug, PartialEq)]
pub enum Completion {
    /// The result replaced the edited image.
    Applied,
    /// A newer request was made after this one; the result was dropped.
    Stale,
    /// The current request failed; the edited image is unchanged.
    Failed(String),
}

#[derive(Debug)]
pub struct ResultView {
    original: ImageRef,
    edited: ImageRef,
    sequencer: FitSequencer,
    last_error: Option<String>,
}

impl ResultView {
    pub fn new(upload: UploadResult) -> Self {
        Self {
            original: upload.original_image,
            edited: upload.edited_image,
            sequencer: FitSequencer::new(),
            last_error: None,
        }
    }

    pub fn original(&self) -> &ImageRef {
        &self.original
    }

    pub fn edited(&self) -> &ImageRef {
        &self.edited
    }

    /// The image the next fit should read: always the displayed edited image,
    /// never the original. After a reformat this is the previous fit result.
    pub fn source(&self) -> &ImageRef {
        &self.edited
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Register a new fit request.
    pub fn request(&self) -> FitTicket {
        self.sequencer.begin()
    }

    /// Deliver the outcome of the fit started with `ticket`.
    pub fn complete(
        &mut self,
        ticket: FitTicket,
        result: Result<FitResult, BackendError>,
    ) -> Completion {
        if !self.sequencer.is_current(ticket) {
            log::warn!(
                "dropping stale fit result (generation {})",
                ticket.generation()
            );
            return Completion::Stale;
        }
        match result {
            Ok(fitted) => {
                self.edited = fitted.image;
                self.last_error = None;
                Completion::Applied
            }
            Err(e) => {
                log::warn!("fit failed: {e}");
                self.last_error = Some(FIT_FAILED_MESSAGE.to_string());
                Completion::Failed(FIT_FAILED_MESSAGE.to_string())
            }
        }
    }

    /// The user is leaving this view: anything still in flight becomes stale.
    pub fn abandon(&self) {
        self.sequencer.abandon();
    }
}
