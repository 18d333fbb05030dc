//! Before/after comparison slider.
//!
//! The comparison view stacks two layers in one container: the edited image
//! as the background and the original on top, clipped at the split position.
//! [`SliderController`] is the view-model behind it. It tracks the split as a
//! percentage of the container width and updates it from drag gestures.
//!
//! ```text
//!   0%                 position                100%
//!   ├──── original ──────┤├──────── edited ───────┤
//!                        handle
//! ```
//!
//! # Drag sessions
//!
//! A drag starts on the narrow handle but must keep tracking the pointer after
//! it leaves the handle, so the host listens for move/end events at document
//! scope for the duration of the drag. The controller owns that subscription:
//! it attaches through [`ListenerHost::attach`] on drag start and hands the
//! token back to [`ListenerHost::detach`] on every way out (end, cancel, and
//! dropping the controller when the view unmounts). A second start while a
//! drag is live is ignored, so a session never holds two subscriptions.
//!
//! # Invariants
//!
//! - `position()` is always within `0.0..=100.0`.
//! - Resizing the container never changes `position()`; only the derived
//!   pixel offsets move.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Split position on mount.
pub const INITIAL_POSITION: f64 = 50.0;

/// Registers and removes the document-scope move/end listeners for a drag.
pub trait ListenerHost {
    /// Proof of a live registration; consumed by [`detach`](Self::detach).
    type Subscription;

    fn attach(&mut self) -> Self::Subscription;

    fn detach(&mut self, subscription: Self::Subscription);
}

/// Host that only counts live subscriptions.
///
/// Used for headless replay and for checking that drags never leak listeners.
#[derive(Debug, Default)]
pub struct TrackingHost {
    next_id: u64,
    live: Vec<u64>,
    attached_total: u64,
}

/// Token handed out by [`TrackingHost`].
#[derive(Debug, PartialEq, Eq)]
pub struct ListenerToken(u64);

impl TrackingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_subscriptions(&self) -> usize {
        self.live.len()
    }

    pub fn attached_total(&self) -> u64 {
        self.attached_total
    }
}

impl ListenerHost for TrackingHost {
    type Subscription = ListenerToken;

    fn attach(&mut self) -> ListenerToken {
        self.next_id += 1;
        self.attached_total += 1;
        self.live.push(self.next_id);
        ListenerToken(self.next_id)
    }

    fn detach(&mut self, subscription: ListenerToken) {
        self.live.retain(|id| *id != subscription.0);
    }
}

impl<H: ListenerHost> ListenerHost for &mut H {
    type Subscription = H::Subscription;

    fn attach(&mut self) -> Self::Subscription {
        (**self).attach()
    }

    fn detach(&mut self, subscription: Self::Subscription) {
        (**self).detach(subscription)
    }
}

/// Layout box of the slider container, in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerBox {
    pub left: f64,
    pub width: f64,
}

impl ContainerBox {
    pub fn new(left: f64, width: f64) -> Self {
        Self { left, width }
    }

    fn is_usable(&self) -> bool {
        self.left.is_finite() && self.width.is_finite() && self.width > 0.0
    }
}

enum DragState<S> {
    Idle,
    Dragging(S),
}

pub struct SliderController<H: ListenerHost> {
    position: f64,
    container: ContainerBox,
    state: DragState<H::Subscription>,
    host: H,
}

impl<H: ListenerHost> SliderController<H> {
    /// Mount a controller: split at 50%, not dragging.
    pub fn new(host: H, container: ContainerBox) -> Self {
        Self {
            position: INITIAL_POSITION,
            container,
            state: DragState::Idle,
            host,
        }
    }

    /// Split position in percent; 0 shows only the edited image, 100 only the original.
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    pub fn container(&self) -> ContainerBox {
        self.container
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Idle → Dragging. Attaches the document-scope listeners.
    pub fn on_drag_start(&mut self) {
        if self.is_dragging() {
            log::warn!("drag start while already dragging; ignored");
            return;
        }
        let subscription = self.host.attach();
        self.state = DragState::Dragging(subscription);
    }

    /// Move the split to follow the pointer. Ignored unless dragging.
    pub fn on_drag_move(&mut self, pointer_x: f64) {
        if !self.is_dragging() {
            return;
        }
        if !pointer_x.is_finite() || !self.container.is_usable() {
            log::warn!(
                "ignoring drag move to {pointer_x} in container {:?}",
                self.container
            );
            return;
        }
        let offset = (pointer_x - self.container.left).clamp(0.0, self.container.width);
        self.position = (offset / self.container.width * 100.0).clamp(0.0, 100.0);
    }

    /// Dragging → Idle. Detaches the listeners; a no-op when idle.
    pub fn on_drag_end(&mut self) {
        if let DragState::Dragging(subscription) =
            std::mem::replace(&mut self.state, DragState::Idle)
        {
            self.host.detach(subscription);
        }
    }

    /// Pointer/touch cancel. Same exit path as [`on_drag_end`](Self::on_drag_end).
    pub fn on_drag_cancel(&mut self) {
        self.on_drag_end();
    }

    /// The container's width changed (mount, window resize).
    pub fn on_container_resize(&mut self, width: f64) {
        self.container.width = width;
    }

    /// The container moved and/or resized.
    pub fn on_container_layout(&mut self, left: f64, width: f64) {
        self.container = ContainerBox::new(left, width);
    }

    /// Handle position in pixels from the container's left edge.
    pub fn handle_offset_px(&self) -> f64 {
        self.position * self.container.width.max(0.0) / 100.0
    }

    /// Visible width of the clipped original layer.
    pub fn clip_width_px(&self) -> f64 {
        self.handle_offset_px()
    }

    /// Width the original image is drawn at: always the full container, so
    /// moving the clip reveals or hides it without rescaling.
    pub fn original_layer_width_px(&self) -> f64 {
        self.container.width.max(0.0)
    }

    pub fn frame(&self) -> SliderFrame {
        SliderFrame {
            position: self.position,
            dragging: self.is_dragging(),
            container_width: self.container.width,
            handle_px: self.handle_offset_px(),
        }
    }

    /// Apply one scripted event and return the resulting frame.
    pub fn apply(&mut self, event: SliderEvent) -> SliderFrame {
        match event {
            SliderEvent::Start => self.on_drag_start(),
            SliderEvent::Move(x) => self.on_drag_move(x),
            SliderEvent::End => self.on_drag_end(),
            SliderEvent::Cancel => self.on_drag_cancel(),
            SliderEvent::Resize(width) => self.on_container_resize(width),
        }
        self.frame()
    }
}

impl<H: ListenerHost> Drop for SliderController<H> {
    fn drop(&mut self) {
        self.on_drag_end();
    }
}

/// Snapshot of what the rendering layer needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderFrame {
    pub position: f64,
    pub dragging: bool,
    pub container_width: f64,
    pub handle_px: f64,
}

/// A scripted slider input, as accepted by the `slide` command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SliderEvent {
    Start,
    Move(f64),
    End,
    Cancel,
    Resize(f64),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SliderEventError {
    #[error("Unknown slider event '{0}' (expected start, move:<x>, end, cancel, resize:<w>)")]
    Unknown(String),
    #[error("Event '{0}' needs a numeric argument")]
    BadNumber(String),
}

impl FromStr for SliderEvent {
    type Err = SliderEventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s, None),
        };
        let number = || -> Result<f64, SliderEventError> {
            arg.and_then(|a| a.trim().parse::<f64>().ok())
                .ok_or_else(|| SliderEventError::BadNumber(s.to_string()))
        };
        match (name.trim(), arg) {
            ("start", None) => Ok(Self::Start),
            ("end", None) => Ok(Self::End),
            ("cancel", None) => Ok(Self::Cancel),
            ("move", _) => number().map(Self::Move),
            ("resize", _) => number().map(Self::Resize),
            _ => Err(SliderEventError::Unknown(s.to_string())),
        }
    }
}

impl fmt::Display for SliderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Move(x) => write!(f, "move:{x}"),
            Self::End => write!(f, "end"),
            Self::Cancel => write!(f, "cancel"),
            Self::Resize(w) => write!(f, "resize:{w}"),
        }
    }
}
