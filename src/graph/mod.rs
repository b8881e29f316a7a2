//! Source/sink media graph
//!
//! Producers attach to consumers through two contracts: `MediaSource` pushes
//! audio and video packets forward into an attached `MediaSink`, and feedback
//! flows backward from a sink's `FeedbackSource` into the producer's
//! `FeedbackSink`.
//!
//! # Architecture
//!
//! ```text
//!   [MediaSource] ── deliver_video_data / deliver_audio_data ──► [MediaSink]
//!         ▲                                                          │
//!         │                                                          │
//!   [FeedbackSink] ◄──────────── deliver_feedback ────── [FeedbackSource]
//! ```
//!
//! # Ownership
//!
//! Attachments are weak. A source never keeps its sink alive, and a dropped
//! sink is simply no longer reachable: delivery reports `None` instead of
//! touching freed state. Owners still detach before teardown so that the
//! intent is explicit.
//!
//! # Locking
//!
//! Sink and source state is guarded by a [`Monitor`]. Locks are held only for
//! field access, never across a delivery into another component.

pub mod feedback;
pub mod monitor;
pub mod sink;
pub mod source;

pub use feedback::{FeedbackSink, FeedbackSource};
pub use monitor::{EndpointSnapshot, Monitor};
pub use sink::{MediaSink, MediaSinkCore};
pub use source::{MediaSource, MediaSourceCore};

/// Result of a delivery call
///
/// Non-negative means the packet was accepted, negative means it was
/// withheld or rejected. Zero is a success: an empty packet accepted by a
/// sink that reports bytes queued yields 0. Beyond the sign, the meaning
/// (bytes accepted, subscriber count, error code) is defined by each
/// implementation.
pub type DeliveryStatus = i32;
