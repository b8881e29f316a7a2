//! Backward feedback channel
//!
//! Feedback (NACK, PLI, REMB, loss reports) travels against the media flow.
//! A sink emits it through its `FeedbackSource`; the source that produced the
//! media receives it through a `FeedbackSink`. Only this narrow contract is
//! shared between the two sides.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::packet::SharedPacket;

use super::DeliveryStatus;

/// Receiver of feedback packets
///
/// Callers always use [`deliver_feedback`](FeedbackSink::deliver_feedback);
/// implementors provide [`on_feedback`](FeedbackSink::on_feedback).
pub trait FeedbackSink: Send + Sync {
    /// Handle a feedback packet
    fn on_feedback(&self, packet: SharedPacket) -> DeliveryStatus;

    /// Deliver a feedback packet addressed to the stream this sink originates
    fn deliver_feedback(&self, packet: SharedPacket) -> DeliveryStatus {
        self.on_feedback(packet)
    }
}

/// Emitter of feedback packets
///
/// Holds at most one destination, weakly. Once the destination is dropped,
/// it is no longer reachable from here.
#[derive(Default)]
pub struct FeedbackSource {
    sink: Mutex<Option<Weak<dyn FeedbackSink>>>,
}

impl FeedbackSource {
    /// Create a feedback source with no destination
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear the feedback destination
    pub fn set_feedback_sink(&self, sink: Option<&Arc<dyn FeedbackSink>>) {
        *self.sink.lock() = sink.map(Arc::downgrade);
        tracing::debug!(attached = sink.is_some(), "Feedback sink set");
    }

    /// Clear the feedback destination
    pub fn clear_feedback_sink(&self) {
        self.set_feedback_sink(None);
    }

    /// Current feedback destination, if still alive
    pub fn feedback_sink(&self) -> Option<Arc<dyn FeedbackSink>> {
        self.sink.lock().as_ref().and_then(Weak::upgrade)
    }

    /// Check if a live destination is set
    pub fn has_feedback_sink(&self) -> bool {
        self.feedback_sink().is_some()
    }

    /// Send a feedback packet to the current destination
    ///
    /// Returns `None` if no destination is set.
    pub fn send_feedback(&self, packet: SharedPacket) -> Option<DeliveryStatus> {
        // Lock released before delivery; the destination may call back into us
        let sink = self.feedback_sink()?;
        tracing::trace!(len = packet.len(), "Sending feedback");
        Some(sink.deliver_feedback(packet))
    }
}

impl std::fmt::Debug for FeedbackSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackSource")
            .field("has_feedback_sink", &self.has_feedback_sink())
            .finish()
    }
}
