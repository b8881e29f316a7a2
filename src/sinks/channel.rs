//! Sink that hands packets to an async processing stage
//!
//! Delivery is synchronous and must never wait, so packets are queued with
//! `try_send` on a bounded `tokio::sync::mpsc` channel. A full queue is
//! reported through the status code; the caller decides whether to drop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::graph::{DeliveryStatus, FeedbackSource, MediaSink, MediaSinkCore};
use crate::packet::SharedPacket;
use crate::stats::{DeliverySnapshot, DeliveryStats};

/// Status returned when the queue is full
pub const CHANNEL_FULL: DeliveryStatus = -1;

/// Status returned after `close()` or once the receiver is gone
pub const SINK_CLOSED: DeliveryStatus = -2;

/// Packet handed to the receiving stage
#[derive(Debug, Clone)]
pub enum MediaEvent {
    /// Delivered through `deliver_audio_data`
    Audio(SharedPacket),
    /// Delivered through `deliver_video_data`
    Video(SharedPacket),
}

impl MediaEvent {
    /// The carried packet
    pub fn packet(&self) -> &SharedPacket {
        match self {
            MediaEvent::Audio(packet) | MediaEvent::Video(packet) => packet,
        }
    }
}

/// Channel sink configuration
#[derive(Debug, Clone)]
pub struct ChannelSinkConfig {
    /// Queue capacity in packets
    pub capacity: usize,
}

impl Default for ChannelSinkConfig {
    fn default() -> Self {
        Self { capacity: 512 }
    }
}

impl ChannelSinkConfig {
    /// Set the queue capacity (at least 1)
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }
}

/// Media sink backed by a bounded channel
///
/// Status codes: the packet length on success, [`CHANNEL_FULL`] when the
/// queue is full, [`SINK_CLOSED`] after close.
pub struct ChannelSink {
    core: MediaSinkCore,
    tx: Mutex<Option<mpsc::Sender<MediaEvent>>>,
    closed: AtomicBool,
    feedback: Arc<FeedbackSource>,
    stats: DeliveryStats,
}

impl ChannelSink {
    /// Create a sink and the receiver for its packets
    pub fn new(config: ChannelSinkConfig) -> (Self, mpsc::Receiver<MediaEvent>) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));

        let core = MediaSinkCore::new();
        let feedback = Arc::new(FeedbackSource::new());
        core.set_feedback_source(Some(Arc::clone(&feedback)));

        let sink = Self {
            core,
            tx: Mutex::new(Some(tx)),
            closed: AtomicBool::new(false),
            feedback,
            stats: DeliveryStats::new(),
        };

        (sink, rx)
    }

    /// Send a feedback packet upstream
    ///
    /// Returns `None` if no feedback destination is wired.
    pub fn send_feedback(&self, packet: SharedPacket) -> Option<DeliveryStatus> {
        self.feedback.send_feedback(packet)
    }

    /// Check if the sink has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Delivery counters
    pub fn stats(&self) -> DeliverySnapshot {
        self.stats.snapshot()
    }

    fn enqueue(&self, event: MediaEvent) -> DeliveryStatus {
        let len = event.packet().len() as DeliveryStatus;

        // try_send never waits, so it runs under the guard; close() cannot
        // slip in between the check and the send
        let sent = match self.tx.lock().as_ref() {
            Some(tx) => tx.try_send(event),
            None => Err(mpsc::error::TrySendError::Closed(event)),
        };

        match sent {
            Ok(()) => len,
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.stats.on_dropped();
                tracing::trace!(len = event.packet().len(), "Channel sink full, packet dropped");
                CHANNEL_FULL
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                self.stats.on_dropped();
                tracing::warn!(
                    len = event.packet().len(),
                    closed = self.is_closed(),
                    "Packet delivered into closed channel sink"
                );
                SINK_CLOSED
            }
        }
    }
}

impl MediaSink for ChannelSink {
    fn sink_core(&self) -> &MediaSinkCore {
        &self.core
    }

    fn on_audio_data(&self, packet: SharedPacket) -> DeliveryStatus {
        let status = self.enqueue(MediaEvent::Audio(Arc::clone(&packet)));
        if status >= 0 {
            self.stats.on_audio(&packet);
        }
        status
    }

    fn on_video_data(&self, packet: SharedPacket) -> DeliveryStatus {
        let status = self.enqueue(MediaEvent::Video(Arc::clone(&packet)));
        if status >= 0 {
            self.stats.on_video(&packet);
        }
        status
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        // Dropping the sender ends the stream once the receiver drains it
        self.tx.lock().take();
        self.feedback.clear_feedback_sink();

        tracing::debug!(
            video_ssrc = self.core.video_sink_ssrc(),
            audio_ssrc = self.core.audio_sink_ssrc(),
            "Channel sink closed"
        );
    }
}
