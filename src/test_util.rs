//! Test doubles for the media graph

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::graph::{
    DeliveryStatus, FeedbackSink, FeedbackSource, MediaSink, MediaSinkCore, MediaSource,
    MediaSourceCore,
};
use crate::packet::SharedPacket;

/// Install a log subscriber honoring `RUST_LOG`
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Sink that records every packet and returns its length
#[derive(Default)]
pub(crate) struct RecordingSink {
    core: MediaSinkCore,
    audio: Mutex<Vec<SharedPacket>>,
    video: Mutex<Vec<SharedPacket>>,
    closes: AtomicUsize,
    feedback: Arc<FeedbackSource>,
}

impl RecordingSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A recording sink that exposes a feedback source
    pub(crate) fn with_feedback() -> Self {
        let sink = Self::default();
        sink.core.set_feedback_source(Some(Arc::clone(&sink.feedback)));
        sink
    }

    pub(crate) fn audio_packets(&self) -> Vec<SharedPacket> {
        self.audio.lock().clone()
    }

    pub(crate) fn video_packets(&self) -> Vec<SharedPacket> {
        self.video.lock().clone()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl MediaSink for RecordingSink {
    fn sink_core(&self) -> &MediaSinkCore {
        &self.core
    }

    fn on_audio_data(&self, packet: SharedPacket) -> DeliveryStatus {
        let len = packet.len() as DeliveryStatus;
        self.audio.lock().push(packet);
        len
    }

    fn on_video_data(&self, packet: SharedPacket) -> DeliveryStatus {
        let len = packet.len() as DeliveryStatus;
        self.video.lock().push(packet);
        len
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Feedback sink that records packets and returns a fixed status
pub(crate) struct RecordingFeedbackSink {
    status: DeliveryStatus,
    received: Mutex<Vec<SharedPacket>>,
}

impl RecordingFeedbackSink {
    pub(crate) fn new(status: DeliveryStatus) -> Self {
        Self {
            status,
            received: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn received(&self) -> Vec<SharedPacket> {
        self.received.lock().clone()
    }
}

impl FeedbackSink for RecordingFeedbackSink {
    fn on_feedback(&self, packet: SharedPacket) -> DeliveryStatus {
        self.received.lock().push(packet);
        self.status
    }
}

/// Source that counts keyframe requests
#[derive(Default)]
pub(crate) struct StubSource {
    core: MediaSourceCore,
    plis: AtomicUsize,
}

impl StubSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn pli_count(&self) -> usize {
        self.plis.load(Ordering::SeqCst)
    }
}

impl MediaSource for StubSource {
    fn source_core(&self) -> &MediaSourceCore {
        &self.core
    }

    fn send_pli(&self) -> DeliveryStatus {
        self.plis.fetch_add(1, Ordering::SeqCst);
        1
    }

    fn close(&self) {
        self.core.detach_all();
    }
}
