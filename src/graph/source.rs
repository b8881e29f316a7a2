//! Producer side of the media graph

use std::sync::{Arc, Weak};

use crate::packet::SharedPacket;

use super::feedback::FeedbackSink;
use super::monitor::{Monitor, SsrcHints};
use super::sink::MediaSink;
use super::DeliveryStatus;

/// Guarded state shared by every media source
///
/// Holds the SSRCs this source originates, weak references to the attached
/// audio and video sinks, and the feedback sink that receives feedback for
/// this source's streams.
#[derive(Debug, Clone, Default)]
pub struct MediaSourceCore {
    monitor: Monitor,
}

impl MediaSourceCore {
    /// Create a source core with its own monitor
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source core on an existing monitor
    pub fn with_monitor(monitor: Monitor) -> Self {
        Self { monitor }
    }

    /// The monitor guarding this core
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Attach (or with `None`, detach) the audio sink
    pub fn set_audio_sink(&self, sink: Option<&Arc<dyn MediaSink>>) {
        self.monitor.lock().source.audio_sink = sink.map(Arc::downgrade);
        tracing::debug!(attached = sink.is_some(), "Audio sink set");
    }

    /// Attach (or with `None`, detach) the video sink
    pub fn set_video_sink(&self, sink: Option<&Arc<dyn MediaSink>>) {
        self.monitor.lock().source.video_sink = sink.map(Arc::downgrade);
        tracing::debug!(attached = sink.is_some(), "Video sink set");
    }

    /// Attached audio sink, if still alive
    pub fn audio_sink(&self) -> Option<Arc<dyn MediaSink>> {
        self.monitor
            .lock()
            .source
            .audio_sink
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Attached video sink, if still alive
    pub fn video_sink(&self) -> Option<Arc<dyn MediaSink>> {
        self.monitor
            .lock()
            .source
            .video_sink
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Set the feedback sink for this source's streams
    pub fn set_feedback_sink(&self, sink: Option<&Arc<dyn FeedbackSink>>) {
        self.monitor.lock().source.feedback_sink = sink.map(Arc::downgrade);
    }

    /// Feedback sink for this source's streams, if still alive
    pub fn feedback_sink(&self) -> Option<Arc<dyn FeedbackSink>> {
        self.monitor
            .lock()
            .source
            .feedback_sink
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Primary (index 0) video SSRC
    pub fn video_source_ssrc(&self) -> u32 {
        self.monitor
            .lock()
            .source
            .video_source_ssrc_list
            .first()
            .copied()
            .unwrap_or(0)
    }

    /// Set the primary (index 0) video SSRC
    pub fn set_video_source_ssrc(&self, ssrc: u32) {
        let mut state = self.monitor.lock();
        match state.source.video_source_ssrc_list.first_mut() {
            Some(primary) => *primary = ssrc,
            None => state.source.video_source_ssrc_list.push(ssrc),
        }
    }

    /// Snapshot of all video SSRCs in simulcast order
    pub fn video_source_ssrc_list(&self) -> Vec<u32> {
        self.monitor.lock().source.video_source_ssrc_list.clone()
    }

    /// Replace the video SSRC list
    ///
    /// An empty list is stored as `[0]` so index 0 always exists.
    pub fn set_video_source_ssrc_list(&self, ssrcs: Vec<u32>) {
        let ssrcs = if ssrcs.is_empty() { vec![0] } else { ssrcs };
        tracing::debug!(ssrcs = ?ssrcs, "Video source SSRCs set");
        self.monitor.lock().source.video_source_ssrc_list = ssrcs;
    }

    /// Audio SSRC
    pub fn audio_source_ssrc(&self) -> u32 {
        self.monitor.lock().source.audio_source_ssrc
    }

    /// Set the audio SSRC
    pub fn set_audio_source_ssrc(&self, ssrc: u32) {
        let mut state = self.monitor.lock();
        state.source.audio_source_ssrc = ssrc;
        SsrcHints::store(&self.monitor.hints().audio_source, ssrc);
    }

    /// Check if any simulcast variant uses this SSRC
    pub fn is_video_source_ssrc(&self, ssrc: u32) -> bool {
        self.monitor
            .lock()
            .source
            .video_source_ssrc_list
            .contains(&ssrc)
    }

    /// Approximate, lock-free audio SSRC match
    pub fn is_audio_source_ssrc(&self, ssrc: u32) -> bool {
        SsrcHints::load(&self.monitor.hints().audio_source) == ssrc
    }

    /// Forward a video packet to the attached video sink
    ///
    /// Returns `None` if no live sink is attached. The lock is not held
    /// while the sink runs.
    pub fn deliver_video(&self, packet: SharedPacket) -> Option<DeliveryStatus> {
        let sink = self.video_sink()?;
        Some(sink.deliver_video_data(packet))
    }

    /// Forward an audio packet to the attached audio sink
    pub fn deliver_audio(&self, packet: SharedPacket) -> Option<DeliveryStatus> {
        let sink = self.audio_sink()?;
        Some(sink.deliver_audio_data(packet))
    }

    /// Detach both media sinks and the feedback sink
    pub fn detach_all(&self) {
        let mut state = self.monitor.lock();
        state.source.audio_sink = None;
        state.source.video_sink = None;
        state.source.feedback_sink = None;
    }
}

/// Producer of audio and video packets
pub trait MediaSource: Send + Sync {
    /// Guarded source state
    fn source_core(&self) -> &MediaSourceCore;

    /// Ask the origin of this source's media for a new keyframe
    ///
    /// Sources that cannot act on the request return a failure status.
    fn send_pli(&self) -> DeliveryStatus;

    /// Stop the source and release its resources; must be idempotent
    fn close(&self);

    /// Attach (or with `None`, detach) the audio sink
    fn set_audio_sink(&self, sink: Option<&Arc<dyn MediaSink>>) {
        self.source_core().set_audio_sink(sink)
    }

    /// Attach (or with `None`, detach) the video sink
    fn set_video_sink(&self, sink: Option<&Arc<dyn MediaSink>>) {
        self.source_core().set_video_sink(sink)
    }

    /// Feedback sink for this source's streams
    fn feedback_sink(&self) -> Option<Arc<dyn FeedbackSink>> {
        self.source_core().feedback_sink()
    }

    /// Set the feedback sink for this source's streams
    fn set_feedback_sink(&self, sink: Option<&Arc<dyn FeedbackSink>>) {
        self.source_core().set_feedback_sink(sink)
    }

    /// Primary video SSRC
    fn video_source_ssrc(&self) -> u32 {
        self.source_core().video_source_ssrc()
    }

    /// Set the primary video SSRC
    fn set_video_source_ssrc(&self, ssrc: u32) {
        self.source_core().set_video_source_ssrc(ssrc)
    }

    /// Snapshot of all video SSRCs
    fn video_source_ssrc_list(&self) -> Vec<u32> {
        self.source_core().video_source_ssrc_list()
    }

    /// Replace the video SSRC list
    fn set_video_source_ssrc_list(&self, ssrcs: Vec<u32>) {
        self.source_core().set_video_source_ssrc_list(ssrcs)
    }

    /// Audio SSRC
    fn audio_source_ssrc(&self) -> u32 {
        self.source_core().audio_source_ssrc()
    }

    /// Set the audio SSRC
    fn set_audio_source_ssrc(&self, ssrc: u32) {
        self.source_core().set_audio_source_ssrc(ssrc)
    }

    /// Check if any simulcast variant uses this SSRC
    fn is_video_source_ssrc(&self, ssrc: u32) -> bool {
        self.source_core().is_video_source_ssrc(ssrc)
    }

    /// Approximate audio SSRC match
    fn is_audio_source_ssrc(&self, ssrc: u32) -> bool {
        self.source_core().is_audio_source_ssrc(ssrc)
    }
}
