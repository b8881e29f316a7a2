//! Consumer side of the media graph

use std::sync::Arc;

use crate::packet::SharedPacket;

use super::feedback::FeedbackSource;
use super::monitor::{Monitor, SsrcHints};
use super::DeliveryStatus;

/// Guarded state shared by every media sink
///
/// Tracks the SSRCs this sink accepts and the feedback source it emits
/// feedback through.
#[derive(Debug, Clone, Default)]
pub struct MediaSinkCore {
    monitor: Monitor,
}

impl MediaSinkCore {
    /// Create a sink core with its own monitor
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink core on an existing monitor
    ///
    /// Use this when one object is both sink and source so both roles share
    /// one lock.
    pub fn with_monitor(monitor: Monitor) -> Self {
        Self { monitor }
    }

    /// The monitor guarding this core
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Video SSRC this sink accepts
    pub fn video_sink_ssrc(&self) -> u32 {
        self.monitor.lock().sink.video_sink_ssrc
    }

    /// Set the video SSRC this sink accepts
    pub fn set_video_sink_ssrc(&self, ssrc: u32) {
        let mut state = self.monitor.lock();
        state.sink.video_sink_ssrc = ssrc;
        SsrcHints::store(&self.monitor.hints().video_sink, ssrc);
    }

    /// Audio SSRC this sink accepts
    pub fn audio_sink_ssrc(&self) -> u32 {
        self.monitor.lock().sink.audio_sink_ssrc
    }

    /// Set the audio SSRC this sink accepts
    pub fn set_audio_sink_ssrc(&self, ssrc: u32) {
        let mut state = self.monitor.lock();
        state.sink.audio_sink_ssrc = ssrc;
        SsrcHints::store(&self.monitor.hints().audio_sink, ssrc);
    }

    /// Approximate check against the last known video SSRC
    ///
    /// Does not take the lock. Use [`video_sink_ssrc`](Self::video_sink_ssrc)
    /// when the exact value matters.
    pub fn is_video_sink_ssrc(&self, ssrc: u32) -> bool {
        SsrcHints::load(&self.monitor.hints().video_sink) == ssrc
    }

    /// Approximate check against the last known audio SSRC
    pub fn is_audio_sink_ssrc(&self, ssrc: u32) -> bool {
        SsrcHints::load(&self.monitor.hints().audio_sink) == ssrc
    }

    /// Feedback source associated with this sink, if any
    pub fn feedback_source(&self) -> Option<Arc<FeedbackSource>> {
        self.monitor.lock().sink.feedback_source.clone()
    }

    /// Associate a feedback source with this sink
    pub fn set_feedback_source(&self, source: Option<Arc<FeedbackSource>>) {
        self.monitor.lock().sink.feedback_source = source;
    }
}

/// Consumer of audio and video packets
///
/// Callers use `deliver_audio_data` / `deliver_video_data`; implementors
/// provide `on_audio_data` / `on_video_data`. The packet kind is not checked
/// against the call, so implementations must not assume they match.
///
/// The returned status is defined by each implementation.
pub trait MediaSink: Send + Sync {
    /// Guarded sink state
    fn sink_core(&self) -> &MediaSinkCore;

    /// Handle an audio packet
    fn on_audio_data(&self, packet: SharedPacket) -> DeliveryStatus;

    /// Handle a video packet
    fn on_video_data(&self, packet: SharedPacket) -> DeliveryStatus;

    /// Stop the sink and release its resources; must be idempotent
    fn close(&self);

    /// Deliver an audio packet
    fn deliver_audio_data(&self, packet: SharedPacket) -> DeliveryStatus {
        self.on_audio_data(packet)
    }

    /// Deliver a video packet
    fn deliver_video_data(&self, packet: SharedPacket) -> DeliveryStatus {
        self.on_video_data(packet)
    }

    /// Video SSRC this sink accepts
    fn video_sink_ssrc(&self) -> u32 {
        self.sink_core().video_sink_ssrc()
    }

    /// Set the video SSRC this sink accepts
    fn set_video_sink_ssrc(&self, ssrc: u32) {
        self.sink_core().set_video_sink_ssrc(ssrc)
    }

    /// Audio SSRC this sink accepts
    fn audio_sink_ssrc(&self) -> u32 {
        self.sink_core().audio_sink_ssrc()
    }

    /// Set the audio SSRC this sink accepts
    fn set_audio_sink_ssrc(&self, ssrc: u32) {
        self.sink_core().set_audio_sink_ssrc(ssrc)
    }

    /// Approximate, lock-free video SSRC match
    fn is_video_sink_ssrc(&self, ssrc: u32) -> bool {
        self.sink_core().is_video_sink_ssrc(ssrc)
    }

    /// Approximate, lock-free audio SSRC match
    fn is_audio_sink_ssrc(&self, ssrc: u32) -> bool {
        self.sink_core().is_audio_sink_ssrc(ssrc)
    }

    /// Feedback source used to send feedback upstream, if any
    fn feedback_source(&self) -> Option<Arc<FeedbackSource>> {
        self.sink_core().feedback_source()
    }
}
