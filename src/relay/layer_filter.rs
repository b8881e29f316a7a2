//! Scalable-video layer filter
//!
//! A pipeline stage that is both a media sink (facing upstream) and a media
//! source (facing downstream). Both roles are built on the same `Monitor`,
//! so SSRCs and attachments on either side share one critical section. The
//! target layer pair lives in a single atomic word so it is always read and
//! replaced as a pair.
//!
//! Video packets pass only when they satisfy the target spatial and temporal
//! layers. A dimension with no declared layers is unrestricted. Audio always
//! passes. Feedback from downstream is relayed upstream unchanged.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::graph::{
    DeliveryStatus, FeedbackSink, FeedbackSource, MediaSink, MediaSinkCore, MediaSource,
    MediaSourceCore, Monitor,
};
use crate::packet::{DataPacket, SharedPacket};
use crate::stats::{DeliverySnapshot, DeliveryStats};

use super::config::LayerFilterConfig;
use super::is_same_object;

/// Status for a packet withheld by the filter, or delivered after close
pub const FILTERED: DeliveryStatus = -3;

/// Status when nothing is attached downstream
pub const NO_DOWNSTREAM: DeliveryStatus = -1;

/// Status when there is no live upstream to act on a request
pub const NO_UPSTREAM: DeliveryStatus = -2;

/// SVC layer filter stage
pub struct LayerFilter {
    sink_core: MediaSinkCore,
    source_core: MediaSourceCore,
    config: LayerFilterConfig,
    // (spatial << 32) | temporal
    target: AtomicU64,
    upstream: Mutex<Option<Weak<dyn MediaSource>>>,
    feedback: Arc<FeedbackSource>,
    closed: AtomicBool,
    stats: DeliveryStats,
    self_ref: Weak<LayerFilter>,
}

impl LayerFilter {
    /// Create a filter
    ///
    /// The filter is its own feedback sink: downstream stages find it through
    /// [`MediaSource::feedback_sink`].
    pub fn new(config: LayerFilterConfig) -> Arc<Self> {
        let monitor = Monitor::new();

        let filter = Arc::new_cyclic(|self_ref| Self {
            sink_core: MediaSinkCore::with_monitor(monitor.clone()),
            source_core: MediaSourceCore::with_monitor(monitor),
            target: AtomicU64::new(pack_layers(config.spatial_layer, config.temporal_layer)),
            config,
            upstream: Mutex::new(None),
            feedback: Arc::new(FeedbackSource::new()),
            closed: AtomicBool::new(false),
            stats: DeliveryStats::new(),
            self_ref: self_ref.clone(),
        });

        filter
            .sink_core
            .set_feedback_source(Some(Arc::clone(&filter.feedback)));
        let me: Arc<dyn FeedbackSink> = filter.clone();
        filter.source_core.set_feedback_sink(Some(&me));

        filter
    }

    /// Receive from `upstream`
    ///
    /// The filter becomes upstream's audio and video sink, sends feedback to
    /// upstream's feedback sink, and takes over upstream's SSRCs both as the
    /// SSRCs it accepts and the SSRCs it emits.
    pub fn connect_upstream(&self, upstream: &Arc<dyn MediaSource>) -> Result<()> {
        if self.is_closed() {
            return Err(Error::RelayClosed);
        }
        let Some(me) = self.self_ref.upgrade() else {
            return Err(Error::RelayClosed);
        };
        let me: Arc<dyn MediaSink> = me;

        let previous = self.upstream.lock().replace(Arc::downgrade(upstream));
        if let Some(previous) = previous.and_then(|weak| weak.upgrade()) {
            self.release_upstream(&previous);
        }

        upstream.set_audio_sink(Some(&me));
        upstream.set_video_sink(Some(&me));
        self.feedback
            .set_feedback_sink(upstream.feedback_sink().as_ref());

        let ssrcs = upstream.video_source_ssrc_list();
        let audio_ssrc = upstream.audio_source_ssrc();
        self.sink_core.set_video_sink_ssrc(ssrcs.first().copied().unwrap_or(0));
        self.sink_core.set_audio_sink_ssrc(audio_ssrc);
        self.source_core.set_video_source_ssrc_list(ssrcs);
        self.source_core.set_audio_source_ssrc(audio_ssrc);

        tracing::info!(
            video_ssrc = self.source_core.video_source_ssrc(),
            audio_ssrc = audio_ssrc,
            "Layer filter connected upstream"
        );

        Ok(())
    }

    /// Stop receiving from upstream
    pub fn disconnect_upstream(&self) {
        let previous = self.upstream.lock().take();
        if let Some(upstream) = previous.and_then(|weak| weak.upgrade()) {
            self.release_upstream(&upstream);
        }
        self.feedback.clear_feedback_sink();
    }

    /// Current target layers as `(spatial, temporal)`
    pub fn target_layers(&self) -> (u32, u32) {
        unpack_layers(self.target.load(Ordering::Acquire))
    }

    /// Change the target layers
    ///
    /// Requests a keyframe upstream when the target actually changes and
    /// the filter is configured to do so.
    pub fn set_target_layers(&self, spatial_layer: u32, temporal_layer: u32) {
        let target = pack_layers(spatial_layer, temporal_layer);
        if self.target.swap(target, Ordering::AcqRel) == target {
            return;
        }

        tracing::debug!(
            spatial = spatial_layer,
            temporal = temporal_layer,
            "Layer filter target changed"
        );

        if self.config.keyframe_on_switch {
            let _ = self.send_pli();
        }
    }

    /// Check if a video packet satisfies the current target
    pub fn accepts(&self, packet: &DataPacket) -> bool {
        if self.config.pass_keyframes && packet.is_keyframe {
            return true;
        }

        let (spatial, temporal) = self.target_layers();
        let spatial_ok = packet.compatible_spatial_layers.is_empty()
            || packet.belongs_to_spatial_layer(spatial);
        let temporal_ok = packet.compatible_temporal_layers.is_empty()
            || packet.belongs_to_temporal_layer(temporal);

        spatial_ok && temporal_ok
    }

    /// Check if the filter has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Delivery counters
    pub fn stats(&self) -> DeliverySnapshot {
        self.stats.snapshot()
    }

    /// Disconnect from upstream and downstream; idempotent
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.disconnect_upstream();
        self.source_core.detach_all();

        tracing::debug!(
            video_ssrc = self.source_core.video_source_ssrc(),
            "Layer filter closed"
        );
    }

    fn release_upstream(&self, upstream: &Arc<dyn MediaSource>) {
        let core = upstream.source_core();
        if core.audio_sink().is_some_and(|sink| is_same_object(&sink, self)) {
            core.set_audio_sink(None);
        }
        if core.video_sink().is_some_and(|sink| is_same_object(&sink, self)) {
            core.set_video_sink(None);
        }
    }
}

fn pack_layers(spatial: u32, temporal: u32) -> u64 {
    (u64::from(spatial) << 32) | u64::from(temporal)
}

fn unpack_layers(packed: u64) -> (u32, u32) {
    ((packed >> 32) as u32, packed as u32)
}

impl MediaSink for LayerFilter {
    fn sink_core(&self) -> &MediaSinkCore {
        &self.sink_core
    }

    fn on_audio_data(&self, packet: SharedPacket) -> DeliveryStatus {
        if self.is_closed() {
            self.stats.on_dropped();
            tracing::warn!(len = packet.len(), "Audio delivered into closed layer filter");
            return FILTERED;
        }

        self.stats.on_audio(&packet);
        self.source_core
            .deliver_audio(packet)
            .unwrap_or(NO_DOWNSTREAM)
    }

    fn on_video_data(&self, packet: SharedPacket) -> DeliveryStatus {
        if self.is_closed() {
            self.stats.on_dropped();
            tracing::warn!(len = packet.len(), "Video delivered into closed layer filter");
            return FILTERED;
        }
        if !self.accepts(&packet) {
            self.stats.on_dropped();
            return FILTERED;
        }

        self.stats.on_video(&packet);
        self.source_core
            .deliver_video(packet)
            .unwrap_or(NO_DOWNSTREAM)
    }

    fn close(&self) {
        LayerFilter::close(self)
    }
}

impl MediaSource for LayerFilter {
    fn source_core(&self) -> &MediaSourceCore {
        &self.source_core
    }

    fn send_pli(&self) -> DeliveryStatus {
        let upstream = self.upstream.lock().as_ref().and_then(Weak::upgrade);
        match upstream {
            Some(upstream) => upstream.send_pli(),
            None => NO_UPSTREAM,
        }
    }

    fn close(&self) {
        LayerFilter::close(self)
    }
}

impl FeedbackSink for LayerFilter {
    fn on_feedback(&self, packet: SharedPacket) -> DeliveryStatus {
        self.stats.on_feedback();
        self.feedback.send_feedback(packet).unwrap_or(NO_UPSTREAM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketType;
    use crate::test_util::{RecordingFeedbackSink, RecordingSink, StubSource};

    fn layered(spatial: &[u32], temporal: &[u32]) -> SharedPacket {
        DataPacket::new(1, &[0x90; 200], PacketType::Video)
            .unwrap()
            .with_spatial_layers(spatial.iter().copied())
            .with_temporal_layers(temporal.iter().copied())
            .into_shared()
    }

    struct Chain {
        upstream: Arc<StubSource>,
        upstream_feedback: Arc<RecordingFeedbackSink>,
        filter: Arc<LayerFilter>,
        downstream: Arc<RecordingSink>,
        // Keep the trait-object handles alive
        _handles: (Arc<dyn MediaSource>, Arc<dyn MediaSink>, Arc<dyn FeedbackSink>),
    }

    fn chain(config: LayerFilterConfig) -> Chain {
        let upstream = Arc::new(StubSource::new());
        upstream.set_video_source_ssrc_list(vec![1000, 2000]);
        upstream.set_audio_source_ssrc(3000);

        let upstream_feedback = Arc::new(RecordingFeedbackSink::new(9));
        let feedback_dyn: Arc<dyn FeedbackSink> = upstream_feedback.clone();
        upstream.set_feedback_sink(Some(&feedback_dyn));

        let filter = LayerFilter::new(config);
        let upstream_dyn: Arc<dyn MediaSource> = upstream.clone();
        filter.connect_upstream(&upstream_dyn).unwrap();

        let downstream = Arc::new(RecordingSink::with_feedback());
        let downstream_dyn: Arc<dyn MediaSink> = downstream.clone();
        filter.set_video_sink(Some(&downstream_dyn));
        filter.set_audio_sink(Some(&downstream_dyn));

        Chain {
            upstream,
            upstream_feedback,
            filter,
            downstream,
            _handles: (upstream_dyn, downstream_dyn, feedback_dyn),
        }
    }

    #[test]
    fn test_roles_share_one_monitor() {
        let filter = LayerFilter::new(LayerFilterConfig::default());

        assert!(filter
            .sink_core()
            .monitor()
            .shares_lock_with(filter.source_core().monitor()));
    }

    #[test]
    fn test_connect_mirrors_ssrcs() {
        let c = chain(LayerFilterConfig::default());

        assert_eq!(c.filter.video_sink_ssrc(), 1000);
        assert_eq!(c.filter.audio_sink_ssrc(), 3000);
        assert_eq!(c.filter.video_source_ssrc_list(), vec![1000, 2000]);
        assert!(c.filter.is_video_source_ssrc(2000));
        assert!(c.filter.is_audio_source_ssrc(3000));

        let snapshot = c.filter.source_core().monitor().snapshot();
        assert_eq!(snapshot.video_sink_ssrc, 1000);
        assert_eq!(snapshot.video_source_ssrcs, vec![1000, 2000]);
        assert!(snapshot.has_video_sink);
        assert!(snapshot.has_feedback_sink);
    }

    #[test]
    fn test_forwards_matching_layers() {
        let c = chain(LayerFilterConfig::default().target(1, 0));

        let status = c.upstream.source_core().deliver_video(layered(&[0, 1], &[0]));
        assert_eq!(status, Some(200));

        let status = c.upstream.source_core().deliver_video(layered(&[2], &[0]));
        assert_eq!(status, Some(FILTERED));

        assert_eq!(c.downstream.video_packets().len(), 1);
        assert_eq!(c.filter.stats().dropped, 1);
    }

    #[test]
    fn test_unlayered_packets_pass() {
        let c = chain(LayerFilterConfig::default().target(2, 2));

        c.filter.deliver_video_data(layered(&[], &[]));
        c.filter.deliver_video_data(layered(&[2], &[]));
        c.filter.deliver_video_data(layered(&[], &[1]));

        assert_eq!(c.downstream.video_packets().len(), 2);
    }

    #[test]
    fn test_keyframe_bypass() {
        let c = chain(LayerFilterConfig::default().target(0, 0).pass_keyframes(true));
        let key = DataPacket::video(1, &[0x10; 50])
            .unwrap()
            .with_spatial_layers([2])
            .with_keyframe(true)
            .into_shared();

        assert_eq!(c.filter.deliver_video_data(key), 50);
    }

    #[test]
    fn test_audio_passes_through() {
        let c = chain(LayerFilterConfig::default());
        let audio = DataPacket::new(1, &[1; 30], PacketType::Audio).unwrap().into_shared();

        assert_eq!(c.upstream.source_core().deliver_audio(audio), Some(30));
        assert_eq!(c.downstream.audio_packets().len(), 1);
    }

    #[test]
    fn test_no_downstream() {
        let filter = LayerFilter::new(LayerFilterConfig::default());
        assert_eq!(filter.deliver_video_data(layered(&[0], &[0])), NO_DOWNSTREAM);
    }

    #[test]
    fn test_feedback_relayed_upstream() {
        let c = chain(LayerFilterConfig::default());

        // Downstream wires its feedback source to the filter
        let target = c.filter.feedback_sink().unwrap();
        let fb = c.downstream.feedback_source().unwrap();
        fb.set_feedback_sink(Some(&target));

        let pli = DataPacket::new(2, &[0x81, 0xCE], PacketType::Other).unwrap().into_shared();
        assert_eq!(fb.send_feedback(Arc::clone(&pli)), Some(9));

        let received = c.upstream_feedback.received();
        assert_eq!(received.len(), 1);
        assert!(Arc::ptr_eq(&received[0], &pli));
    }

    #[test]
    fn test_layer_switch_requests_keyframe() {
        let c = chain(LayerFilterConfig::default());

        c.filter.set_target_layers(0, 0);
        assert_eq!(c.upstream.pli_count(), 0);

        c.filter.set_target_layers(1, 0);
        assert_eq!(c.upstream.pli_count(), 1);
        assert_eq!(c.filter.target_layers(), (1, 0));
    }

    #[test]
    fn test_filtered_is_a_failure_status() {
        let c = chain(LayerFilterConfig::default().target(0, 0));
        let relay = crate::relay::FanoutRelay::with_config(
            crate::relay::RelayConfig::default().keyframe_on_subscribe(false),
        );
        let filter_sink: Arc<dyn MediaSink> = c.filter.clone();
        relay.add_subscriber("filtered", &filter_sink).unwrap();

        // Wrong spatial layer: withheld by the filter, so not accepted
        assert_eq!(relay.deliver_video_data(layered(&[3], &[0])), 0);
        assert_eq!(relay.stats().dropped, 1);

        assert_eq!(relay.deliver_video_data(layered(&[0], &[0])), 1);
        assert_eq!(c.downstream.video_packets().len(), 1);
    }

    #[test]
    fn test_target_layers_never_mixed() {
        const WRITERS: u32 = 4;
        const ROUNDS: u32 = 5_000;

        let filter = LayerFilter::new(LayerFilterConfig::default().keyframe_on_switch(false));

        std::thread::scope(|scope| {
            for w in 0..WRITERS {
                let filter = &filter;
                scope.spawn(move || {
                    for r in 0..ROUNDS {
                        let layer = w * ROUNDS + r;
                        filter.set_target_layers(layer, layer);
                    }
                });
            }

            for _ in 0..2 {
                let filter = &filter;
                scope.spawn(move || {
                    for _ in 0..ROUNDS {
                        let (spatial, temporal) = filter.target_layers();
                        assert_eq!(spatial, temporal);
                    }
                });
            }
        });

        let (spatial, temporal) = filter.target_layers();
        assert_eq!(spatial, temporal);
    }

    #[test]
    fn test_send_pli_without_upstream() {
        let filter = LayerFilter::new(LayerFilterConfig::default());
        assert_eq!(filter.send_pli(), NO_UPSTREAM);
    }

    #[test]
    fn test_close_detaches_both_sides() {
        let c = chain(LayerFilterConfig::default());

        c.filter.close();
        c.filter.close();

        assert!(c.upstream.source_core().video_sink().is_none());
        assert!(c.upstream.source_core().audio_sink().is_none());
        assert!(c.filter.source_core().video_sink().is_none());
        assert_eq!(c.filter.deliver_video_data(layered(&[0], &[0])), FILTERED);
        assert!(c.downstream.video_packets().is_empty());
    }
}
