//! One-publisher, many-subscriber relay
//!
//! The relay is the publisher's audio and video sink. Every packet it
//! receives is handed to each live subscriber as the same `SharedPacket`,
//! so fan-out costs one reference count per subscriber and no copies.
//! Subscribers send feedback back to the relay, which forwards it to the
//! publisher's feedback sink.
//!
//! ```text
//!                          Arc<FanoutRelay>
//!                    ┌────────────────────────────┐
//!   [Publisher] ───► │ subscribers: HashMap<id,   │ ───► [Subscriber]
//!        ▲           │   Weak<dyn MediaSink>>     │ ───► [Subscriber]
//!        │           └────────────────────────────┘
//!        └──── deliver_feedback ◄──── feedback sources of subscribers
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::error::{Error, Result};
use crate::graph::{DeliveryStatus, FeedbackSink, MediaSink, MediaSinkCore, MediaSource};
use crate::packet::SharedPacket;
use crate::stats::{DeliverySnapshot, DeliveryStats};

use super::config::RelayConfig;
use super::is_same_object;

/// Status returned when there is no live publisher to act on a request
pub const NO_PUBLISHER: DeliveryStatus = -1;

/// Status returned for feedback while forwarding is disabled
pub const FEEDBACK_DISABLED: DeliveryStatus = -2;

/// Status returned for media delivered after `close()`
pub const RELAY_CLOSED: DeliveryStatus = -3;

/// Fan-out relay
///
/// Delivery returns the number of subscribers that accepted the packet
/// (status >= 0), or [`RELAY_CLOSED`] once closed.
pub struct FanoutRelay {
    core: MediaSinkCore,
    config: RelayConfig,
    publisher: Mutex<Option<Weak<dyn MediaSource>>>,
    subscribers: RwLock<HashMap<String, Weak<dyn MediaSink>>>,
    closed: AtomicBool,
    stats: DeliveryStats,
    self_ref: Weak<FanoutRelay>,
}

impl FanoutRelay {
    /// Create a relay with default configuration
    pub fn new() -> Arc<Self> {
        Self::with_config(RelayConfig::default())
    }

    /// Create a relay with custom configuration
    pub fn with_config(config: RelayConfig) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            core: MediaSinkCore::new(),
            config,
            publisher: Mutex::new(None),
            subscribers: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
            stats: DeliveryStats::new(),
            self_ref: self_ref.clone(),
        })
    }

    /// Get the relay configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Make this relay the publisher's audio and video sink
    ///
    /// The relay accepts the publisher's current SSRCs as its own sink SSRCs.
    pub fn attach_publisher(&self, publisher: &Arc<dyn MediaSource>) -> Result<()> {
        if self.is_closed() {
            return Err(Error::RelayClosed);
        }
        let Some(me) = self.self_ref.upgrade() else {
            return Err(Error::RelayClosed);
        };
        let me: Arc<dyn MediaSink> = me;

        let previous = self.publisher.lock().replace(Arc::downgrade(publisher));
        if let Some(previous) = previous.and_then(|weak| weak.upgrade()) {
            self.release_publisher(&previous);
        }

        publisher.set_audio_sink(Some(&me));
        publisher.set_video_sink(Some(&me));
        self.core.set_audio_sink_ssrc(publisher.audio_source_ssrc());
        self.core.set_video_sink_ssrc(publisher.video_source_ssrc());

        tracing::info!(
            video_ssrc = publisher.video_source_ssrc(),
            audio_ssrc = publisher.audio_source_ssrc(),
            subscribers = self.subscriber_count(),
            "Publisher attached"
        );

        Ok(())
    }

    /// Stop receiving from the current publisher
    pub fn detach_publisher(&self) {
        let previous = self.publisher.lock().take();
        if let Some(publisher) = previous.and_then(|weak| weak.upgrade()) {
            self.release_publisher(&publisher);
            tracing::info!(
                video_ssrc = publisher.video_source_ssrc(),
                "Publisher detached"
            );
        }
    }

    /// Current publisher, if still alive
    pub fn publisher(&self) -> Option<Arc<dyn MediaSource>> {
        self.publisher.lock().as_ref().and_then(Weak::upgrade)
    }

    /// Register a subscriber
    ///
    /// The subscriber's feedback source, if it has one, is pointed at this
    /// relay.
    pub fn add_subscriber(&self, id: impl Into<String>, sink: &Arc<dyn MediaSink>) -> Result<()> {
        let id = id.into();
        if self.is_closed() {
            return Err(Error::RelayClosed);
        }

        let count = {
            let mut subscribers = self.subscribers.write();
            subscribers.retain(|_, weak| weak.strong_count() > 0);

            if subscribers.contains_key(&id) {
                return Err(Error::SubscriberExists(id));
            }
            if self.config.max_subscribers > 0 && subscribers.len() >= self.config.max_subscribers
            {
                tracing::warn!(
                    subscriber = %id,
                    max = self.config.max_subscribers,
                    "Subscriber rejected, limit reached"
                );
                return Err(Error::SubscriberLimit(self.config.max_subscribers));
            }

            subscribers.insert(id.clone(), Arc::downgrade(sink));
            subscribers.len()
        };

        if let (Some(feedback), Some(me)) = (sink.feedback_source(), self.self_ref.upgrade()) {
            let me: Arc<dyn FeedbackSink> = me;
            feedback.set_feedback_sink(Some(&me));
        }

        tracing::info!(subscriber = %id, subscribers = count, "Subscriber added");

        if self.config.keyframe_on_subscribe {
            self.request_keyframe();
        }

        Ok(())
    }

    /// Unregister a subscriber
    pub fn remove_subscriber(&self, id: &str) -> Result<()> {
        let removed = self
            .subscribers
            .write()
            .remove(id)
            .ok_or_else(|| Error::SubscriberNotFound(id.to_string()))?;

        if let Some(sink) = removed.upgrade() {
            self.release_subscriber(&sink);
        }

        tracing::info!(
            subscriber = %id,
            subscribers = self.subscriber_count(),
            "Subscriber removed"
        );
        Ok(())
    }

    /// Check if a live subscriber is registered under `id`
    pub fn has_subscriber(&self, id: &str) -> bool {
        self.subscribers
            .read()
            .get(id)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Ask the publisher for a keyframe
    pub fn request_keyframe(&self) -> DeliveryStatus {
        match self.publisher() {
            Some(publisher) => {
                tracing::debug!(video_ssrc = publisher.video_source_ssrc(), "Requesting keyframe");
                publisher.send_pli()
            }
            None => NO_PUBLISHER,
        }
    }

    /// Check if the relay has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Delivery counters
    pub fn stats(&self) -> DeliverySnapshot {
        self.stats.snapshot()
    }

    /// Detach the publisher and every subscriber; idempotent
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.detach_publisher();

        let subscribers: Vec<_> = self.subscribers.write().drain().collect();
        for (_, weak) in &subscribers {
            if let Some(sink) = weak.upgrade() {
                self.release_subscriber(&sink);
            }
        }

        tracing::info!(subscribers = subscribers.len(), "Relay closed");
    }

    /// Live subscribers, cloned out so no lock is held during delivery
    fn live_subscribers(&self) -> Vec<Arc<dyn MediaSink>> {
        let (live, dead) = {
            let subscribers = self.subscribers.read();
            let live: Vec<_> = subscribers.values().filter_map(Weak::upgrade).collect();
            let dead = subscribers.len() - live.len();
            (live, dead)
        };

        if dead > 0 {
            self.subscribers.write().retain(|_, weak| weak.strong_count() > 0);
            tracing::debug!(pruned = dead, "Pruned dropped subscribers");
        }

        live
    }

    fn fan_out<F>(&self, packet: SharedPacket, deliver: F) -> DeliveryStatus
    where
        F: Fn(&dyn MediaSink, SharedPacket) -> DeliveryStatus,
    {
        let mut accepted: DeliveryStatus = 0;
        for sink in self.live_subscribers() {
            if deliver(sink.as_ref(), Arc::clone(&packet)) >= 0 {
                accepted += 1;
            } else {
                self.stats.on_dropped();
            }
        }
        accepted
    }

    fn release_publisher(&self, publisher: &Arc<dyn MediaSource>) {
        let core = publisher.source_core();
        if core.audio_sink().is_some_and(|sink| is_same_object(&sink, self)) {
            core.set_audio_sink(None);
        }
        if core.video_sink().is_some_and(|sink| is_same_object(&sink, self)) {
            core.set_video_sink(None);
        }
    }

    fn release_subscriber(&self, sink: &Arc<dyn MediaSink>) {
        if let Some(feedback) = sink.feedback_source() {
            if feedback
                .feedback_sink()
                .is_some_and(|target| is_same_object(&target, self))
            {
                feedback.clear_feedback_sink();
            }
        }
    }
}

impl MediaSink for FanoutRelay {
    fn sink_core(&self) -> &MediaSinkCore {
        &self.core
    }

    fn on_audio_data(&self, packet: SharedPacket) -> DeliveryStatus {
        if self.is_closed() {
            self.stats.on_dropped();
            tracing::warn!(len = packet.len(), "Audio delivered into closed relay");
            return RELAY_CLOSED;
        }
        self.stats.on_audio(&packet);
        self.fan_out(packet, |sink, packet| sink.deliver_audio_data(packet))
    }

    fn on_video_data(&self, packet: SharedPacket) -> DeliveryStatus {
        if self.is_closed() {
            self.stats.on_dropped();
            tracing::warn!(len = packet.len(), "Video delivered into closed relay");
            return RELAY_CLOSED;
        }
        self.stats.on_video(&packet);
        tracing::trace!(len = packet.len(), keyframe = packet.is_keyframe, "Relaying video");
        self.fan_out(packet, |sink, packet| sink.deliver_video_data(packet))
    }

    fn close(&self) {
        FanoutRelay::close(self)
    }
}

impl FeedbackSink for FanoutRelay {
    fn on_feedback(&self, packet: SharedPacket) -> DeliveryStatus {
        self.stats.on_feedback();

        if !self.config.forward_feedback {
            return FEEDBACK_DISABLED;
        }

        match self.publisher().and_then(|publisher| publisher.feedback_sink()) {
            Some(target) => target.deliver_feedback(packet),
            None => NO_PUBLISHER,
        }
    }
}
