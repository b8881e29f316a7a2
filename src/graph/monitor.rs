//! Shared concurrency guard for sink and source state
//!
//! A `Monitor` is a cloneable handle to one lock. Every media sink and media
//! source core is built on a monitor; an object that plays both roles hands
//! the same monitor to both cores, so its sink and source fields live under
//! a single critical section instead of two independent locks.
//!
//! ```text
//!            Monitor (Arc)
//!       ┌──────────────────────┐
//!       │ Mutex<EndpointState> │
//!       │   sink:   SinkState  │◄── MediaSinkCore
//!       │   source: SourceState│◄── MediaSourceCore
//!       │ SsrcHints (atomics)  │
//!       └──────────────────────┘
//! ```
//!
//! The SSRC hints mirror the guarded identifiers and are written only while
//! the lock is held. They serve the approximate `is_*_ssrc` checks on the
//! delivery path without taking the lock.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};

use super::feedback::{FeedbackSink, FeedbackSource};
use super::sink::MediaSink;

/// Sink-side fields
#[derive(Default)]
pub(crate) struct SinkState {
    pub(crate) audio_sink_ssrc: u32,
    pub(crate) video_sink_ssrc: u32,
    pub(crate) feedback_source: Option<Arc<FeedbackSource>>,
}

/// Source-side fields
pub(crate) struct SourceState {
    pub(crate) audio_source_ssrc: u32,
    /// Never empty; index 0 is the primary variant
    pub(crate) video_source_ssrc_list: Vec<u32>,
    pub(crate) audio_sink: Option<Weak<dyn MediaSink>>,
    pub(crate) video_sink: Option<Weak<dyn MediaSink>>,
    pub(crate) feedback_sink: Option<Weak<dyn FeedbackSink>>,
}

impl Default for SourceState {
    fn default() -> Self {
        Self {
            audio_source_ssrc: 0,
            video_source_ssrc_list: vec![0],
            audio_sink: None,
            video_sink: None,
            feedback_sink: None,
        }
    }
}

/// Everything guarded by a monitor
#[derive(Default)]
pub(crate) struct EndpointState {
    pub(crate) sink: SinkState,
    pub(crate) source: SourceState,
}

/// Lock-free mirrors of the scalar SSRCs
#[derive(Debug, Default)]
pub(crate) struct SsrcHints {
    pub(crate) audio_sink: AtomicU32,
    pub(crate) video_sink: AtomicU32,
    pub(crate) audio_source: AtomicU32,
}

impl SsrcHints {
    pub(crate) fn load(hint: &AtomicU32) -> u32 {
        hint.load(Ordering::Acquire)
    }

    pub(crate) fn store(hint: &AtomicU32, ssrc: u32) {
        hint.store(ssrc, Ordering::Release);
    }
}

#[derive(Default)]
struct Shared {
    state: Mutex<EndpointState>,
    hints: SsrcHints,
}

/// Consistent view of an endpoint taken in one critical section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSnapshot {
    /// Audio SSRC accepted by the sink role
    pub audio_sink_ssrc: u32,
    /// Video SSRC accepted by the sink role
    pub video_sink_ssrc: u32,
    /// Audio SSRC emitted by the source role
    pub audio_source_ssrc: u32,
    /// Video SSRCs emitted by the source role (simulcast order)
    pub video_source_ssrcs: Vec<u32>,
    /// Whether a live audio sink is attached
    pub has_audio_sink: bool,
    /// Whether a live video sink is attached
    pub has_video_sink: bool,
    /// Whether a live feedback sink is attached
    pub has_feedback_sink: bool,
}

/// Cloneable handle to one shared lock
#[derive(Clone, Default)]
pub struct Monitor {
    shared: Arc<Shared>,
}

impl Monitor {
    /// Create a monitor with its own lock
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if two handles guard the same state
    pub fn shares_lock_with(&self, other: &Monitor) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Read sink and source fields in a single critical section
    pub fn snapshot(&self) -> EndpointSnapshot {
        let state = self.lock();
        let live = |weak: &Option<Weak<dyn MediaSink>>| {
            weak.as_ref().is_some_and(|w| w.strong_count() > 0)
        };

        EndpointSnapshot {
            audio_sink_ssrc: state.sink.audio_sink_ssrc,
            video_sink_ssrc: state.sink.video_sink_ssrc,
            audio_source_ssrc: state.source.audio_source_ssrc,
            video_source_ssrcs: state.source.video_source_ssrc_list.clone(),
            has_audio_sink: live(&state.source.audio_sink),
            has_video_sink: live(&state.source.video_sink),
            has_feedback_sink: state
                .source
                .feedback_sink
                .as_ref()
                .is_some_and(|w| w.strong_count() > 0),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, EndpointState> {
        self.shared.state.lock()
    }

    pub(crate) fn hints(&self) -> &SsrcHints {
        &self.shared.hints
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("shared", &Arc::as_ptr(&self.shared))
            .finish()
    }
}
