//! Delivery counters for graph endpoints

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::packet::DataPacket;

/// Lock-free delivery counters
///
/// Updated from any delivery thread; read with [`snapshot`](Self::snapshot).
#[derive(Debug)]
pub struct DeliveryStats {
    started_at: Instant,
    audio_packets: AtomicU64,
    video_packets: AtomicU64,
    feedback_packets: AtomicU64,
    bytes: AtomicU64,
    keyframes: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`DeliveryStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliverySnapshot {
    /// Audio packets accepted
    pub audio_packets: u64,
    /// Video packets accepted
    pub video_packets: u64,
    /// Feedback packets handled
    pub feedback_packets: u64,
    /// Payload bytes accepted (audio + video)
    pub bytes: u64,
    /// Video packets carrying the keyframe marker
    pub keyframes: u64,
    /// Packets dropped or rejected
    pub dropped: u64,
    /// Time since the counters were created
    pub duration: Duration,
}

impl DeliverySnapshot {
    /// Media bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration.as_secs();
        if secs > 0 {
            (self.bytes * 8) / secs
        } else {
            0
        }
    }
}

impl DeliveryStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            audio_packets: AtomicU64::new(0),
            video_packets: AtomicU64::new(0),
            feedback_packets: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            keyframes: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Count an accepted audio packet
    pub fn on_audio(&self, packet: &DataPacket) {
        self.audio_packets.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(packet.len() as u64, Ordering::Relaxed);
    }

    /// Count an accepted video packet
    pub fn on_video(&self, packet: &DataPacket) {
        self.video_packets.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(packet.len() as u64, Ordering::Relaxed);
        if packet.is_keyframe {
            self.keyframes.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count a feedback packet
    pub fn on_feedback(&self) {
        self.feedback_packets.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a dropped packet
    pub fn on_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counters
    pub fn snapshot(&self) -> DeliverySnapshot {
        DeliverySnapshot {
            audio_packets: self.audio_packets.load(Ordering::Relaxed),
            video_packets: self.video_packets.load(Ordering::Relaxed),
            feedback_packets: self.feedback_packets.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            keyframes: self.keyframes.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            duration: self.started_at.elapsed(),
        }
    }
}

impl Default for DeliveryStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketType;

    #[test]
    fn test_stats_new() {
        let stats = DeliveryStats::new().snapshot();
        assert_eq!(stats.audio_packets, 0);
        assert_eq!(stats.video_packets, 0);
        assert_eq!(stats.feedback_packets, 0);
        assert_eq!(stats.bytes, 0);
        assert_eq!(stats.keyframes, 0);
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn test_stats_counts() {
        let stats = DeliveryStats::new();
        let audio = DataPacket::new(1, &[0u8; 100], PacketType::Audio).unwrap();
        let key = DataPacket::video(1, &[0u8; 1000]).unwrap().with_keyframe(true);
        let delta = DataPacket::video(1, &[0u8; 500]).unwrap();

        stats.on_audio(&audio);
        stats.on_video(&key);
        stats.on_video(&delta);
        stats.on_feedback();
        stats.on_dropped();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.audio_packets, 1);
        assert_eq!(snapshot.video_packets, 2);
        assert_eq!(snapshot.keyframes, 1);
        assert_eq!(snapshot.bytes, 1600);
        assert_eq!(snapshot.feedback_packets, 1);
        assert_eq!(snapshot.dropped, 1);
    }

    #[test]
    fn test_bitrate() {
        let snapshot = DeliverySnapshot {
            bytes: 1_000_000,
            duration: Duration::from_secs(10),
            ..Default::default()
        };

        // 1,000,000 bytes * 8 bits / 10 seconds = 800,000 bps
        assert_eq!(snapshot.bitrate(), 800_000);
    }

    #[test]
    fn test_bitrate_zero_duration() {
        let snapshot = DeliverySnapshot {
            bytes: 1_000_000,
            ..Default::default()
        };
        assert_eq!(snapshot.bitrate(), 0);
    }
}
