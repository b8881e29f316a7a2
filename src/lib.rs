//! Media-plane data-flow core for a selective forwarding unit
//!
//! This crate moves RTP/RTCP-bearing packets between network-facing endpoints
//! and processing stages. It provides:
//!
//! - [`packet`]: the fixed-capacity `DataPacket` shared by every stage
//! - [`graph`]: the `MediaSource` / `MediaSink` attach-and-deliver contract,
//!   the backward feedback channel, and the shared `Monitor` guard
//! - [`relay`]: fan-out and SVC layer-filter stages built on the graph
//! - [`sinks`]: a channel-backed sink bridging into async processing
//!
//! Header parsing, transport security, and congestion control live outside
//! this crate and talk to it through the graph traits.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use sfu_core::graph::MediaSink;
//! use sfu_core::packet::{DataPacket, PacketType};
//! use sfu_core::relay::FanoutRelay;
//! use sfu_core::sinks::{ChannelSink, ChannelSinkConfig};
//!
//! let relay = FanoutRelay::new();
//! let (sink, mut rx) = ChannelSink::new(ChannelSinkConfig::default());
//! let sink: Arc<dyn MediaSink> = Arc::new(sink);
//! relay.add_subscriber("viewer", &sink).unwrap();
//!
//! let packet = DataPacket::new(1, &[0x80, 0x60, 0x00, 0x01], PacketType::Video)
//!     .unwrap()
//!     .into_shared();
//! assert_eq!(relay.deliver_video_data(packet), 1);
//! assert!(rx.try_recv().is_ok());
//! ```

pub mod error;
pub mod graph;
pub mod packet;
pub mod relay;
pub mod sinks;
pub mod stats;

#[cfg(test)]
pub(crate) mod test_util;

pub use error::{Error, Result};
pub use graph::{
    DeliveryStatus, FeedbackSink, FeedbackSource, MediaSink, MediaSinkCore, MediaSource,
    MediaSourceCore, Monitor,
};
pub use packet::{DataPacket, LayerDimension, PacketType, SharedPacket, MAX_PACKET_SIZE};
