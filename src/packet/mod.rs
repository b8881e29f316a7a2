//! Packet types shared by every pipeline stage
//!
//! This module provides:
//! - `DataPacket`, the fixed-capacity media packet
//! - Layer membership queries for SVC forwarding
//! - A monotonic clock for capture timestamps

pub mod clock;
pub mod data;

pub use clock::{Clock, SimulatedClock, SteadyClock};
pub use data::{DataPacket, LayerDimension, PacketType, SharedPacket, MAX_PACKET_SIZE};
