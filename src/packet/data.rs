//! Wire-bound media packet
//!
//! A `DataPacket` carries one network-sized fragment of media plus routing
//! metadata. The payload lives in a fixed inline buffer so a packet shared as
//! `Arc<DataPacket>` costs exactly one allocation, and fan-out to many sinks
//! only bumps a reference count.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::{Error, Result};

use super::clock::{self, Clock};

/// Payload capacity of a packet (typical path MTU)
pub const MAX_PACKET_SIZE: usize = 1500;

/// Packet shared between pipeline stages
pub type SharedPacket = Arc<DataPacket>;

/// Classification of a packet's payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Video payload
    Video,
    /// Audio payload
    Audio,
    /// Anything else (RTCP, padding, data channel)
    Other,
}

/// Scalability dimension queried by [`DataPacket::belongs_to_layer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerDimension {
    /// Resolution layers
    Spatial,
    /// Frame-rate layers
    Temporal,
}

/// A media packet
///
/// Payload bytes are copied in at construction and never exposed mutably.
/// Layer sets and the keyframe flag are metadata that a filtering stage may
/// annotate before it shares the packet.
#[derive(Clone)]
pub struct DataPacket {
    /// Transport component (e.g. RTP vs RTCP on a shared transport)
    pub component: u32,
    data: [u8; MAX_PACKET_SIZE],
    length: usize,
    /// Payload classification
    pub packet_type: PacketType,
    /// Local monotonic time the packet was framed, in milliseconds
    pub received_time_ms: u64,
    /// Spatial layers this packet satisfies
    pub compatible_spatial_layers: Vec<u32>,
    /// Temporal layers this packet satisfies
    pub compatible_temporal_layers: Vec<u32>,
    /// Keyframe marker
    ///
    /// For VP8 only the first fragment of a keyframe may carry this flag, so
    /// consumers must not expect every fragment of a keyframe to be marked.
    pub is_keyframe: bool,
}

impl DataPacket {
    /// Create a packet stamped with the current monotonic time
    pub fn new(component: u32, data: &[u8], packet_type: PacketType) -> Result<Self> {
        Self::with_received_time(component, data, packet_type, clock::now_ms())
    }

    /// Create a packet with an explicit capture time (replay, passthrough)
    pub fn with_received_time(
        component: u32,
        data: &[u8],
        packet_type: PacketType,
        received_time_ms: u64,
    ) -> Result<Self> {
        if data.len() > MAX_PACKET_SIZE {
            return Err(Error::PayloadTooLarge {
                length: data.len(),
                capacity: MAX_PACKET_SIZE,
            });
        }

        let mut buf = [0u8; MAX_PACKET_SIZE];
        buf[..data.len()].copy_from_slice(data);

        Ok(Self {
            component,
            data: buf,
            length: data.len(),
            packet_type,
            received_time_ms,
            compatible_spatial_layers: Vec::new(),
            compatible_temporal_layers: Vec::new(),
            is_keyframe: false,
        })
    }

    /// Create a packet stamped from the given clock
    pub fn new_with_clock(
        component: u32,
        data: &[u8],
        packet_type: PacketType,
        clock: &dyn Clock,
    ) -> Result<Self> {
        Self::with_received_time(component, data, packet_type, clock.now_ms())
    }

    /// Create a video packet stamped with the current time
    pub fn video(component: u32, data: &[u8]) -> Result<Self> {
        Self::new(component, data, PacketType::Video)
    }

    /// Wrap into a shareable packet
    pub fn into_shared(self) -> SharedPacket {
        Arc::new(self)
    }

    /// Declare the spatial layers this packet satisfies
    pub fn with_spatial_layers(mut self, layers: impl IntoIterator<Item = u32>) -> Self {
        self.compatible_spatial_layers = layers.into_iter().collect();
        self
    }

    /// Declare the temporal layers this packet satisfies
    pub fn with_temporal_layers(mut self, layers: impl IntoIterator<Item = u32>) -> Self {
        self.compatible_temporal_layers = layers.into_iter().collect();
        self
    }

    /// Mark as (the start of) a keyframe
    pub fn with_keyframe(mut self, is_keyframe: bool) -> Self {
        self.is_keyframe = is_keyframe;
        self
    }

    /// The meaningful payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data[..self.length]
    }

    /// Number of meaningful payload bytes
    pub fn len(&self) -> usize {
        self.length
    }

    /// Check if the payload is empty
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Buffer capacity
    pub fn capacity(&self) -> usize {
        MAX_PACKET_SIZE
    }

    /// Copy the payload into a reference-counted buffer
    ///
    /// For consumers that leave the packet graph (writers, sockets).
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.data())
    }

    /// Check if the packet is video
    pub fn is_video(&self) -> bool {
        self.packet_type == PacketType::Video
    }

    /// Check if the packet is audio
    pub fn is_audio(&self) -> bool {
        self.packet_type == PacketType::Audio
    }

    /// Check membership in the declared layer set of one dimension
    ///
    /// An empty layer set matches nothing.
    pub fn belongs_to_layer(&self, layer: u32, dimension: LayerDimension) -> bool {
        match dimension {
            LayerDimension::Spatial => self.compatible_spatial_layers.contains(&layer),
            LayerDimension::Temporal => self.compatible_temporal_layers.contains(&layer),
        }
    }

    /// Check membership in the spatial layer set
    pub fn belongs_to_spatial_layer(&self, layer: u32) -> bool {
        self.belongs_to_layer(layer, LayerDimension::Spatial)
    }

    /// Check membership in the temporal layer set
    pub fn belongs_to_temporal_layer(&self, layer: u32) -> bool {
        self.belongs_to_layer(layer, LayerDimension::Temporal)
    }
}

impl Default for DataPacket {
    fn default() -> Self {
        Self {
            component: 0,
            data: [0u8; MAX_PACKET_SIZE],
            length: 0,
            packet_type: PacketType::Other,
            received_time_ms: 0,
            compatible_spatial_layers: Vec::new(),
            compatible_temporal_layers: Vec::new(),
            is_keyframe: false,
        }
    }
}

impl std::fmt::Debug for DataPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataPacket")
            .field("component", &self.component)
            .field("length", &self.length)
            .field("packet_type", &self.packet_type)
            .field("received_time_ms", &self.received_time_ms)
            .field("spatial_layers", &self.compatible_spatial_layers)
            .field("temporal_layers", &self.compatible_temporal_layers)
            .field("is_keyframe", &self.is_keyframe)
            .finish()
    }
}
