//! Concrete media sinks

pub mod channel;

pub use channel::{ChannelSink, ChannelSinkConfig, MediaEvent, CHANNEL_FULL, SINK_CLOSED};
