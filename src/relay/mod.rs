//! Forwarding stages built on the media graph
//!
//! - `FanoutRelay`: one publisher to many subscribers, with feedback routed
//!   back to the publisher
//! - `LayerFilter`: a sink-and-source stage that forwards only the selected
//!   spatial/temporal layers

pub mod config;
pub mod fanout;
pub mod layer_filter;

use std::sync::Arc;

pub use config::{LayerFilterConfig, RelayConfig};
pub use fanout::{FanoutRelay, FEEDBACK_DISABLED, NO_PUBLISHER, RELAY_CLOSED};
pub use layer_filter::{LayerFilter, FILTERED, NO_DOWNSTREAM, NO_UPSTREAM};

/// Check if a trait object points at `object`
pub(crate) fn is_same_object<T: ?Sized, U>(arc: &Arc<T>, object: &U) -> bool {
    std::ptr::eq(
        Arc::as_ptr(arc) as *const (),
        object as *const U as *const (),
    )
}
