//! Relay configuration

/// Fan-out relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Maximum subscribers (0 = unlimited)
    pub max_subscribers: usize,

    /// Forward subscriber feedback to the publisher
    pub forward_feedback: bool,

    /// Ask the publisher for a keyframe when a subscriber joins
    pub keyframe_on_subscribe: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_subscribers: 0, // Unlimited
            forward_feedback: true,
            keyframe_on_subscribe: true,
        }
    }
}

impl RelayConfig {
    /// Set maximum subscribers
    pub fn max_subscribers(mut self, max: usize) -> Self {
        self.max_subscribers = max;
        self
    }

    /// Stop forwarding feedback to the publisher
    pub fn disable_feedback(mut self) -> Self {
        self.forward_feedback = false;
        self
    }

    /// Set whether a joining subscriber triggers a keyframe request
    pub fn keyframe_on_subscribe(mut self, enabled: bool) -> Self {
        self.keyframe_on_subscribe = enabled;
        self
    }
}

/// Layer filter configuration
#[derive(Debug, Clone)]
pub struct LayerFilterConfig {
    /// Spatial layer to forward
    pub spatial_layer: u32,

    /// Temporal layer to forward
    pub temporal_layer: u32,

    /// Forward every packet marked as keyframe regardless of layers
    pub pass_keyframes: bool,

    /// Ask upstream for a keyframe when the target layers change
    pub keyframe_on_switch: bool,
}

impl Default for LayerFilterConfig {
    fn default() -> Self {
        Self {
            spatial_layer: 0,
            temporal_layer: 0,
            pass_keyframes: false,
            keyframe_on_switch: true,
        }
    }
}

impl LayerFilterConfig {
    /// Set the target layers
    pub fn target(mut self, spatial_layer: u32, temporal_layer: u32) -> Self {
        self.spatial_layer = spatial_layer;
        self.temporal_layer = temporal_layer;
        self
    }

    /// Set whether keyframes bypass the layer check
    pub fn pass_keyframes(mut self, enabled: bool) -> Self {
        self.pass_keyframes = enabled;
        self
    }

    /// Set whether a layer switch triggers a keyframe request
    pub fn keyframe_on_switch(mut self, enabled: bool) -> Self {
        self.keyframe_on_switch = enabled;
        self
    }
}
