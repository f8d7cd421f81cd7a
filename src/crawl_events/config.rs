//! Event bus configuration

use crate::utils::DEFAULT_EVENT_BUS_CAPACITY;

/// Strategy for handling channel saturation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackpressureMode {
    /// Overwrite the oldest buffered event; slow receivers see `Lagged`
    #[default]
    DropOldest,
    /// Refuse the event with `ChannelFull`
    Error,
}

#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Events buffered per receiver
    pub capacity: usize,
    pub backpressure_mode: BackpressureMode,
    pub enable_metrics: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_EVENT_BUS_CAPACITY,
            backpressure_mode: BackpressureMode::default(),
            enable_metrics: true,
        }
    }
}
