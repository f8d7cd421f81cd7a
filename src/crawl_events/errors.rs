//! Error types for event bus operations

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventBusError {
    /// No active subscribers when publishing
    #[error("No active subscribers")]
    NoSubscribers,

    /// Receiver couldn't keep up and missed events
    #[error("Receiver lagged behind, missed {0} events")]
    ReceiverLagged(u64),

    /// Event bus or receiver was closed
    #[error("Event bus shutdown")]
    Shutdown,

    /// Channel is at capacity and backpressure mode is Error
    #[error("Event channel is full (capacity exceeded)")]
    ChannelFull,
}
