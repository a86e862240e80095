// MIT License - Copyright (c) 2026 Peter Wright
// Client notifications

use std::collections::BTreeMap;

/// Status notifications pushed by the client.
///
/// Users subscribe via `client.subscribe()` to receive a
/// `tokio::sync::broadcast::Receiver<SatelEvent>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatelEvent {
    /// TCP connection to the ETHM module established
    Connected,
    /// TCP connection lost
    Disconnected,
    /// One of the partition-level state sets changed
    AlarmStatus,
    /// Violated state of the monitored inputs (input number → violated)
    ZonesUpdated(BTreeMap<u32, bool>),
    /// Active state of the monitored outputs (output number → active)
    OutputsUpdated(BTreeMap<u32, bool>),
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<SatelEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<SatelEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
