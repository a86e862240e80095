// MIT License - Copyright (c) 2026 Peter Wright
// In-process signal bus between the client callbacks and the entities

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::broadcast;

/// Signals fanned out to every entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Partition-level state changed; alarm panels recompute their state.
    PanelMessage,
    /// Input number → violated.
    ZonesUpdated(Arc<BTreeMap<u32, bool>>),
    /// Output number → active.
    OutputsUpdated(Arc<BTreeMap<u32, bool>>),
}

/// Cloneable handle to the signal bus.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: broadcast::Sender<Signal>,
}

impl Dispatcher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Deliver a signal to all connected receivers. Returns the number of receivers.
    pub fn send(&self, signal: Signal) -> usize {
        self.tx.send(signal).unwrap_or(0)
    }

    pub fn connect(&self) -> broadcast::Receiver<Signal> {
        self.tx.subscribe()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(256)
    }
}
