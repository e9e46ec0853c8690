use tokio::sync::broadcast;

/// Typed change notification published by the holdings owner so
/// independent consumers re-read the same persisted state.
#[derive(Debug, Clone, PartialEq)]
pub enum HoldingsEvent {
    Refreshed { portfolio: String, symbols: usize },
    Added { portfolio: String, symbol: String },
    Removed { portfolio: String, symbol: String },
    Updated { portfolio: String, symbol: String },
    Cleared { portfolio: String },
}

pub struct HoldingsBus {
    tx: broadcast::Sender<HoldingsEvent>,
}

impl HoldingsBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HoldingsEvent> {
        self.tx.subscribe()
    }

    /// Fire-and-forget; a publish with no subscribers is not an error.
    pub fn publish(&self, event: HoldingsEvent) {
        let _ = self.tx.send(event);
    }
}
