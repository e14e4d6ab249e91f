use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Structural mutations published after they have been persisted.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    Created { id: Uuid },
    Moved { id: Uuid, new_parent: Uuid },
    Deleted { id: Uuid },
    ItemInserted { item: String, folder: Uuid },
    ItemDeleted { item: String },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn send(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
