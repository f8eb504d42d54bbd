use crate::db::models::{HealthStatus, Theme, Vote};
use serde::Serialize;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// Change notifications for whatever is rendering the widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WidgetEvent {
    MessageAppended { id: String },
    MessageUpdated { id: String },
    MessagesCleared,
    FeedbackChanged { message_id: String, vote: Option<Vote> },
    ChatRated { rating: u8 },
    FilesChanged,
    UploadBatchStarted { files: usize },
    UploadBatchSettled,
    UploadRejected { errors: Vec<String> },
    HealthChanged { status: HealthStatus, checked_at: Option<i64> },
    WindowChanged { open: bool, minimized: bool, full_width: bool },
    FeedbackModalChanged { open: bool },
    ThemeChanged { theme: Theme },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WidgetEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, event: WidgetEvent) {
        // No subscribers is fine; nothing is rendering.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WidgetEvent> {
        self.tx.subscribe()
    }
}
