use crate::api::ApiClient;
use crate::config::WidgetConfig;
use crate::db::models::{MessageState, Theme};
use crate::db::Database;
use crate::events::{EventBus, WidgetEvent};
use crate::health::HealthMonitor;
use crate::store::persist::{PersistedState, STATE_KEY, STATE_VERSION};
use crate::store::ui::UiState;
use crate::store::ChatStore;
use crate::upload::UploadCoordinator;
use std::sync::Arc;
use tokio::sync::broadcast;

/// One embedded chat widget: its state, backend client, upload tray and
/// health monitor.
pub struct ChatWidget {
    config: WidgetConfig,
    api: Arc<ApiClient>,
    store: ChatStore,
    uploads: UploadCoordinator,
    health: HealthMonitor,
    db: Option<Database>,
    events: EventBus,
}

impl ChatWidget {
    /// Build a widget, restoring persisted history from `db` when given.
    pub fn new(config: WidgetConfig, db: Option<Database>) -> Self {
        let events = EventBus::new();
        let api = Arc::new(ApiClient::from_config(&config));

        let persisted = db.as_ref().map(load_persisted).unwrap_or_default();
        let store = ChatStore::restore(events.clone(), persisted, config.options.theme);
        let uploads = UploadCoordinator::new(api.clone(), config.uploads.clone(), events.clone());
        let health = HealthMonitor::new(api.clone(), config.health.clone(), events.clone());

        Self {
            config,
            api,
            store,
            uploads,
            health,
            db,
            events,
        }
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    pub fn uploads(&self) -> &UploadCoordinator {
        &self.uploads
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WidgetEvent> {
        self.events.subscribe()
    }

    // ── Window ──

    /// Open or close the chat window. Health polling follows the window, so
    /// opening must happen inside a tokio runtime.
    pub fn toggle_chat(&self) -> UiState {
        let ui = self.store.update_window(UiState::toggle_chat);
        if ui.is_open {
            self.health.start();
        } else {
            self.health.stop();
        }
        ui
    }

    pub fn open(&self) -> UiState {
        if self.store.ui().is_open {
            return self.store.ui();
        }
        self.toggle_chat()
    }

    pub fn close(&self) -> UiState {
        if !self.store.ui().is_open {
            return self.store.ui();
        }
        self.toggle_chat()
    }

    pub fn minimize_chat(&self) -> UiState {
        self.store.update_window(UiState::minimize)
    }

    pub fn toggle_full_width(&self) -> UiState {
        self.store.update_window(UiState::toggle_full_width)
    }

    pub fn open_feedback_modal(&self) {
        self.store.set_feedback_modal(true);
    }

    pub fn close_feedback_modal(&self) {
        self.store.set_feedback_modal(false);
    }

    pub fn set_theme(&self, theme: Theme) {
        self.store.set_theme(theme);
    }

    // ── Persistence ──

    /// Write the persisted slice of the store. Failures are logged, never fatal.
    pub fn persist(&self) {
        let Some(db) = &self.db else {
            return;
        };
        let blob = match self.store.snapshot().to_blob() {
            Ok(blob) => blob,
            Err(e) => {
                tracing::error!("failed to serialize widget state: {}", e);
                return;
            }
        };
        if let Err(e) = db.save_state(STATE_KEY, STATE_VERSION, &blob) {
            tracing::error!("failed to persist widget state: {}", e);
        }
    }
}

fn load_persisted(db: &Database) -> PersistedState {
    let (version, blob) = match db.load_state(STATE_KEY) {
        Ok(Some(stored)) => stored,
        Ok(None) => return PersistedState::default(),
        Err(e) => {
            tracing::error!("failed to read widget state: {}", e);
            return PersistedState::default();
        }
    };
    if version != STATE_VERSION {
        tracing::warn!(version, "persisted state has an unexpected version; loading anyway");
    }

    let mut state = match PersistedState::from_blob(&blob) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!("discarding unreadable persisted state: {}", e);
            return PersistedState::default();
        }
    };

    // Replies cut off by a previous shutdown will never finish.
    for msg in state.messages.iter_mut().filter(|m| !m.is_settled()) {
        msg.state = MessageState::Complete;
    }
    tracing::info!(messages = state.messages.len(), "restored chat history");
    state
}
