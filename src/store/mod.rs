pub mod feedback;
pub mod messages;
pub mod persist;
pub mod ui;

use crate::db::models::{ChatFeedback, Message, MessageFeedback, NewMessage, Theme, Vote};
use crate::error::WidgetError;
use crate::events::{EventBus, WidgetEvent};
use feedback::FeedbackStore;
use messages::{MessagePatch, MessageStore};
use persist::PersistedState;
use std::sync::{Mutex, MutexGuard, PoisonError};
use ui::UiState;

#[derive(Debug, Default)]
struct ChatState {
    messages: MessageStore,
    feedback: FeedbackStore,
    ui: UiState,
}

/// The widget's shared state. All mutation goes through these methods, each
/// of which emits the matching [`WidgetEvent`].
pub struct ChatStore {
    state: Mutex<ChatState>,
    events: EventBus,
}

impl ChatStore {
    pub fn new(events: EventBus) -> Self {
        Self {
            state: Mutex::new(ChatState::default()),
            events,
        }
    }

    pub fn restore(events: EventBus, persisted: PersistedState, theme: Theme) -> Self {
        let state = ChatState {
            messages: MessageStore::from_messages(persisted.messages),
            feedback: FeedbackStore::from_parts(persisted.feedback, persisted.chat_feedback),
            ui: UiState::with_theme(theme),
        };
        Self {
            state: Mutex::new(state),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // ── Messages ──

    pub fn append(&self, new: NewMessage) -> String {
        let id = self.lock().messages.append(new);
        self.events.emit(WidgetEvent::MessageAppended { id: id.clone() });
        id
    }

    pub fn patch(&self, id: &str, patch: MessagePatch) {
        let applied = self.lock().messages.patch(id, patch);
        if applied {
            self.events
                .emit(WidgetEvent::MessageUpdated { id: id.to_string() });
        }
    }

    /// Drop the history along with the votes that referred to it.
    pub fn clear(&self) {
        {
            let mut state = self.lock();
            state.messages.clear();
            state.feedback.clear_votes();
        }
        self.events.emit(WidgetEvent::MessagesCleared);
    }

    pub fn message(&self, id: &str) -> Option<Message> {
        self.lock().messages.get(id).cloned()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.all().to_vec()
    }

    /// Up to `limit` settled messages, oldest first.
    pub fn recent_history(&self, limit: usize) -> Vec<Message> {
        self.lock()
            .messages
            .recent_settled(limit)
            .into_iter()
            .cloned()
            .collect()
    }

    // ── Feedback ──

    /// Toggle a vote and mirror the result onto the message itself.
    pub fn toggle_vote(&self, message_id: &str, vote: Vote) -> Option<Vote> {
        let next = {
            let mut state = self.lock();
            let next = state.feedback.toggle_vote(message_id, vote);
            state.messages.patch(
                message_id,
                MessagePatch {
                    feedback: Some(next),
                    ..Default::default()
                },
            );
            next
        };
        self.events.emit(WidgetEvent::FeedbackChanged {
            message_id: message_id.to_string(),
            vote: next,
        });
        next
    }

    pub fn vote_for(&self, message_id: &str) -> Option<Vote> {
        self.lock().feedback.vote_for(message_id)
    }

    pub fn votes(&self) -> Vec<MessageFeedback> {
        self.lock().feedback.votes().to_vec()
    }

    pub fn submit_rating(&self, rating: u8, comment: String) -> Result<ChatFeedback, WidgetError> {
        let feedback = self.lock().feedback.submit_rating(rating, comment)?.clone();
        self.events.emit(WidgetEvent::ChatRated { rating });
        Ok(feedback)
    }

    pub fn chat_feedback(&self) -> Option<ChatFeedback> {
        self.lock().feedback.chat_feedback().cloned()
    }

    // ── UI ──

    pub fn ui(&self) -> UiState {
        self.lock().ui
    }

    /// Apply `f` to the window flags and announce the result.
    pub fn update_window(&self, f: impl FnOnce(&mut UiState)) -> UiState {
        let ui = {
            let mut state = self.lock();
            f(&mut state.ui);
            state.ui
        };
        self.events.emit(WidgetEvent::WindowChanged {
            open: ui.is_open,
            minimized: ui.is_minimized,
            full_width: ui.is_full_width,
        });
        ui
    }

    pub fn set_feedback_modal(&self, open: bool) {
        self.lock().ui.is_feedback_modal_open = open;
        self.events.emit(WidgetEvent::FeedbackModalChanged { open });
    }

    pub fn set_theme(&self, theme: Theme) {
        self.lock().ui.theme = theme;
        self.events.emit(WidgetEvent::ThemeChanged { theme });
    }

    // ── Persistence ──

    pub fn snapshot(&self) -> PersistedState {
        let state = self.lock();
        PersistedState {
            messages: state.messages.all().to_vec(),
            feedback: state.feedback.votes().to_vec(),
            chat_feedback: state.feedback.chat_feedback().cloned(),
        }
    }
}
