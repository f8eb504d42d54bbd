use crate::db::models::Theme;
use serde::Serialize;

/// Window flags. Not persisted; every session starts closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UiState {
    pub is_open: bool,
    pub is_minimized: bool,
    pub is_full_width: bool,
    pub is_feedback_modal_open: bool,
    pub theme: Theme,
}

impl UiState {
    pub fn with_theme(theme: Theme) -> Self {
        Self {
            theme,
            ..Default::default()
        }
    }

    pub fn toggle_chat(&mut self) {
        self.is_open = !self.is_open;
        self.is_minimized = false;
    }

    pub fn minimize(&mut self) {
        self.is_minimized = true;
    }

    pub fn toggle_full_width(&mut self) {
        self.is_full_width = !self.is_full_width;
    }
}
