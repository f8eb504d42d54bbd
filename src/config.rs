use crate::db::models::{Position, Theme};
use crate::db::Database;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3001/api/v1";

/// Number of prior messages sent along as conversation history.
pub const MAX_HISTORY_MESSAGES: usize = 10;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const TEXT_MIME: &str = "text/plain";

#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_files: usize,
    pub max_file_size: u64,
    pub allowed_types: Vec<String>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_files: 3,
            max_file_size: 10 * 1024 * 1024,
            allowed_types: vec![PDF_MIME.into(), DOCX_MIME.into(), TEXT_MIME.into()],
        }
    }
}

impl UploadLimits {
    pub fn max_size_mb(&self) -> u64 {
        self.max_file_size / (1024 * 1024)
    }
}

#[derive(Debug, Clone)]
pub struct HealthSettings {
    /// Delay between probes while the backend is healthy.
    pub interval: Duration,
    /// Back-off before re-probing an unhealthy backend.
    pub retry_delay: Duration,
    pub probe_timeout: Duration,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            retry_delay: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Pacing used when a JSON reply is replayed as a fragment sequence.
#[derive(Debug, Clone)]
pub struct StreamingSettings {
    pub chunk_chars: usize,
    pub delay: Duration,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            chunk_chars: 10,
            delay: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WidgetOptions {
    pub bot_name: String,
    pub theme: Theme,
    pub position: Position,
    pub allow_upload: bool,
}

impl Default for WidgetOptions {
    fn default() -> Self {
        Self {
            bot_name: "AI Assistant".into(),
            theme: Theme::Light,
            position: Position::BottomRight,
            allow_upload: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WidgetConfig {
    pub api_base_url: String,
    pub api_key: Option<String>,
    /// Stream replies fragment by fragment instead of waiting for the whole answer.
    pub streaming: bool,
    pub max_history_messages: usize,
    pub uploads: UploadLimits,
    pub health: HealthSettings,
    pub pacing: StreamingSettings,
    pub options: WidgetOptions,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            api_key: None,
            streaming: true,
            max_history_messages: MAX_HISTORY_MESSAGES,
            uploads: UploadLimits::default(),
            health: HealthSettings::default(),
            pacing: StreamingSettings::default(),
            options: WidgetOptions::default(),
        }
    }
}

impl WidgetConfig {
    /// Defaults overridden by `CHAT_WIDGET_API_URL` / `CHAT_WIDGET_API_KEY`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = non_empty_var("CHAT_WIDGET_API_URL") {
            config.api_base_url = url;
        }
        config.api_key = non_empty_var("CHAT_WIDGET_API_KEY");
        config
    }

    /// Apply values stored in the settings table on top of the current config.
    pub fn apply_settings(&mut self, db: &Database) {
        if let Some(url) = db.get_setting("api_base_url").ok().flatten() {
            self.api_base_url = url;
        }
        if let Some(key) = db.get_setting("api_key").ok().flatten() {
            self.api_key = Some(key);
        }
        if let Some(name) = db.get_setting("bot_name").ok().flatten() {
            self.options.bot_name = name;
        }
        if let Some(theme) = db.get_setting("theme").ok().flatten() {
            match theme.parse() {
                Ok(theme) => self.options.theme = theme,
                Err(e) => tracing::warn!("ignoring stored theme: {}", e),
            }
        }
        if let Some(position) = db.get_setting("position").ok().flatten() {
            match position.parse() {
                Ok(position) => self.options.position = position,
                Err(e) => tracing::warn!("ignoring stored position: {}", e),
            }
        }
    }

    /// Environment first, then whatever the user saved through the settings commands.
    pub fn resolve(db: &Database) -> Self {
        let mut config = Self::from_env();
        config.apply_settings(db);
        config
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_widget_limits() {
        let config = WidgetConfig::default();
        assert_eq!(config.uploads.max_files, 3);
        assert_eq!(config.uploads.max_size_mb(), 10);
        assert_eq!(config.max_history_messages, 10);
        assert_eq!(config.health.retry_delay, Duration::from_secs(5));
        assert_eq!(config.pacing.chunk_chars, 10);
        assert!(config.streaming);
    }

    #[test]
    fn test_stored_settings_override_defaults() {
        let db = Database::in_memory().unwrap();
        db.set_setting("api_base_url", "https://chat.example.com/api").unwrap();
        db.set_setting("theme", "dark").unwrap();
        db.set_setting("position", "sideways").unwrap();

        let mut config = WidgetConfig::default();
        config.apply_settings(&db);
        assert_eq!(config.api_base_url, "https://chat.example.com/api");
        assert_eq!(config.options.theme, Theme::Dark);
        // Invalid stored value leaves the default alone.
        assert_eq!(config.options.position, Position::BottomRight);
    }
}
