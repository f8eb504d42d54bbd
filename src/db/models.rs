use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// Delivery state of a message. User messages are always `Complete`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    /// Placeholder waiting for the first fragment.
    Loading,
    /// At least one fragment arrived and more are expected.
    Streaming,
    #[default]
    Complete,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<UploadedFile>,
    #[serde(default)]
    pub state: MessageState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Vote>,
}

impl Message {
    pub fn is_loading(&self) -> bool {
        self.state == MessageState::Loading
    }

    pub fn is_streaming(&self) -> bool {
        self.state == MessageState::Streaming
    }

    pub fn is_settled(&self) -> bool {
        self.state == MessageState::Complete
    }
}

/// Fields supplied when appending; id and timestamp are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub content: String,
    pub sender: Sender,
    pub files: Vec<UploadedFile>,
    pub state: MessageState,
}

impl NewMessage {
    pub fn user(content: impl Into<String>, files: Vec<UploadedFile>) -> Self {
        Self {
            content: content.into(),
            sender: Sender::User,
            files,
            state: MessageState::Complete,
        }
    }

    pub fn bot_placeholder() -> Self {
        Self {
            content: String::new(),
            sender: Sender::Bot,
            files: Vec::new(),
            state: MessageState::Loading,
        }
    }
}

/// Reference to a document stored by the backend.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    pub file_uri: String,
    pub mime_type: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    Uploading,
    /// Terminal success. `remote` is absent for types the backend cannot take;
    /// those carry a `notice` explaining why.
    Ready {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remote: Option<RemoteDocument>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notice: Option<String>,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UploadedFile {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub status: FileStatus,
}

impl UploadedFile {
    pub fn is_uploading(&self) -> bool {
        matches!(self.status, FileStatus::Pending | FileStatus::Uploading)
    }

    pub fn file_uri(&self) -> Option<&str> {
        match &self.status {
            FileStatus::Ready {
                remote: Some(remote),
                ..
            } => Some(&remote.file_uri),
            _ => None,
        }
    }

    /// The error string shown next to the file, if any.
    pub fn upload_error(&self) -> Option<&str> {
        match &self.status {
            FileStatus::Ready { notice, .. } => notice.as_deref(),
            FileStatus::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    /// A file can go out with a message once it settled without an error.
    pub fn is_sendable(&self) -> bool {
        !self.is_uploading() && self.upload_error().is_none()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Upvote,
    Downvote,
}

impl FromStr for Vote {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upvote" | "up" => Ok(Vote::Upvote),
            "downvote" | "down" => Ok(Vote::Downvote),
            other => Err(format!("Unknown vote: {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MessageFeedback {
    pub message_id: String,
    pub vote: Vote,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatFeedback {
    pub rating: u8,
    pub comment: String,
    pub submitted_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Checking,
    Healthy,
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Checking => "checking",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("Unknown theme: {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    #[default]
    BottomRight,
    BottomLeft,
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bottom-right" => Ok(Position::BottomRight),
            "bottom-left" => Ok(Position::BottomLeft),
            other => Err(format!("Unknown position: {}", other)),
        }
    }
}
