use crate::db::models::{now_millis, Message, MessageState, NewMessage, Sender, UploadedFile, Vote};

/// Fields to merge into an existing message. `None` leaves a field alone.
///
/// `content` replaces the whole text; streaming callers send the accumulated
/// reply each time, so re-applying a patch is harmless.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub state: Option<MessageState>,
    pub files: Option<Vec<UploadedFile>>,
    pub feedback: Option<Option<Vote>>,
}

impl MessagePatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn with_state(mut self, state: MessageState) -> Self {
        self.state = Some(state);
        self
    }
}

/// Ordered message history.
#[derive(Debug, Default, Clone)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Insert at the end with a fresh id and the current time.
    pub fn append(&mut self, new: NewMessage) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let state = match new.sender {
            Sender::User => MessageState::Complete,
            Sender::Bot => new.state,
        };
        self.messages.push(Message {
            id: id.clone(),
            content: new.content,
            sender: new.sender,
            timestamp: now_millis(),
            files: new.files,
            state,
            feedback: None,
        });
        id
    }

    /// Merge `patch` into message `id`. Unknown ids are ignored.
    pub fn patch(&mut self, id: &str, patch: MessagePatch) -> bool {
        let Some(msg) = self.messages.iter_mut().find(|m| m.id == id) else {
            tracing::debug!(id, "patch for unknown message ignored");
            return false;
        };
        if let Some(content) = patch.content {
            msg.content = content;
        }
        if let Some(state) = patch.state {
            if msg.sender == Sender::Bot {
                msg.state = state;
            }
        }
        if let Some(files) = patch.files {
            msg.files = files;
        }
        if let Some(feedback) = patch.feedback {
            msg.feedback = feedback;
        }
        true
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The last `limit` settled messages, oldest first. Replies still in
    /// flight are left out.
    pub fn recent_settled(&self, limit: usize) -> Vec<&Message> {
        let settled: Vec<&Message> = self.messages.iter().filter(|m| m.is_settled()).collect();
        let skip = settled.len().saturating_sub(limit);
        settled.into_iter().skip(skip).collect()
    }
}

/// Builds the patches for one streamed reply.
#[derive(Debug, Default)]
pub struct ReplyAccumulator {
    text: String,
}

impl ReplyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch for a newly received fragment; empty fragments change nothing.
    pub fn on_fragment(&mut self, fragment: &str) -> Option<MessagePatch> {
        if fragment.is_empty() {
            return None;
        }
        self.text.push_str(fragment);
        Some(MessagePatch::content(self.text.clone()).with_state(MessageState::Streaming))
    }

    /// Final patch once the stream ended cleanly.
    pub fn finish(&self) -> MessagePatch {
        MessagePatch {
            content: self.text.is_empty().then(|| "No response received.".to_string()),
            state: Some(MessageState::Complete),
            ..Default::default()
        }
    }

    /// Final patch replacing the reply with an error text.
    pub fn fail(&self, error_text: impl Into<String>) -> MessagePatch {
        MessagePatch::content(error_text).with_state(MessageState::Complete)
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
