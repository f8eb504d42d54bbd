use crate::db::models::{now_millis, ChatFeedback, MessageFeedback, Vote};
use crate::error::WidgetError;

/// Per-message votes plus the single end-of-session rating.
#[derive(Debug, Default, Clone)]
pub struct FeedbackStore {
    votes: Vec<MessageFeedback>,
    chat: Option<ChatFeedback>,
}

impl FeedbackStore {
    pub fn from_parts(votes: Vec<MessageFeedback>, chat: Option<ChatFeedback>) -> Self {
        Self { votes, chat }
    }

    /// Set or clear the vote for a message; at most one entry per message.
    pub fn set_vote(&mut self, message_id: &str, vote: Option<Vote>) {
        self.votes.retain(|f| f.message_id != message_id);
        if let Some(vote) = vote {
            self.votes.push(MessageFeedback {
                message_id: message_id.to_string(),
                vote,
            });
        }
    }

    /// Casting the vote already in place removes it. Returns the resulting vote.
    pub fn toggle_vote(&mut self, message_id: &str, vote: Vote) -> Option<Vote> {
        let next = match self.vote_for(message_id) {
            Some(current) if current == vote => None,
            _ => Some(vote),
        };
        self.set_vote(message_id, next);
        next
    }

    pub fn vote_for(&self, message_id: &str) -> Option<Vote> {
        self.votes
            .iter()
            .find(|f| f.message_id == message_id)
            .map(|f| f.vote)
    }

    pub fn votes(&self) -> &[MessageFeedback] {
        &self.votes
    }

    pub fn clear_votes(&mut self) {
        self.votes.clear();
    }

    /// Record the session rating, replacing any earlier one.
    pub fn submit_rating(&mut self, rating: u8, comment: impl Into<String>) -> Result<&ChatFeedback, WidgetError> {
        if !(1..=5).contains(&rating) {
            return Err(WidgetError::Validation(
                "Please select a rating before submitting.".to_string(),
            ));
        }
        Ok(self.chat.insert(ChatFeedback {
            rating,
            comment: comment.into(),
            submitted_at: now_millis(),
        }))
    }

    pub fn chat_feedback(&self) -> Option<&ChatFeedback> {
        self.chat.as_ref()
    }
}
