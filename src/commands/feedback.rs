use crate::db::models::{ChatFeedback, Vote};
use crate::error::WidgetError;
use crate::widget::ChatWidget;

/// Vote on a message. Repeating the current vote withdraws it.
pub fn toggle_vote(widget: &ChatWidget, message_id: &str, vote: Vote) -> Result<Option<Vote>, WidgetError> {
    if widget.store().message(message_id).is_none() {
        return Err(WidgetError::Validation(format!("Unknown message: {}", message_id)));
    }
    let next = widget.store().toggle_vote(message_id, vote);
    widget.persist();
    Ok(next)
}

/// Record the session rating and close the feedback modal.
pub fn submit_chat_feedback(
    widget: &ChatWidget,
    rating: u8,
    comment: &str,
) -> Result<ChatFeedback, WidgetError> {
    let feedback = widget
        .store()
        .submit_rating(rating, comment.trim().to_string())?;
    widget.close_feedback_modal();
    widget.persist();
    tracing::info!(rating, "chat feedback submitted");
    Ok(feedback)
}
