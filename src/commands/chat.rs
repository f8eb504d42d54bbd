use crate::api::HistoryEntry;
use crate::db::models::{Message, MessageState, NewMessage};
use crate::error::WidgetError;
use crate::store::messages::{MessagePatch, ReplyAccumulator};
use crate::widget::ChatWidget;
use futures::StreamExt;

/// Shown as the user message when only attachments were sent.
pub const FILES_ONLY_CONTENT: &str = "📎 File(s) shared";
/// Question asked about a document when the user typed nothing.
pub const DEFAULT_DOCUMENT_QUESTION: &str = "Please summarize this document.";
pub const EMPTY_REPLY: &str = "No response received.";

/// Where a submission goes.
enum Route<'a> {
    Chat { message: &'a str },
    Document { file_uri: String, question: &'a str },
}

pub fn get_messages(widget: &ChatWidget) -> Vec<Message> {
    widget.store().messages()
}

pub fn clear_history(widget: &ChatWidget) {
    widget.store().clear();
    widget.persist();
    tracing::info!("chat history cleared");
}

/// Submit `text` together with the current upload tray and fill in the bot
/// reply. Returns the id of the bot message.
///
/// Backend failures do not surface as `Err`: they end up as the reply text.
pub async fn send_message(widget: &ChatWidget, text: &str) -> Result<String, WidgetError> {
    let text = text.trim();
    let files = widget
        .uploads()
        .take_sendable()
        .map_err(WidgetError::NotSendable)?;
    if text.is_empty() && files.is_empty() {
        return Err(WidgetError::NotSendable("message is empty".into()));
    }

    let store = widget.store();
    // Taken before the new messages exist, so neither is part of it.
    let history: Vec<HistoryEntry> = store
        .recent_history(widget.config().max_history_messages)
        .iter()
        .map(HistoryEntry::from)
        .collect();

    let content = if text.is_empty() { FILES_ONLY_CONTENT } else { text };
    store.append(NewMessage::user(content, files.clone()));
    let reply_id = store.append(NewMessage::bot_placeholder());

    let route = match files.iter().find_map(|f| f.file_uri()) {
        Some(file_uri) => Route::Document {
            file_uri: file_uri.to_string(),
            question: if text.is_empty() {
                DEFAULT_DOCUMENT_QUESTION
            } else {
                text
            },
        },
        None => Route::Chat { message: content },
    };

    tracing::debug!(
        reply_id,
        history = history.len(),
        attachments = files.len(),
        streaming = widget.config().streaming,
        "sending message"
    );
    if widget.config().streaming {
        stream_reply(widget, &reply_id, route, &history).await;
    } else {
        fetch_reply(widget, &reply_id, route, &history).await;
    }

    widget.persist();
    Ok(reply_id)
}

async fn stream_reply(widget: &ChatWidget, reply_id: &str, route: Route<'_>, history: &[HistoryEntry]) {
    let api = widget.api();
    let mut stream = match &route {
        Route::Chat { message } => api.stream_chat(message, history),
        Route::Document { file_uri, question } => api.stream_document_qa(file_uri, question, history),
    };

    let mut reply = ReplyAccumulator::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => {
                if let Some(patch) = reply.on_fragment(&fragment) {
                    widget.store().patch(reply_id, patch);
                }
            }
            Err(e) => {
                let err = WidgetError::from(e);
                tracing::warn!(reply_id, "streaming reply failed: {}", err);
                widget.store().patch(reply_id, reply.fail(err.reply_text()));
                return;
            }
        }
    }

    tracing::debug!(reply_id, chars = reply.text().chars().count(), "stream finished");
    widget.store().patch(reply_id, reply.finish());
}

async fn fetch_reply(widget: &ChatWidget, reply_id: &str, route: Route<'_>, history: &[HistoryEntry]) {
    let api = widget.api();
    let result = match &route {
        Route::Chat { message } => api.chat(message, history).await,
        Route::Document { file_uri, question } => api.document_qa(file_uri, question, history).await,
    };

    let content = match result {
        Ok(text) if text.is_empty() => EMPTY_REPLY.to_string(),
        Ok(text) => text,
        Err(e) => {
            let err = WidgetError::from(e);
            tracing::warn!(reply_id, "reply failed: {}", err);
            err.reply_text()
        }
    };
    widget
        .store()
        .patch(reply_id, MessagePatch::content(content).with_state(MessageState::Complete));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{WidgetConfig, PDF_MIME, TEXT_MIME};
    use crate::db::models::Sender;
    use crate::test_support::{Canned, MockServer};
    use crate::upload::file::FileCandidate;

    fn widget_for(base_url: &str, streaming: bool) -> ChatWidget {
        let config = WidgetConfig {
            api_base_url: base_url.to_string(),
            api_key: Some("test-key".into()),
            streaming,
            ..Default::default()
        };
        ChatWidget::new(config, None)
    }

    #[tokio::test]
    async fn test_streamed_reply_fills_placeholder() {
        let server = MockServer::start().await;
        let widget = widget_for(&server.base_url, true);
        let handle = tokio::spawn(server.respond_once(
            200,
            "text/event-stream",
            "data: {\"content\":\"Hello\"}\n\ndata: {\"content\":\" world\"}\n\n",
        ));

        let reply_id = send_message(&widget, "  hi there  ").await.unwrap();
        let request = handle.await.unwrap();
        assert!(request.starts_with("POST /chat/stream HTTP/1.1"));
        assert!(request.contains("\"message\":\"hi there\""));

        let messages = get_messages(&widget);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[0].content, "hi there");
        assert_eq!(messages[1].id, reply_id);
        assert_eq!(messages[1].content, "Hello world");
        assert_eq!(messages[1].state, MessageState::Complete);
    }

    #[tokio::test]
    async fn test_json_fallback_is_replayed_as_stream() {
        let server = MockServer::start().await;
        let widget = widget_for(&server.base_url, true);
        let mut rx = widget.subscribe();
        let handle = tokio::spawn(server.respond_once(
            200,
            "application/json",
            r#"{"success":true,"response":"A reply longer than ten characters"}"#,
        ));

        let reply_id = send_message(&widget, "hi").await.unwrap();
        handle.await.unwrap();
        let reply = widget.store().message(&reply_id).unwrap();
        assert_eq!(reply.content, "A reply longer than ten characters");

        let mut updates = 0;
        while let Ok(event) = rx.try_recv() {
            if event == (crate::events::WidgetEvent::MessageUpdated { id: reply_id.clone() }) {
                updates += 1;
            }
        }
        // Four 10-character fragments plus the completion patch.
        assert_eq!(updates, 5);
    }

    #[tokio::test]
    async fn test_stream_failure_becomes_reply_text() {
        let server = MockServer::start().await;
        let widget = widget_for(&server.base_url, true);
        let handle = tokio::spawn(server.respond_once(500, "text/plain", "boom"));

        let reply_id = send_message(&widget, "hi").await.unwrap();
        handle.await.unwrap();
        let reply = widget.store().message(&reply_id).unwrap();
        assert!(reply.content.contains("Failed to generate streaming response"));
        assert!(reply.is_settled());
    }

    #[tokio::test]
    async fn test_cut_off_stream_replaces_partial_reply() {
        let server = MockServer::start().await;
        let widget = widget_for(&server.base_url, true);
        let handle = tokio::spawn(server.respond_sequence(vec![Canned::truncated(
            200,
            "text/event-stream",
            "data: {\"content\":\"Partial answer\"}\n\n",
        )]));

        let reply_id = send_message(&widget, "hi").await.unwrap();
        handle.await.unwrap();
        let reply = widget.store().message(&reply_id).unwrap();
        assert!(reply.content.contains("Failed to generate streaming response"));
        assert!(!reply.content.contains("Partial answer"));
        assert_eq!(reply.state, MessageState::Complete);
    }

    #[tokio::test]
    async fn test_empty_stream_reports_no_response() {
        let server = MockServer::start().await;
        let widget = widget_for(&server.base_url, true);
        let handle = tokio::spawn(server.respond_once(200, "text/event-stream", "data: {}\n\n"));

        let reply_id = send_message(&widget, "hi").await.unwrap();
        handle.await.unwrap();
        assert_eq!(widget.store().message(&reply_id).unwrap().content, EMPTY_REPLY);
    }

    #[tokio::test]
    async fn test_history_excludes_new_messages() {
        let server = MockServer::start().await;
        let widget = widget_for(&server.base_url, false);
        let handle = tokio::spawn(server.respond_sequence(vec![
            Canned::new(200, "application/json", r#"{"success":true,"response":"one"}"#),
            Canned::new(200, "application/json", r#"{"success":true,"response":"two"}"#),
        ]));

        send_message(&widget, "first").await.unwrap();
        send_message(&widget, "second").await.unwrap();
        let requests = handle.await.unwrap();

        assert!(requests[0].starts_with("POST /chat HTTP/1.1"));
        assert!(requests[0].contains("\"history\":[]"));
        assert!(requests[1].contains(
            r#""history":[{"role":"user","content":"first"},{"role":"assistant","content":"one"}]"#
        ));
        assert_eq!(get_messages(&widget)[3].content, "two");
    }

    #[tokio::test]
    async fn test_uploaded_pdf_routes_to_document_qa() {
        let server = MockServer::start().await;
        let widget = widget_for(&server.base_url, true);
        let handle = tokio::spawn(server.respond_sequence(vec![
            Canned::new(
                200,
                "application/json",
                r#"{"fileUri":"files/abc","mimeType":"application/pdf"}"#,
            ),
            Canned::new(200, "text/event-stream", "data: {\"content\":\"A summary\"}\n\n"),
        ]));

        widget
            .uploads()
            .add_files(vec![FileCandidate::new("paper.pdf", PDF_MIME, b"%PDF-1.4".to_vec())])
            .await;
        let reply_id = send_message(&widget, "").await.unwrap();
        let requests = handle.await.unwrap();

        assert!(requests[0].starts_with("POST /documents/upload HTTP/1.1"));
        assert!(requests[1].starts_with("POST /documents/qa HTTP/1.1"));
        assert!(requests[1].contains("\"fileUri\":\"files/abc\""));
        assert!(requests[1].contains(DEFAULT_DOCUMENT_QUESTION));

        let messages = get_messages(&widget);
        assert_eq!(messages[0].content, FILES_ONLY_CONTENT);
        assert_eq!(messages[0].files.len(), 1);
        assert_eq!(widget.store().message(&reply_id).unwrap().content, "A summary");
        assert!(widget.uploads().files().is_empty());
    }

    #[tokio::test]
    async fn test_refuses_blank_or_blocked_messages() {
        let widget = widget_for("http://127.0.0.1:9", true);
        let err = send_message(&widget, "   ").await.unwrap_err();
        assert!(matches!(err, WidgetError::NotSendable(_)));

        widget
            .uploads()
            .add_files(vec![FileCandidate::new("notes.txt", TEXT_MIME, b"hi".to_vec())])
            .await;
        let err = send_message(&widget, "what is this?").await.unwrap_err();
        assert!(err.to_string().contains("notes.txt"));
        assert!(get_messages(&widget).is_empty());
        // The tray is left for the user to fix.
        assert_eq!(widget.uploads().files().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_history() {
        let server = MockServer::start().await;
        let widget = widget_for(&server.base_url, false);
        let handle = tokio::spawn(server.respond_once(
            200,
            "application/json",
            r#"{"success":true,"response":"ok"}"#,
        ));
        send_message(&widget, "hi").await.unwrap();
        handle.await.unwrap();

        clear_history(&widget);
        assert!(get_messages(&widget).is_empty());
    }
}
