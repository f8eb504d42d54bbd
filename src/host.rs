//! Line-oriented terminal host for the widget.

use crate::commands::{chat, feedback, uploads};
use crate::db::models::{HealthStatus, MessageState, Sender, Vote};
use crate::error::WidgetError;
use crate::events::WidgetEvent;
use crate::widget::ChatWidget;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

const HELP: &str = "\
commands:
  <text>                 send a message
  /attach <path>...      attach files to the next message
  /remove <id>           remove an attached file
  /up <n> | /down <n>    vote on the n-th bot reply
  /rate <1-5> [comment]  rate this chat
  /health                check the backend now
  /clear                 clear the history
  /quit                  exit";

pub async fn run(widget: Arc<ChatWidget>) -> Result<(), WidgetError> {
    widget.open();
    let printer = tokio::spawn(print_updates(widget.clone()));

    println!("{} is ready. Type /help for commands.", widget.config().options.bot_name);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        if let Err(e) = handle_line(&widget, line).await {
            eprintln!("error: {}", e);
        }
    }

    printer.abort();
    widget.close();
    widget.persist();
    Ok(())
}

async fn handle_line(widget: &ChatWidget, line: &str) -> Result<(), WidgetError> {
    let Some(command) = line.strip_prefix('/') else {
        chat::send_message(widget, line).await?;
        return Ok(());
    };
    let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
    let rest = rest.trim();

    match name {
        "help" => println!("{}", HELP),
        "attach" => {
            let paths: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
            let report = uploads::attach_paths(widget, &paths).await?;
            if let Some(rejected) = report.rejected {
                eprintln!("{}", rejected);
            }
            for file in uploads::list_files(widget) {
                let note = file.upload_error().unwrap_or("ready");
                println!("  [{}] {} ({})", file.id, file.name, note);
            }
        }
        "remove" => uploads::remove_file(widget, rest)?,
        "up" | "down" => {
            let vote = if name == "up" { Vote::Upvote } else { Vote::Downvote };
            let id = nth_bot_reply(widget, rest)?;
            match feedback::toggle_vote(widget, &id, vote)? {
                Some(vote) => println!("voted {:?}", vote),
                None => println!("vote removed"),
            }
        }
        "rate" => {
            let (rating, comment) = rest.split_once(' ').unwrap_or((rest, ""));
            let rating = rating.parse::<u8>().unwrap_or(0);
            widget.open_feedback_modal();
            match feedback::submit_chat_feedback(widget, rating, comment) {
                Ok(_) => println!("thanks for the feedback"),
                Err(e) => {
                    widget.close_feedback_modal();
                    return Err(e);
                }
            }
        }
        "health" => {
            let status = widget.health().refresh().await;
            println!("backend is {}", status);
        }
        "clear" => chat::clear_history(widget),
        other => {
            return Err(WidgetError::Validation(format!(
                "Unknown command /{}. Type /help for commands.",
                other
            )))
        }
    }
    Ok(())
}

fn nth_bot_reply(widget: &ChatWidget, n: &str) -> Result<String, WidgetError> {
    let n: usize = n
        .parse()
        .map_err(|_| WidgetError::Validation(format!("Not a reply number: {}", n)))?;
    widget
        .store()
        .messages()
        .into_iter()
        .filter(|m| m.sender == Sender::Bot)
        .nth(n.saturating_sub(1))
        .map(|m| m.id)
        .ok_or_else(|| WidgetError::Validation(format!("No bot reply #{}", n)))
}

/// Echo bot replies as they stream in, plus health warnings.
async fn print_updates(widget: Arc<ChatWidget>) {
    let mut rx = widget.subscribe();
    let mut printed: HashMap<String, String> = HashMap::new();
    let mut last_health = HealthStatus::Unknown;
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "terminal printer lagged");
                continue;
            }
            Err(RecvError::Closed) => return,
        };
        match event {
            WidgetEvent::MessageUpdated { id } => {
                let Some(msg) = widget.store().message(&id) else {
                    continue;
                };
                if msg.sender != Sender::Bot {
                    continue;
                }
                let shown = printed.entry(id.clone()).or_default();
                // Content is replaced wholesale; print only what is new.
                match msg.content.strip_prefix(shown.as_str()) {
                    Some(new) => print!("{}", new),
                    None => print!("\n{}", msg.content),
                }
                *shown = msg.content.clone();
                if msg.state == MessageState::Complete {
                    println!();
                    printed.remove(&id);
                }
                let _ = std::io::stdout().flush();
            }
            WidgetEvent::HealthChanged { status, .. } if status != HealthStatus::Checking => {
                if status == HealthStatus::Unhealthy && last_health != HealthStatus::Unhealthy {
                    eprintln!("warning: the chat service is unavailable right now");
                }
                last_health = status;
            }
            _ => {}
        }
    }
}
