pub mod api;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod health;
mod host;
pub mod store;
pub mod stream;
pub mod upload;
pub mod widget;

#[cfg(test)]
mod test_support;

use config::WidgetConfig;
use db::Database;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use widget::ChatWidget;

const DEFAULT_DATA_DIR: &str = ".chat-widget";

pub fn run() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chat_widget_lib=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let app_dir = std::env::var_os("CHAT_WIDGET_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let database = match Database::new(&app_dir) {
        Ok(db) => Some(db),
        Err(e) => {
            tracing::error!(dir = %app_dir.display(), "failed to open database, history will not be kept: {}", e);
            None
        }
    };
    let config = match &database {
        Some(db) => WidgetConfig::resolve(db),
        None => WidgetConfig::from_env(),
    };
    tracing::info!(api = %config.api_base_url, streaming = config.streaming, "starting chat widget");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to start tokio runtime");
    runtime.block_on(async {
        let widget = Arc::new(ChatWidget::new(config, database));
        if let Err(e) = host::run(widget).await {
            tracing::error!("chat widget stopped: {}", e);
        }
    });
}
