use crate::db::models::UploadedFile;
use crate::error::WidgetError;
use crate::upload::file::FileCandidate;
use crate::upload::BatchReport;
use crate::widget::ChatWidget;
use std::path::PathBuf;

fn ensure_enabled(widget: &ChatWidget) -> Result<(), WidgetError> {
    if widget.config().options.allow_upload {
        Ok(())
    } else {
        Err(WidgetError::Validation("File uploads are disabled.".into()))
    }
}

/// Add picked files to the tray and wait for their uploads to settle.
pub async fn add_files(widget: &ChatWidget, candidates: Vec<FileCandidate>) -> Result<BatchReport, WidgetError> {
    ensure_enabled(widget)?;
    Ok(widget.uploads().add_files(candidates).await)
}

/// Like [`add_files`], reading each file from disk first.
pub async fn attach_paths(widget: &ChatWidget, paths: &[PathBuf]) -> Result<BatchReport, WidgetError> {
    ensure_enabled(widget)?;
    let candidates = paths
        .iter()
        .map(|p| FileCandidate::from_path(p))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(widget.uploads().add_files(candidates).await)
}

pub fn list_files(widget: &ChatWidget) -> Vec<UploadedFile> {
    widget.uploads().files()
}

pub fn remove_file(widget: &ChatWidget, id: &str) -> Result<(), WidgetError> {
    if widget.uploads().remove(id) {
        Ok(())
    } else {
        Err(WidgetError::Validation(format!("No attached file with id {}", id)))
    }
}
