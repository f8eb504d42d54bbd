use crate::config::{DOCX_MIME, PDF_MIME, TEXT_MIME};
use std::fs;
use std::path::Path;

/// A file the user picked, before validation.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl FileCandidate {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: data.len() as u64,
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Read a file from disk, inferring its type from the extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let data = fs::read(path)?;
        Ok(Self::new(name, mime_for_path(path), data))
    }
}

/// MIME type for the extensions the widget accepts.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "pdf" => PDF_MIME,
        "docx" => DOCX_MIME,
        "txt" | "md" | "markdown" => TEXT_MIME,
        _ => "application/octet-stream",
    }
}
