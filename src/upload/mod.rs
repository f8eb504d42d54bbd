pub mod file;

use crate::api::DocumentUploader;
use crate::config::{UploadLimits, PDF_MIME};
use crate::db::models::{FileStatus, UploadedFile};
use crate::events::{EventBus, WidgetEvent};
use file::FileCandidate;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Attached but not uploaded: only PDFs can be forwarded for document Q&A.
pub const UNSUPPORTED_FOR_QA: &str =
    "Document Q&A currently supports PDF files only; this file was not uploaded.";

/// Every file of a batch that failed validation, reported together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRejection {
    pub errors: Vec<String>,
}

impl fmt::Display for UploadRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.errors.join("\n"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Ids of the placeholders created for this batch.
    pub accepted: Vec<String>,
    pub rejected: Option<UploadRejection>,
}

/// Split a batch into files to accept and per-file error lines.
///
/// Once `existing` plus the accepted files reach the limit, every remaining
/// file is rejected for the count alone.
pub fn validate_batch(
    limits: &UploadLimits,
    existing: usize,
    candidates: Vec<FileCandidate>,
) -> (Vec<FileCandidate>, Vec<String>) {
    let mut accepted = Vec::new();
    let mut errors = Vec::new();

    for candidate in candidates {
        if existing + accepted.len() >= limits.max_files {
            errors.push(format!(
                "{}: Maximum {} files allowed.",
                candidate.name, limits.max_files
            ));
            continue;
        }
        if !limits.allowed_types.iter().any(|t| *t == candidate.mime_type) {
            errors.push(format!(
                "{}: Only PDF, DOCX, or TXT files are allowed.",
                candidate.name
            ));
            continue;
        }
        if candidate.size > limits.max_file_size {
            errors.push(format!(
                "{}: Max file size is {} MB.",
                candidate.name,
                limits.max_size_mb()
            ));
            continue;
        }
        accepted.push(candidate);
    }

    (accepted, errors)
}

fn blocking_reason(files: &[UploadedFile]) -> Option<String> {
    files.iter().find(|f| !f.is_sendable()).map(|f| {
        if f.is_uploading() {
            format!("{} is still uploading", f.name)
        } else {
            format!("{}: {}", f.name, f.upload_error().unwrap_or("upload failed"))
        }
    })
}

/// Owns the files attached to the message being composed until it is sent.
pub struct UploadCoordinator {
    uploader: Arc<dyn DocumentUploader>,
    limits: UploadLimits,
    files: Mutex<Vec<UploadedFile>>,
    batches_in_flight: AtomicUsize,
    events: EventBus,
}

impl UploadCoordinator {
    pub fn new(uploader: Arc<dyn DocumentUploader>, limits: UploadLimits, events: EventBus) -> Self {
        Self {
            uploader,
            limits,
            files: Mutex::new(Vec::new()),
            batches_in_flight: AtomicUsize::new(0),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<UploadedFile>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate a batch, add placeholders for the valid files and upload them
    /// concurrently. Resolves once every upload in the batch has settled.
    pub async fn add_files(&self, candidates: Vec<FileCandidate>) -> BatchReport {
        let (queued, errors) = {
            let mut files = self.lock();
            let (valid, errors) = validate_batch(&self.limits, files.len(), candidates);
            let queued: Vec<(String, FileCandidate)> = valid
                .into_iter()
                .map(|candidate| {
                    let id = uuid::Uuid::new_v4().to_string();
                    files.push(UploadedFile {
                        id: id.clone(),
                        name: candidate.name.clone(),
                        size: candidate.size,
                        mime_type: candidate.mime_type.clone(),
                        status: FileStatus::Pending,
                    });
                    (id, candidate)
                })
                .collect();
            (queued, errors)
        };

        let rejected = (!errors.is_empty()).then(|| {
            tracing::warn!(count = errors.len(), "rejected files: {}", errors.join("; "));
            self.events.emit(WidgetEvent::UploadRejected {
                errors: errors.clone(),
            });
            UploadRejection { errors }
        });

        let accepted: Vec<String> = queued.iter().map(|(id, _)| id.clone()).collect();
        if queued.is_empty() {
            return BatchReport { accepted, rejected };
        }

        self.events.emit(WidgetEvent::FilesChanged);
        self.batches_in_flight.fetch_add(1, Ordering::SeqCst);
        self.events.emit(WidgetEvent::UploadBatchStarted {
            files: queued.len(),
        });

        futures::future::join_all(
            queued
                .iter()
                .map(|(id, candidate)| self.upload_one(id, candidate)),
        )
        .await;

        self.batches_in_flight.fetch_sub(1, Ordering::SeqCst);
        self.events.emit(WidgetEvent::UploadBatchSettled);
        BatchReport { accepted, rejected }
    }

    async fn upload_one(&self, id: &str, candidate: &FileCandidate) {
        self.set_status(id, FileStatus::Uploading);

        let status = if candidate.mime_type == PDF_MIME {
            match self.uploader.upload_document(candidate).await {
                Ok(remote) => FileStatus::Ready {
                    remote: Some(remote),
                    notice: None,
                },
                Err(e) => FileStatus::Failed {
                    reason: e.to_string(),
                },
            }
        } else {
            FileStatus::Ready {
                remote: None,
                notice: Some(UNSUPPORTED_FOR_QA.to_string()),
            }
        };

        tracing::debug!(file = %candidate.name, ?status, "upload settled");
        self.set_status(id, status);
    }

    fn set_status(&self, id: &str, status: FileStatus) {
        let found = {
            let mut files = self.lock();
            match files.iter_mut().find(|f| f.id == id) {
                Some(file) => {
                    file.status = status;
                    true
                }
                // Removed by the user while uploading.
                None => false,
            }
        };
        if found {
            self.events.emit(WidgetEvent::FilesChanged);
        }
    }

    pub fn files(&self) -> Vec<UploadedFile> {
        self.lock().clone()
    }

    pub fn is_uploading(&self) -> bool {
        self.batches_in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut files = self.lock();
            let before = files.len();
            files.retain(|f| f.id != id);
            files.len() != before
        };
        if removed {
            self.events.emit(WidgetEvent::FilesChanged);
        }
        removed
    }

    /// Why the current attachments cannot be sent yet, if anything blocks them.
    pub fn blocking_reason(&self) -> Option<String> {
        blocking_reason(&self.lock())
    }

    /// Hand every attachment over to the message being sent, or explain why
    /// they cannot go yet. Checked and drained under one lock, so a batch
    /// started concurrently is either fully taken or left in the tray.
    pub fn take_sendable(&self) -> Result<Vec<UploadedFile>, String> {
        let files = {
            let mut files = self.lock();
            if let Some(reason) = blocking_reason(&files) {
                return Err(reason);
            }
            std::mem::take(&mut *files)
        };
        if !files.is_empty() {
            self.events.emit(WidgetEvent::FilesChanged);
        }
        Ok(files)
    }
}
