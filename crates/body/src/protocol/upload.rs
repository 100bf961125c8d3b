use std::path::{Path, PathBuf};

use crate::codec::PartHeader;

/// Lifecycle of a file upload streamed to disk
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UploadState {
    /// part data is still being written
    Streaming,
    /// the part ended and the file was flushed
    Completed,
    /// writing the file failed, the exchange is failed too
    Failed,
}

/// Descriptor of one multipart file field stored under a generated file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    transfer_encoding: Option<String>,
    uploaded_path: PathBuf,
    declared_size: Option<u64>,
    size: u64,
    state: UploadState,
}

impl FileUpload {
    pub(crate) fn new(header: &PartHeader, uploaded_path: PathBuf) -> Self {
        Self {
            name: header.name().to_string(),
            file_name: header.file_name().map(ToString::to_string),
            content_type: header.content_type().map(ToString::to_string),
            transfer_encoding: header.transfer_encoding().map(ToString::to_string),
            uploaded_path,
            declared_size: header.content_length(),
            size: 0,
            state: UploadState::Streaming,
        }
    }

    /// The form field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The file name sent by the client, never used on disk
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn transfer_encoding(&self) -> Option<&str> {
        self.transfer_encoding.as_deref()
    }

    /// The generated path the part was written to
    pub fn uploaded_path(&self) -> &Path {
        &self.uploaded_path
    }

    /// Size announced by the part's own `Content-Length`, if any
    pub fn declared_size(&self) -> Option<u64> {
        self.declared_size
    }

    /// Bytes written so far
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        self.state == UploadState::Completed
    }

    pub(crate) fn complete(&mut self, size: u64) {
        self.size = size;
        self.state = UploadState::Completed;
    }

    pub(crate) fn fail(&mut self, size: u64) {
        self.size = size;
        self.state = UploadState::Failed;
    }
}
