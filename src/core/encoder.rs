//! Turning attached files into inline `data:` references.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;

/// MIME types accepted as image attachments.
pub const ACCEPTED_IMAGE_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/jpg"];

pub const PDF_MIME: &str = "application/pdf";

/// Identity of an attached file: the same path with the same size and
/// modification time is treated as the same upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileId {
    path: PathBuf,
    len: u64,
    modified: Option<SystemTime>,
}

impl FileId {
    pub fn new(path: impl Into<PathBuf>, len: u64, modified: Option<SystemTime>) -> Self {
        Self {
            path: path.into(),
            len,
            modified,
        }
    }
}

/// A file picked by the user, kept whole so the transcript can show it.
#[derive(Clone)]
pub struct ImageUpload {
    id: FileId,
    name: String,
    mime: String,
    bytes: Arc<[u8]>,
}

impl ImageUpload {
    pub fn new(id: FileId, name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id,
            name: name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, deriving its MIME type from the extension.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let canonical = fs::canonicalize(path)?;
        let metadata = fs::metadata(&canonical)?;
        let bytes = fs::read(&canonical)?;
        let name = canonical
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| canonical.display().to_string());
        let mime = mime_for_path(&canonical);
        let id = FileId::new(canonical, metadata.len(), metadata.modified().ok());
        Ok(Self::new(id, name, mime, bytes))
    }

    pub fn id(&self) -> &FileId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_accepted_image(&self) -> bool {
        ACCEPTED_IMAGE_TYPES.iter().any(|accepted| *accepted == self.mime)
    }

    pub fn is_pdf(&self) -> bool {
        self.mime.contains("pdf")
    }
}

impl fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageUpload")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

pub fn mime_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => PDF_MIME,
        "txt" | "md" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Encode bytes as `data:<mime>;base64,<payload>`.
pub fn encode_image(bytes: &[u8], mime: &str) -> String {
    format!("data:{mime};base64,{}", BASE64_STANDARD.encode(bytes))
}
