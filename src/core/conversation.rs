use std::error::Error as StdError;
use std::fmt;

use tracing::{debug, info};

use crate::api::ChatMessage;
use crate::core::encoder::{encode_image, FileId, ImageUpload};
use crate::core::message::{ContentPart, Turn, UsageStats};

/// Text sent alongside every image attachment.
pub const IMAGE_PREFACE: &str = "I uploaded an image:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Appended,
    /// The same file was already ingested last; nothing changed.
    Duplicate,
}

/// Attachments that are refused at the ingestion boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    PdfUnsupported,
    UnsupportedType { name: String, mime: String },
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::PdfUnsupported => write!(
                f,
                "PDF files can only be sent as plain files; take a screenshot and attach the image for best recognition."
            ),
            IngestError::UnsupportedType { name, mime } => write!(
                f,
                "{name} ({mime}) is not supported; attach a PNG or JPEG image."
            ),
        }
    }
}

impl StdError for IngestError {}

/// Chronological log of one session's turns.
#[derive(Debug, Default)]
pub struct ConversationStore {
    history: Vec<Turn>,
    last_uploaded: Option<FileId>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn last_uploaded(&self) -> Option<&FileId> {
        self.last_uploaded.as_ref()
    }

    pub fn append_user_text(&mut self, text: impl Into<String>) {
        self.history.push(Turn::user_text(text));
    }

    /// Ingest an attachment. Re-submitting the file that was ingested last is
    /// a no-op; only PNG and JPEG images are accepted.
    pub fn append_image(&mut self, upload: ImageUpload) -> Result<IngestOutcome, IngestError> {
        if self.last_uploaded.as_ref() == Some(upload.id()) {
            debug!(file = %upload.name(), "skipping already ingested attachment");
            return Ok(IngestOutcome::Duplicate);
        }

        if !upload.is_accepted_image() {
            if upload.is_pdf() {
                return Err(IngestError::PdfUnsupported);
            }
            return Err(IngestError::UnsupportedType {
                name: upload.name().to_string(),
                mime: upload.mime().to_string(),
            });
        }

        self.last_uploaded = Some(upload.id().clone());
        let data_uri = encode_image(upload.bytes(), upload.mime());
        info!(
            file = %upload.name(),
            bytes = upload.bytes().len(),
            "attached image"
        );
        let parts = vec![
            ContentPart::Text(IMAGE_PREFACE.to_string()),
            ContentPart::Image(data_uri),
        ];
        self.history.push(Turn::user_image(parts, upload));
        Ok(IngestOutcome::Appended)
    }

    pub fn append_assistant(&mut self, content: impl Into<String>, stats: UsageStats) {
        self.history.push(Turn::assistant(content, stats));
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.last_uploaded = None;
    }

    /// The full outbound message list: the system instruction followed by
    /// every stored turn in order.
    pub fn api_messages(&self, system_instruction: &str) -> Vec<ChatMessage> {
        std::iter::once(Turn::system(system_instruction).to_api_message())
            .chain(self.history.iter().map(Turn::to_api_message))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChatContent;
    use crate::core::message::{Content, Role};
    use std::time::{Duration, SystemTime};

    fn upload(path: &str, mime: &str, bytes: &[u8]) -> ImageUpload {
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let id = FileId::new(path, bytes.len() as u64, Some(modified));
        let name = path.rsplit('/').next().unwrap_or(path);
        ImageUpload::new(id, name, mime, bytes.to_vec())
    }

    #[test]
    fn same_file_twice_appends_one_turn() {
        let mut store = ConversationStore::new();
        let file = upload("/tmp/q1.png", "image/png", b"png-bytes");

        assert_eq!(store.append_image(file.clone()), Ok(IngestOutcome::Appended));
        assert_eq!(store.append_image(file.clone()), Ok(IngestOutcome::Duplicate));

        assert_eq!(store.len(), 1);
        assert_eq!(store.last_uploaded(), Some(file.id()));
    }

    #[test]
    fn image_turn_carries_preface_encoded_part_and_display_copy() {
        let mut store = ConversationStore::new();
        store
            .append_image(upload("/tmp/q1.jpg", "image/jpeg", b"jpg"))
            .expect("accepted");

        let turn = &store.turns()[0];
        assert_eq!(turn.role(), Role::User);
        assert_eq!(
            turn.content(),
            &Content::Parts(vec![
                ContentPart::Text(IMAGE_PREFACE.to_string()),
                ContentPart::Image(encode_image(b"jpg", "image/jpeg")),
            ])
        );
        let shown = turn.display_image().expect("display image kept");
        assert_eq!(shown.bytes(), b"jpg");
    }

    #[test]
    fn distinct_file_after_another_is_ingested() {
        let mut store = ConversationStore::new();
        let first = upload("/tmp/a.png", "image/png", b"a");
        let second = upload("/tmp/b.png", "image/png", b"b");

        store.append_image(first.clone()).expect("first");
        store.append_image(second.clone()).expect("second");
        assert_eq!(store.append_image(first.clone()), Ok(IngestOutcome::Appended));

        assert_eq!(store.len(), 3);
        assert_eq!(store.last_uploaded(), Some(first.id()));
    }

    #[test]
    fn pdf_and_other_types_are_rejected_without_state_change() {
        let mut store = ConversationStore::new();
        let pdf = upload("/tmp/worksheet.pdf", "application/pdf", b"%PDF");
        let gif = upload("/tmp/anim.gif", "image/gif", b"GIF89a");

        assert_eq!(store.append_image(pdf), Err(IngestError::PdfUnsupported));
        assert_eq!(
            store.append_image(gif),
            Err(IngestError::UnsupportedType {
                name: "anim.gif".to_string(),
                mime: "image/gif".to_string(),
            })
        );
        assert!(store.is_empty());
        assert!(store.last_uploaded().is_none());
    }

    #[test]
    fn clear_resets_history_and_upload_identity() {
        let mut store = ConversationStore::new();
        let file = upload("/tmp/q.png", "image/png", b"q");
        store.append_image(file.clone()).expect("accepted");
        store.append_user_text("what is this?");
        store.append_assistant("a triangle", UsageStats::new(10, None, "m"));

        store.clear();
        assert!(store.is_empty());
        assert!(store.last_uploaded().is_none());

        // The same file is accepted again once the guard is reset.
        assert_eq!(store.append_image(file), Ok(IngestOutcome::Appended));

        let mut empty = ConversationStore::new();
        empty.clear();
        assert!(empty.is_empty());
        assert!(empty.last_uploaded().is_none());
    }

    #[test]
    fn api_messages_prepend_system_and_keep_full_history() {
        let mut store = ConversationStore::new();
        store.append_user_text("one");
        store.append_assistant("two", UsageStats::new(3, None, "m"));
        store.append_user_text("three");

        let messages = store.api_messages("be a tutor");
        let roles: Vec<_> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert_eq!(messages[0].content, ChatContent::Text("be a tutor".to_string()));
        assert_eq!(messages[3].content, ChatContent::Text("three".to_string()));
    }
}
