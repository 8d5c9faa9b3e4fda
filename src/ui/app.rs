use std::path::Path;

use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders};
use tracing::{debug, warn};
use tui_textarea::TextArea;

use crate::commands::{process_input, CommandResult};
use crate::core::chat_stream::{StreamLauncher, StreamMessage};
use crate::core::completion::{ActiveTurn, Orchestrator, TurnError, TurnProgress, TYPING_MARKER};
use crate::core::conversation::{ConversationStore, IngestOutcome};
use crate::core::encoder::ImageUpload;
use crate::core::models::resolve_model;
use crate::core::session::SessionSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

/// A transient message shown under the transcript; never part of history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

pub struct ChatApp {
    store: ConversationStore,
    settings: SessionSettings,
    orchestrator: Orchestrator<Box<dyn StreamLauncher>>,
    active_turn: Option<ActiveTurn>,
    live_output: Option<String>,
    notice: Option<Notice>,
    pub input: TextArea<'static>,
    pub scroll_offset: u16,
    pub follow_output: bool,
    should_quit: bool,
}

impl ChatApp {
    pub fn new(settings: SessionSettings, launcher: Box<dyn StreamLauncher>) -> Self {
        let mut app = Self {
            store: ConversationStore::new(),
            settings,
            orchestrator: Orchestrator::new(launcher),
            active_turn: None,
            live_output: None,
            notice: None,
            input: new_input(),
            scroll_offset: 0,
            follow_output: true,
            should_quit: false,
        };
        if !app.settings.has_api_key() {
            app.set_notice(
                NoticeKind::Warning,
                TurnError::MissingApiKey.to_string(),
            );
        }
        app
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn live_output(&self) -> Option<&str> {
        self.live_output.as_deref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn is_streaming(&self) -> bool {
        self.active_turn.is_some()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn set_notice(&mut self, kind: NoticeKind, text: impl Into<String>) {
        self.notice = Some(Notice {
            kind,
            text: text.into(),
        });
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    /// Take the composed text out of the input box, leaving it empty.
    pub fn take_input(&mut self) -> String {
        let text = self.input.lines().join("\n");
        self.input = new_input();
        text
    }

    /// Handle a submitted line: slash commands first, otherwise a question.
    pub fn submit(&mut self, input: &str) {
        if input.trim().is_empty() {
            return;
        }
        match process_input(self, input) {
            CommandResult::Continue => {}
            CommandResult::Quit => self.quit(),
            CommandResult::ProcessAsMessage(text) => self.send_message(&text),
        }
    }

    fn send_message(&mut self, text: &str) {
        if self.is_streaming() {
            self.set_notice(
                NoticeKind::Warning,
                "Still answering; press Esc to interrupt first.",
            );
            return;
        }

        match self
            .orchestrator
            .begin_turn(&mut self.store, &self.settings, text)
        {
            Ok(turn) => {
                self.clear_notice();
                self.live_output = Some(TYPING_MARKER.to_string());
                self.active_turn = Some(turn);
                self.follow_output = true;
            }
            Err(err) => self.set_notice(NoticeKind::Warning, err.to_string()),
        }
    }

    pub fn handle_stream_message(&mut self, message: StreamMessage, stream_id: u64) {
        let Some(turn) = self.active_turn.as_mut() else {
            debug!(stream_id, "dropping message with no active turn");
            return;
        };
        if turn.stream_id() != stream_id {
            debug!(stream_id, "dropping message from a stale stream");
            return;
        }

        match turn.apply(message) {
            TurnProgress::Updated => self.live_output = Some(turn.render_live()),
            TurnProgress::Pending => {}
            TurnProgress::Finished => {
                if let Some(turn) = self.active_turn.take() {
                    turn.commit(&mut self.store);
                }
                self.live_output = None;
            }
            TurnProgress::Failed(err) => {
                if let Some(turn) = self.active_turn.take() {
                    turn.cancel();
                }
                self.live_output = None;
                self.set_notice(NoticeKind::Error, err.to_string());
            }
        }
    }

    /// Abandon the in-flight answer, if any.
    pub fn interrupt(&mut self) {
        if let Some(turn) = self.active_turn.take() {
            turn.cancel();
            self.live_output = None;
            self.set_notice(NoticeKind::Warning, TurnError::Cancelled.to_string());
        }
    }

    pub fn quit(&mut self) {
        if let Some(turn) = self.active_turn.take() {
            turn.cancel();
        }
        self.should_quit = true;
    }

    pub fn attach_file(&mut self, path: &Path) {
        if self.is_streaming() {
            self.set_notice(
                NoticeKind::Warning,
                "Wait for the current answer before attaching files.",
            );
            return;
        }

        let upload = match ImageUpload::from_path(path) {
            Ok(upload) => upload,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read attachment");
                self.set_notice(
                    NoticeKind::Error,
                    format!("Could not read {}: {e}", path.display()),
                );
                return;
            }
        };

        let name = upload.name().to_string();
        match self.store.append_image(upload) {
            Ok(IngestOutcome::Appended) => {
                self.follow_output = true;
                self.set_notice(
                    NoticeKind::Info,
                    format!("Attached {name}. Ask your question about it below."),
                );
            }
            Ok(IngestOutcome::Duplicate) => {
                self.set_notice(NoticeKind::Info, format!("{name} is already attached."));
            }
            Err(err) => self.set_notice(NoticeKind::Warning, err.to_string()),
        }
    }

    pub fn clear_history(&mut self) {
        if self.is_streaming() {
            self.set_notice(
                NoticeKind::Warning,
                "Wait for the current answer before clearing.",
            );
            return;
        }
        self.store.clear();
        self.scroll_offset = 0;
        self.follow_output = true;
        self.set_notice(NoticeKind::Info, "Conversation cleared.");
    }

    pub fn select_model(&mut self, requested: &str) {
        match resolve_model(requested) {
            Ok(model) => {
                self.settings.model = model.to_string();
                self.set_notice(NoticeKind::Info, format!("Model set to {model}."));
            }
            Err(message) => self.set_notice(NoticeKind::Warning, message),
        }
    }
}

fn new_input() -> TextArea<'static> {
    let mut input = TextArea::default();
    input.set_block(Block::default().borders(Borders::ALL));
    input.set_cursor_line_style(Style::default());
    input.set_placeholder_text("Ask a question, or /help for commands");
    input.set_placeholder_style(Style::default().fg(Color::DarkGray));
    input
}
