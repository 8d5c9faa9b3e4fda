//! Single-question mode without the terminal UI

use std::error::Error;
use std::io::{self, Write};
use std::path::Path;

use crate::core::chat_stream::ChatStreamService;
use crate::core::completion::{Orchestrator, TurnSurface, TYPING_MARKER};
use crate::core::conversation::ConversationStore;
use crate::core::encoder::ImageUpload;
use crate::core::message::UsageStats;
use crate::core::session::SessionSettings;

pub async fn run_ask(
    settings: SessionSettings,
    prompt: Vec<String>,
    image: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        return Err("Usage: studymate ask <question> [--image <path>]".into());
    }

    let mut store = ConversationStore::new();
    if let Some(path) = image {
        let upload = ImageUpload::from_path(path)
            .map_err(|e| format!("Could not read {}: {e}", path.display()))?;
        store.append_image(upload)?;
    }

    let (service, mut rx) = ChatStreamService::new();
    let mut orchestrator = Orchestrator::new(service);
    let mut surface = StdoutSurface::new(io::stdout(), io::stderr());

    orchestrator
        .run_turn(&mut rx, &mut store, &settings, &prompt, &mut surface)
        .await?;

    if let Some(err) = surface.take_error() {
        return Err(err.into());
    }
    Ok(())
}

/// Prints the answer as it arrives; the stats line goes to `meta`.
pub struct StdoutSurface<W: Write, M: Write> {
    out: W,
    meta: M,
    printed: String,
    error: Option<io::Error>,
}

impl<W: Write, M: Write> StdoutSurface<W, M> {
    pub fn new(out: W, meta: M) -> Self {
        Self {
            out,
            meta,
            printed: String::new(),
            error: None,
        }
    }

    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    pub fn into_parts(self) -> (W, M) {
        (self.out, self.meta)
    }

    /// Print whatever extends the already printed prefix. A trailing
    /// backslash is held back because the next fragment may turn it into a
    /// math delimiter.
    fn emit_stable(&mut self, rendered: &str, hold_backslash: bool) -> io::Result<()> {
        let mut stable = rendered;
        if hold_backslash {
            stable = stable.strip_suffix('\\').unwrap_or(stable);
        }
        if let Some(fresh) = stable.strip_prefix(self.printed.as_str()) {
            if !fresh.is_empty() {
                self.out.write_all(fresh.as_bytes())?;
                self.out.flush()?;
                self.printed.push_str(fresh);
            }
        }
        Ok(())
    }

    fn record(&mut self, result: io::Result<()>) {
        if let Err(e) = result {
            if self.error.is_none() {
                self.error = Some(e);
            }
        }
    }
}

impl<W: Write, M: Write> TurnSurface for StdoutSurface<W, M> {
    fn show_partial(&mut self, rendered: &str) {
        let text = rendered.strip_suffix(TYPING_MARKER).unwrap_or(rendered);
        let result = self.emit_stable(text, true);
        self.record(result);
    }

    fn show_final(&mut self, rendered: &str, stats: &UsageStats) {
        let result = self
            .emit_stable(rendered, false)
            .and_then(|_| writeln!(self.out))
            .and_then(|_| writeln!(self.meta, "{stats}"));
        self.record(result);
    }
}
