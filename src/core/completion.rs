//! Running one question-and-answer turn against the completions API.
//!
//! A turn appends the user's text, sends the whole conversation behind a fixed
//! tutoring instruction, folds the streamed deltas into an accumulator and,
//! once the stream ends cleanly, commits the answer with its usage line. A
//! failed or interrupted stream leaves no assistant turn behind.
//!
//! The terminal loop drives the step-wise API ([`Orchestrator::begin_turn`],
//! [`ActiveTurn::apply`], [`ActiveTurn::commit`]) from its own event loop;
//! [`Orchestrator::run_turn`] drives the same steps to completion for
//! one-shot use.

use std::error::Error as StdError;
use std::fmt;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ChatRequest, StreamOptions, Usage};
use crate::core::chat_stream::{StreamLauncher, StreamMessage, StreamParams, StreamReceiver};
use crate::core::conversation::ConversationStore;
use crate::core::markup::normalize_math;
use crate::core::message::UsageStats;
use crate::core::session::SessionSettings;

pub const SYSTEM_INSTRUCTION: &str = "You are a tutor for every school subject. \
Recognize the problems shown in uploaded images. When writing math, wrap inline \
formulas in $...$ and display formulas in $$...$$.";

pub const TEMPERATURE: f32 = 0.3;

/// Appended to the live answer while tokens are still arriving.
pub const TYPING_MARKER: &str = "▌";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    /// No API key configured; nothing was sent or recorded.
    MissingApiKey,
    /// Transport, HTTP or payload failure, already formatted for display.
    Api(String),
    /// The user interrupted the stream.
    Cancelled,
    /// The stream channel closed before the answer finished.
    Disconnected,
}

impl fmt::Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnError::MissingApiKey => {
                write!(f, "Enter an API key first (--api-key, OPENAI_API_KEY or config.toml).")
            }
            TurnError::Api(message) => write!(f, "{message}"),
            TurnError::Cancelled => write!(f, "Response interrupted; nothing was saved."),
            TurnError::Disconnected => write!(f, "The response stream closed unexpectedly."),
        }
    }
}

impl StdError for TurnError {}

/// Collects streamed fragments and the latest usage report.
#[derive(Debug, Default, Clone)]
pub struct StreamAccumulator {
    text: String,
    usage: Option<Usage>,
}

impl StreamAccumulator {
    pub fn push_fragment(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }

    /// Later reports replace earlier ones; reports without a positive total
    /// are ignored.
    pub fn record_usage(&mut self, usage: Usage) {
        if usage.is_reported() {
            self.usage = Some(usage);
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }

    /// Character count of the answer; not a linguistic word count.
    pub fn word_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn render_live(&self) -> String {
        let mut rendered = normalize_math(&self.text);
        rendered.push_str(TYPING_MARKER);
        rendered
    }

    pub fn render_final(&self) -> String {
        normalize_math(&self.text)
    }

    pub fn stats(&self, model: &str) -> UsageStats {
        UsageStats::new(self.word_count(), self.usage, model)
    }
}

/// Receives renders of the answer as it streams in.
pub trait TurnSurface {
    fn show_partial(&mut self, rendered: &str);
    fn show_final(&mut self, rendered: &str, stats: &UsageStats);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnProgress {
    /// New text arrived; re-render.
    Updated,
    /// Bookkeeping only (usage); nothing visible changed.
    Pending,
    Finished,
    Failed(TurnError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSummary {
    pub text: String,
    pub stats: UsageStats,
}

/// A turn whose stream is in flight.
#[derive(Debug)]
pub struct ActiveTurn {
    stream_id: u64,
    model: String,
    accumulator: StreamAccumulator,
    cancel_token: CancellationToken,
}

impl ActiveTurn {
    pub fn stream_id(&self) -> u64 {
        self.stream_id
    }

    pub fn accumulator(&self) -> &StreamAccumulator {
        &self.accumulator
    }

    pub fn render_live(&self) -> String {
        self.accumulator.render_live()
    }

    pub fn apply(&mut self, message: StreamMessage) -> TurnProgress {
        match message {
            StreamMessage::Chunk(fragment) => {
                self.accumulator.push_fragment(&fragment);
                TurnProgress::Updated
            }
            StreamMessage::Usage(usage) => {
                self.accumulator.record_usage(usage);
                TurnProgress::Pending
            }
            StreamMessage::Error(message) => {
                warn!(
                    stream_id = self.stream_id,
                    received = self.accumulator.text().len(),
                    "abandoning turn after stream error"
                );
                TurnProgress::Failed(TurnError::Api(message))
            }
            StreamMessage::End => TurnProgress::Finished,
        }
    }

    /// Stop the stream; the turn must then be dropped without committing.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Record the finished answer in the store.
    pub fn commit(self, store: &mut ConversationStore) -> TurnSummary {
        let stats = self.accumulator.stats(&self.model);
        let text = self.accumulator.text;
        info!(
            stream_id = self.stream_id,
            word_count = stats.word_count(),
            total_tokens = stats.tokens().and_then(|usage| usage.total_tokens),
            model = %self.model,
            "turn finished"
        );
        store.append_assistant(text.clone(), stats.clone());
        TurnSummary { text, stats }
    }
}

pub fn build_request(store: &ConversationStore, model: &str) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: store.api_messages(SYSTEM_INSTRUCTION),
        stream: true,
        temperature: TEMPERATURE,
        stream_options: StreamOptions {
            include_usage: true,
        },
    }
}

pub struct Orchestrator<L> {
    launcher: L,
    client: reqwest::Client,
    next_stream_id: u64,
}

impl<L: StreamLauncher> Orchestrator<L> {
    pub fn new(launcher: L) -> Self {
        Self::with_client(launcher, reqwest::Client::new())
    }

    pub fn with_client(launcher: L, client: reqwest::Client) -> Self {
        Self {
            launcher,
            client,
            next_stream_id: 0,
        }
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Record the user's text and open the completion stream.
    pub fn begin_turn(
        &mut self,
        store: &mut ConversationStore,
        settings: &SessionSettings,
        prompt: &str,
    ) -> Result<ActiveTurn, TurnError> {
        if !settings.has_api_key() {
            return Err(TurnError::MissingApiKey);
        }

        store.append_user_text(prompt);
        let request = build_request(store, &settings.model);

        self.next_stream_id += 1;
        let stream_id = self.next_stream_id;
        let cancel_token = CancellationToken::new();
        debug!(stream_id, turns = store.len(), "starting turn");

        self.launcher.launch(StreamParams {
            client: self.client.clone(),
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            request,
            cancel_token: cancel_token.clone(),
            stream_id,
        });

        Ok(ActiveTurn {
            stream_id,
            model: settings.model.clone(),
            accumulator: StreamAccumulator::default(),
            cancel_token,
        })
    }

    /// Run a turn to completion, feeding renders to `surface`.
    pub async fn run_turn<S: TurnSurface>(
        &mut self,
        rx: &mut StreamReceiver,
        store: &mut ConversationStore,
        settings: &SessionSettings,
        prompt: &str,
        surface: &mut S,
    ) -> Result<TurnSummary, TurnError> {
        let mut turn = self.begin_turn(store, settings, prompt)?;

        while let Some((message, stream_id)) = rx.recv().await {
            if stream_id != turn.stream_id() {
                continue;
            }
            match turn.apply(message) {
                TurnProgress::Updated => surface.show_partial(&turn.render_live()),
                TurnProgress::Pending => {}
                TurnProgress::Finished => {
                    let rendered = turn.accumulator().render_final();
                    let summary = turn.commit(store);
                    surface.show_final(&rendered, &summary.stats);
                    return Ok(summary);
                }
                TurnProgress::Failed(err) => {
                    turn.cancel();
                    return Err(err);
                }
            }
        }

        Err(TurnError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChatContent;
    use crate::core::chat_stream::StreamSender;
    use crate::core::message::{Content, Role};
    use std::cell::{Cell, RefCell};
    use tokio::sync::mpsc;

    /// Replays a fixed script onto the channel instead of calling the network.
    struct ScriptedLauncher {
        tx: RefCell<Option<StreamSender>>,
        script: Vec<StreamMessage>,
        hang_up: bool,
        launches: Cell<usize>,
        requests: RefCell<Vec<ChatRequest>>,
    }

    impl ScriptedLauncher {
        fn new(script: Vec<StreamMessage>) -> (Self, StreamReceiver) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Self {
                    tx: RefCell::new(Some(tx)),
                    script,
                    hang_up: false,
                    launches: Cell::new(0),
                    requests: RefCell::new(Vec::new()),
                },
                rx,
            )
        }

        /// Drop the sender after the script so the receiver sees a closed channel.
        fn hanging_up(script: Vec<StreamMessage>) -> (Self, StreamReceiver) {
            let (mut launcher, rx) = Self::new(script);
            launcher.hang_up = true;
            (launcher, rx)
        }

        fn inject(&self, message: StreamMessage, stream_id: u64) {
            if let Some(tx) = self.tx.borrow().as_ref() {
                let _ = tx.send((message, stream_id));
            }
        }
    }

    impl StreamLauncher for ScriptedLauncher {
        fn launch(&self, params: StreamParams) {
            self.launches.set(self.launches.get() + 1);
            for message in &self.script {
                self.inject(message.clone(), params.stream_id);
            }
            if self.hang_up {
                self.tx.borrow_mut().take();
            }
            self.requests.borrow_mut().push(params.request);
        }
    }

    #[derive(Default)]
    struct RecordingSurface {
        partials: Vec<String>,
        finals: Vec<(String, String)>,
    }

    impl TurnSurface for RecordingSurface {
        fn show_partial(&mut self, rendered: &str) {
            self.partials.push(rendered.to_string());
        }

        fn show_final(&mut self, rendered: &str, stats: &UsageStats) {
            self.finals.push((rendered.to_string(), stats.to_string()));
        }
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            api_key: "sk-test".to_string(),
            base_url: "http://localhost:9".to_string(),
            model: "gpt-5.2".to_string(),
        }
    }

    fn chunk(text: &str) -> StreamMessage {
        StreamMessage::Chunk(text.to_string())
    }

    fn usage(prompt: u64, completion: u64, total: u64) -> StreamMessage {
        StreamMessage::Usage(Usage::new(prompt, completion, total))
    }

    #[tokio::test]
    async fn streamed_chunks_become_one_assistant_turn_with_usage() {
        let (launcher, mut rx) = ScriptedLauncher::new(vec![
            chunk("Hel"),
            chunk("lo"),
            usage(10, 2, 12),
            StreamMessage::End,
        ]);
        let mut orchestrator = Orchestrator::new(launcher);
        let mut store = ConversationStore::new();
        let mut surface = RecordingSurface::default();

        let summary = orchestrator
            .run_turn(&mut rx, &mut store, &settings(), "hi", &mut surface)
            .await
            .expect("turn succeeds");

        assert_eq!(summary.text, "Hello");
        assert_eq!(summary.stats.word_count(), 5);
        assert_eq!(summary.stats.tokens().and_then(|u| u.total_tokens), Some(12));
        assert!(summary.stats.to_string().contains("total tokens used: 12"));

        assert_eq!(store.len(), 2);
        let answer = &store.turns()[1];
        assert_eq!(answer.role(), Role::Assistant);
        assert_eq!(answer.content(), &Content::Text("Hello".to_string()));
        assert_eq!(answer.stats(), Some(&summary.stats));

        assert_eq!(surface.partials, vec!["Hel▌", "Hello▌"]);
        assert_eq!(
            surface.finals,
            vec![(
                "Hello".to_string(),
                "word count: 5, prompt tokens: 10, completion tokens: 2, total tokens used: 12, model: gpt-5.2"
                    .to_string()
            )]
        );
    }

    #[tokio::test]
    async fn missing_usage_reports_tokens_unavailable() {
        let (launcher, mut rx) = ScriptedLauncher::new(vec![chunk("4"), StreamMessage::End]);
        let mut orchestrator = Orchestrator::new(launcher);
        let mut store = ConversationStore::new();

        let summary = orchestrator
            .run_turn(
                &mut rx,
                &mut store,
                &settings(),
                "2+2?",
                &mut RecordingSurface::default(),
            )
            .await
            .expect("turn succeeds");

        assert_eq!(summary.stats.tokens(), None);
        assert_eq!(
            summary.stats.to_string(),
            "word count: 1, tokens: unavailable, model: gpt-5.2"
        );
    }

    #[tokio::test]
    async fn last_usage_report_wins() {
        let (launcher, mut rx) = ScriptedLauncher::new(vec![
            usage(1, 1, 2),
            chunk("ok"),
            usage(10, 3, 13),
            StreamMessage::End,
        ]);
        let mut orchestrator = Orchestrator::new(launcher);
        let mut store = ConversationStore::new();

        let summary = orchestrator
            .run_turn(
                &mut rx,
                &mut store,
                &settings(),
                "q",
                &mut RecordingSurface::default(),
            )
            .await
            .expect("turn succeeds");

        assert_eq!(summary.stats.tokens().and_then(|u| u.total_tokens), Some(13));
    }

    #[tokio::test]
    async fn zero_usage_report_counts_as_unavailable() {
        let (launcher, mut rx) = ScriptedLauncher::new(vec![
            chunk("ok"),
            usage(0, 0, 0),
            StreamMessage::End,
        ]);
        let mut orchestrator = Orchestrator::new(launcher);
        let mut store = ConversationStore::new();

        let summary = orchestrator
            .run_turn(
                &mut rx,
                &mut store,
                &settings(),
                "q",
                &mut RecordingSurface::default(),
            )
            .await
            .expect("turn succeeds");

        assert_eq!(summary.stats.tokens(), None);
        assert!(summary.stats.to_string().contains("tokens: unavailable"));
    }

    #[tokio::test]
    async fn empty_api_key_sends_nothing_and_records_nothing() {
        let (launcher, mut rx) = ScriptedLauncher::new(vec![chunk("never")]);
        let mut orchestrator = Orchestrator::new(launcher);
        let mut store = ConversationStore::new();
        let settings = SessionSettings {
            api_key: String::new(),
            ..settings()
        };

        let result = orchestrator
            .run_turn(
                &mut rx,
                &mut store,
                &settings,
                "hello",
                &mut RecordingSurface::default(),
            )
            .await;

        assert_eq!(result, Err(TurnError::MissingApiKey));
        assert!(store.is_empty());
        assert_eq!(orchestrator.launcher().launches.get(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn mid_stream_error_commits_no_assistant_turn() {
        let (launcher, mut rx) = ScriptedLauncher::new(vec![
            chunk("partial an"),
            StreamMessage::Error("API Error: boom".to_string()),
            StreamMessage::End,
        ]);
        let mut orchestrator = Orchestrator::new(launcher);
        let mut store = ConversationStore::new();
        store.append_user_text("earlier");
        let mut surface = RecordingSurface::default();

        let result = orchestrator
            .run_turn(&mut rx, &mut store, &settings(), "now", &mut surface)
            .await;

        assert_eq!(result, Err(TurnError::Api("API Error: boom".to_string())));
        assert_eq!(store.len(), 2);
        assert!(store.turns().iter().all(|turn| turn.role() == Role::User));
        assert_eq!(surface.partials, vec!["partial an▌"]);
        assert!(surface.finals.is_empty());
    }

    #[tokio::test]
    async fn closed_channel_is_a_disconnect() {
        let (launcher, mut rx) = ScriptedLauncher::hanging_up(vec![chunk("half")]);
        let mut orchestrator = Orchestrator::new(launcher);
        let mut store = ConversationStore::new();

        let result = orchestrator
            .run_turn(
                &mut rx,
                &mut store,
                &settings(),
                "q",
                &mut RecordingSurface::default(),
            )
            .await;

        assert_eq!(result, Err(TurnError::Disconnected));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn request_resends_full_history_behind_system_instruction() {
        let (launcher, mut rx) = ScriptedLauncher::new(vec![chunk("a"), StreamMessage::End]);
        let mut orchestrator = Orchestrator::new(launcher);
        let mut store = ConversationStore::new();
        let mut surface = RecordingSurface::default();

        orchestrator
            .run_turn(&mut rx, &mut store, &settings(), "first", &mut surface)
            .await
            .expect("first turn");
        orchestrator
            .run_turn(&mut rx, &mut store, &settings(), "second", &mut surface)
            .await
            .expect("second turn");

        let requests = orchestrator.launcher().requests.borrow();
        assert_eq!(requests.len(), 2);
        let last = &requests[1];
        assert_eq!(last.model, "gpt-5.2");
        assert!(last.stream);
        assert!(last.stream_options.include_usage);
        assert!((last.temperature - 0.3).abs() < f32::EPSILON);

        let roles: Vec<_> = last.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert_eq!(
            last.messages[0].content,
            ChatContent::Text(SYSTEM_INSTRUCTION.to_string())
        );
        assert_eq!(last.messages[3].content, ChatContent::Text("second".to_string()));
        assert_eq!(store.len(), 4);
    }

    #[tokio::test]
    async fn stale_stream_messages_are_ignored() {
        let (launcher, mut rx) = ScriptedLauncher::new(vec![chunk("new"), StreamMessage::End]);
        launcher.inject(chunk("old"), 42);
        let mut orchestrator = Orchestrator::new(launcher);
        let mut store = ConversationStore::new();

        let summary = orchestrator
            .run_turn(
                &mut rx,
                &mut store,
                &settings(),
                "q",
                &mut RecordingSurface::default(),
            )
            .await
            .expect("turn succeeds");

        assert_eq!(summary.text, "new");
    }

    #[test]
    fn live_render_normalizes_math_and_appends_marker() {
        let mut accumulator = StreamAccumulator::default();
        accumulator.push_fragment(r"Solve \(x^2\)");
        assert_eq!(accumulator.render_live(), "Solve $x^2$▌");
        assert_eq!(accumulator.render_final(), "Solve $x^2$");
        assert_eq!(accumulator.text(), r"Solve \(x^2\)");
    }

    #[test]
    fn word_count_counts_characters() {
        let mut accumulator = StreamAccumulator::default();
        accumulator.push_fragment("二次方程");
        accumulator.push_fragment(" ok");
        assert_eq!(accumulator.word_count(), 7);
    }
}
