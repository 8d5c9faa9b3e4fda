use futures_util::StreamExt;
use memchr::memchr;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{chat_completions_url, ChatRequest, ChatResponse, Usage};

#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    Chunk(String),
    Usage(Usage),
    Error(String),
    End,
}

pub type StreamSender = mpsc::UnboundedSender<(StreamMessage, u64)>;
pub type StreamReceiver = mpsc::UnboundedReceiver<(StreamMessage, u64)>;

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn handle_data_payload(payload: &str, tx: &StreamSender, stream_id: u64) -> bool {
    if payload == "[DONE]" {
        let _ = tx.send((StreamMessage::End, stream_id));
        return true;
    }

    if payload.trim().is_empty() {
        return false;
    }

    let parsed = serde_json::from_str::<serde_json::Value>(payload)
        .ok()
        .filter(|value| value.get("error").is_none_or(serde_json::Value::is_null))
        .and_then(|value| serde_json::from_value::<ChatResponse>(value).ok());

    match parsed {
        Some(response) => {
            if let Some(content) = response
                .choices
                .first()
                .and_then(|choice| choice.delta.content.as_ref())
            {
                if !content.is_empty() {
                    let _ = tx.send((StreamMessage::Chunk(content.clone()), stream_id));
                }
            }
            if let Some(usage) = response.usage {
                let _ = tx.send((StreamMessage::Usage(usage), stream_id));
            }
            false
        }
        None => {
            send_failure(tx, stream_id, format_api_error(payload));
            true
        }
    }
}

fn process_sse_line(line: &str, tx: &StreamSender, stream_id: u64) -> bool {
    extract_data_payload(line)
        .map(|payload| handle_data_payload(payload, tx, stream_id))
        .unwrap_or(false)
}

fn process_line_bytes(line: &[u8], tx: &StreamSender, stream_id: u64) -> bool {
    match std::str::from_utf8(line) {
        Ok(line) => process_sse_line(line.trim(), tx, stream_id),
        Err(e) => {
            warn!(stream_id, error = %e, "invalid UTF-8 in stream");
            false
        }
    }
}

fn send_failure(tx: &StreamSender, stream_id: u64, message: String) {
    let _ = tx.send((StreamMessage::Error(message), stream_id));
    let _ = tx.send((StreamMessage::End, stream_id));
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value
                .get("error")
                .and_then(|v| v.as_str().map(str::to_owned))
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Render an error body for display: a one-line summary when one can be
/// found, followed by the body in a fenced block.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error:\n```\n<empty>\n```".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            return match extract_error_summary(&json_value).filter(|s| !s.is_empty()) {
                Some(summary) => format!("API Error: {}\n```json\n{}\n```", summary, pretty_json),
                None => format!("API Error:\n```json\n{}\n```", pretty_json),
            };
        }
    }

    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        format!("API Error:\n```xml\n{}\n```", trimmed)
    } else {
        format!("API Error:\n```\n{}\n```", trimmed)
    }
}

pub struct StreamParams {
    pub client: reqwest::Client,
    pub base_url: String,
    pub api_key: String,
    pub request: ChatRequest,
    pub cancel_token: tokio_util::sync::CancellationToken,
    pub stream_id: u64,
}

/// Starts a completion stream whose messages arrive on a shared channel,
/// tagged with the params' stream id.
pub trait StreamLauncher {
    fn launch(&self, params: StreamParams);
}

impl<T: StreamLauncher + ?Sized> StreamLauncher for Box<T> {
    fn launch(&self, params: StreamParams) {
        (**self).launch(params);
    }
}

#[derive(Clone)]
pub struct ChatStreamService {
    tx: StreamSender,
}

impl ChatStreamService {
    pub fn new() -> (Self, StreamReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn_stream(&self, params: StreamParams) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let StreamParams {
                client,
                base_url,
                api_key,
                request,
                cancel_token,
                stream_id,
            } = params;

            tokio::select! {
                _ = run_stream(client, &base_url, &api_key, &request, &tx, stream_id) => {}
                _ = cancel_token.cancelled() => {
                    debug!(stream_id, "stream cancelled");
                }
            }
        });
    }
}

impl StreamLauncher for ChatStreamService {
    fn launch(&self, params: StreamParams) {
        self.spawn_stream(params);
    }
}

async fn run_stream(
    client: reqwest::Client,
    base_url: &str,
    api_key: &str,
    request: &ChatRequest,
    tx: &StreamSender,
    stream_id: u64,
) {
    let chat_url = chat_completions_url(base_url);
    debug!(
        stream_id,
        url = %chat_url,
        model = %request.model,
        messages = request.messages.len(),
        "opening completion stream"
    );

    let response = match client
        .post(chat_url)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {api_key}"))
        .json(request)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            warn!(stream_id, error = %e, "completion request failed");
            send_failure(tx, stream_id, format_api_error(&e.to_string()));
            return;
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        warn!(stream_id, %status, "completion request rejected");
        send_failure(tx, stream_id, format_api_error(&error_text));
        return;
    }

    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk_bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(stream_id, error = %e, "completion stream interrupted");
                send_failure(tx, stream_id, format_api_error(&e.to_string()));
                return;
            }
        };
        buffer.extend_from_slice(&chunk_bytes);

        while let Some(newline_pos) = memchr(b'\n', &buffer) {
            let should_end = process_line_bytes(&buffer[..newline_pos], tx, stream_id);
            buffer.drain(..=newline_pos);
            if should_end {
                return;
            }
        }
    }

    // The body may end without a trailing newline.
    if !buffer.is_empty() && process_line_bytes(&buffer, tx, stream_id) {
        return;
    }
    let _ = tx.send((StreamMessage::End, stream_id));
}
