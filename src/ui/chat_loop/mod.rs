//! Terminal event loop for the interactive chat.
//!
//! Terminal input is read on a background task and forwarded over a channel;
//! the loop redraws, then drains keyboard events and stream messages.

mod lifecycle;

use std::{error::Error, time::Duration};

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tui_textarea::Input as TAInput;

use self::lifecycle::{restore_terminal, setup_terminal, ChatTerminal};
use crate::core::chat_stream::{ChatStreamService, StreamReceiver};
use crate::core::session::SessionSettings;
use crate::ui::app::{ChatApp, NoticeKind};
use crate::ui::renderer::{scroll_by, ui};

const PAGE_SCROLL: i32 = 10;

#[derive(Debug)]
pub enum UiEvent {
    Crossterm(Event),
}

fn spawn_event_reader(event_tx: mpsc::UnboundedSender<UiEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Ok(true) = event::poll(Duration::from_millis(10)) {
                match event::read() {
                    Ok(ev) => {
                        if event_tx.send(UiEvent::Crossterm(ev)).is_err() {
                            break;
                        }
                    }
                    Err(_) => continue,
                }
            } else {
                tokio::task::yield_now().await;
            }
        }
    })
}

pub async fn run_chat(settings: SessionSettings) -> Result<(), Box<dyn Error>> {
    info!(model = %settings.model, base_url = %settings.base_url, "starting chat session");

    let (service, mut stream_rx) = ChatStreamService::new();
    let mut app = ChatApp::new(settings, Box::new(service));

    let mut terminal = setup_terminal()?;
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let reader = spawn_event_reader(event_tx);

    let result = drive(&mut terminal, &mut app, &mut event_rx, &mut stream_rx).await;

    reader.abort();
    restore_terminal(&mut terminal)?;
    info!(turns = app.store().len(), "chat session ended");
    result
}

async fn drive(
    terminal: &mut ChatTerminal,
    app: &mut ChatApp,
    event_rx: &mut mpsc::UnboundedReceiver<UiEvent>,
    stream_rx: &mut StreamReceiver,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        tokio::select! {
            event = event_rx.recv() => match event {
                Some(UiEvent::Crossterm(ev)) => handle_terminal_event(app, ev),
                None => {
                    debug!("terminal event reader stopped");
                    return Ok(());
                }
            },
            Some((message, stream_id)) = stream_rx.recv() => {
                app.handle_stream_message(message, stream_id);
            }
        }

        while let Ok(UiEvent::Crossterm(ev)) = event_rx.try_recv() {
            handle_terminal_event(app, ev);
        }
        while let Ok((message, stream_id)) = stream_rx.try_recv() {
            app.handle_stream_message(message, stream_id);
        }

        if app.should_quit() {
            return Ok(());
        }
    }
}

fn handle_terminal_event(app: &mut ChatApp, ev: Event) {
    match ev {
        Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(app, key),
        Event::Paste(text) => {
            app.input.insert_str(text.replace("\r\n", "\n").replace('\r', "\n"));
        }
        _ => {}
    }
}

pub fn handle_key(app: &mut ChatApp, key: KeyEvent) {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.quit(),
        KeyCode::Esc => {
            if app.is_streaming() {
                app.interrupt();
            } else {
                app.clear_notice();
            }
        }
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => {
            app.input.insert_newline();
        }
        KeyCode::Enter => {
            if app.is_streaming() {
                app.set_notice(
                    NoticeKind::Warning,
                    "Still answering; press Esc to interrupt first.",
                );
                return;
            }
            let text = app.take_input();
            app.submit(&text);
        }
        KeyCode::PageUp => scroll_by(app, -PAGE_SCROLL),
        KeyCode::PageDown => scroll_by(app, PAGE_SCROLL),
        _ => {
            app.input.input(TAInput::from(key));
        }
    }
}
