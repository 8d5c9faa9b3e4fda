use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::core::conversation::ConversationStore;
use crate::core::encoder::ImageUpload;
use crate::core::markup::normalize_math;
use crate::core::message::{Content, ContentPart, Role, Turn};
use crate::ui::app::{ChatApp, NoticeKind};

const USER_PREFIX: &str = "You: ";
const MAX_INPUT_LINES: u16 = 6;
const MAX_NOTICE_LINES: u16 = 12;

pub fn ui(f: &mut Frame, app: &mut ChatApp) {
    let input_lines = (app.input.lines().len() as u16).clamp(1, MAX_INPUT_LINES);
    let notice_height = app
        .notice()
        .map(|notice| (notice.text.lines().count() as u16).clamp(1, MAX_NOTICE_LINES))
        .unwrap_or(0);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(notice_height),
            Constraint::Length(input_lines + 2),
        ])
        .split(f.area());

    let title = format!(
        "studymate v{} • {} • {} turns",
        env!("CARGO_PKG_VERSION"),
        app.settings().model,
        app.store().len()
    );
    f.render_widget(
        Paragraph::new(title).style(Style::default().add_modifier(Modifier::BOLD)),
        chunks[0],
    );

    let transcript = chunks[1];
    let paragraph = Paragraph::new(build_display_lines(app.store(), app.live_output()))
        .wrap(Wrap { trim: false });
    let max_offset =
        paragraph_rows(&paragraph, transcript.width).saturating_sub(transcript.height);
    if app.follow_output || app.scroll_offset >= max_offset {
        app.scroll_offset = max_offset;
        app.follow_output = true;
    }
    f.render_widget(paragraph.scroll((app.scroll_offset, 0)), transcript);

    if let Some(notice) = app.notice() {
        let color = match notice.kind {
            NoticeKind::Info => Color::Cyan,
            NoticeKind::Warning => Color::Yellow,
            NoticeKind::Error => Color::Red,
        };
        f.render_widget(
            Paragraph::new(notice.text.clone())
                .style(Style::default().fg(color))
                .wrap(Wrap { trim: false }),
            chunks[2],
        );
    }

    let input_title = if app.is_streaming() {
        "Answering… (Esc to interrupt, Ctrl+C to quit)"
    } else {
        "Type your question (Enter to send, Alt+Enter for new line, /help for commands)"
    };
    app.input
        .set_block(Block::default().borders(Borders::ALL).title(input_title));
    f.render_widget(&app.input, chunks[3]);
}

/// Scroll the transcript by `delta` rows; scrolling up stops following new output.
pub fn scroll_by(app: &mut ChatApp, delta: i32) {
    if delta < 0 {
        app.follow_output = false;
        app.scroll_offset = app.scroll_offset.saturating_sub(delta.unsigned_abs() as u16);
    } else {
        app.scroll_offset = app.scroll_offset.saturating_add(delta as u16);
    }
}

pub fn build_display_lines(store: &ConversationStore, live: Option<&str>) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    for turn in store.turns() {
        push_turn_lines(&mut lines, turn);
        lines.push(Line::from(""));
    }

    if let Some(live) = live {
        push_assistant_text(&mut lines, live);
    }

    lines
}

fn push_turn_lines(lines: &mut Vec<Line<'static>>, turn: &Turn) {
    match turn.role() {
        Role::User => {
            let user_style = Style::default().fg(Color::Cyan);
            let mut first = true;
            if let Some(image) = turn.display_image() {
                lines.push(prefixed_line(&mut first, image_label(image), user_style.fg(Color::Magenta)));
            }
            for segment in turn.content().text_segments() {
                for text_line in normalize_math(segment).lines() {
                    lines.push(prefixed_line(&mut first, text_line.to_string(), user_style));
                }
            }
            if let Content::Parts(parts) = turn.content() {
                let images = parts
                    .iter()
                    .filter(|part| matches!(part, ContentPart::Image(_)))
                    .count();
                if images > 0 && turn.display_image().is_none() {
                    lines.push(prefixed_line(
                        &mut first,
                        format!("[{images} image(s)]"),
                        user_style.fg(Color::Magenta),
                    ));
                }
            }
        }
        Role::Assistant => {
            for segment in turn.content().text_segments() {
                push_assistant_text(lines, &normalize_math(segment));
            }
            if let Some(stats) = turn.stats() {
                lines.push(Line::from(Span::styled(
                    stats.to_string(),
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::ITALIC),
                )));
            }
        }
        Role::System => {
            for segment in turn.content().text_segments() {
                for text_line in segment.lines() {
                    lines.push(Line::from(Span::styled(
                        text_line.to_string(),
                        Style::default().fg(Color::DarkGray),
                    )));
                }
            }
        }
    }
}

fn prefixed_line(first: &mut bool, text: String, style: Style) -> Line<'static> {
    let prefix = if *first {
        *first = false;
        Span::styled(USER_PREFIX, style.add_modifier(Modifier::BOLD))
    } else {
        Span::raw(" ".repeat(USER_PREFIX.len()))
    };
    Line::from(vec![prefix, Span::styled(text, style)])
}

fn push_assistant_text(lines: &mut Vec<Line<'static>>, text: &str) {
    for text_line in text.split('\n') {
        lines.push(Line::from(text_line.to_string()));
    }
}

fn image_label(image: &ImageUpload) -> String {
    format!("[image: {}, {}]", image.name(), human_size(image.bytes().len()))
}

fn human_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let bytes_f = bytes as f64;
    if bytes_f < KB {
        format!("{bytes} B")
    } else if bytes_f < KB * KB {
        format!("{:.1} KB", bytes_f / KB)
    } else {
        format!("{:.1} MB", bytes_f / (KB * KB))
    }
}

/// Rows the paragraph occupies at `width`, using the same word wrapping it
/// renders with.
fn paragraph_rows(paragraph: &Paragraph<'_>, width: u16) -> u16 {
    if width == 0 {
        return 0;
    }
    paragraph.line_count(width).min(u16::MAX as usize) as u16
}

/// Rows the lines occupy once word-wrapped to `width` columns.
pub fn wrapped_line_count(lines: &[Line<'static>], width: u16) -> u16 {
    paragraph_rows(
        &Paragraph::new(lines.to_vec()).wrap(Wrap { trim: false }),
        width,
    )
}
