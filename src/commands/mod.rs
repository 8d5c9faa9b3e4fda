mod registry;

pub use registry::{all_commands, Command, CommandInvocation};

use std::path::Path;

use crate::core::models::MODEL_CHOICES;
use crate::ui::app::{ChatApp, NoticeKind};

#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    Continue,
    ProcessAsMessage(String),
    Quit,
}

/// Route slash commands to their handlers; anything else is a message.
pub fn process_input(app: &mut ChatApp, input: &str) -> CommandResult {
    let trimmed = input.trim();

    let Some(rest) = trimmed.strip_prefix('/') else {
        return CommandResult::ProcessAsMessage(input.to_string());
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command_name = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return CommandResult::ProcessAsMessage(input.to_string()),
    };
    let args = parts.next().unwrap_or("").trim();

    match registry::find_command(command_name) {
        Some(command) => (command.handler)(app, CommandInvocation { args }),
        None => CommandResult::ProcessAsMessage(input.to_string()),
    }
}

pub fn help_text() -> String {
    let mut help = String::from("Commands:\n");
    for command in all_commands() {
        help.push_str(&format!("  {:<16} {}\n", command.usage, command.help));
    }
    help.push_str(
        "Keys: Enter send • Alt+Enter newline • Esc interrupt • PgUp/PgDn scroll • Ctrl+C quit",
    );
    help
}

pub(super) fn handle_help(app: &mut ChatApp, _invocation: CommandInvocation<'_>) -> CommandResult {
    app.set_notice(NoticeKind::Info, help_text());
    CommandResult::Continue
}

pub(super) fn handle_attach(app: &mut ChatApp, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        app.set_notice(NoticeKind::Warning, "Usage: /attach <path>");
        return CommandResult::Continue;
    }
    let path = invocation.args.trim_matches(|c| c == '"' || c == '\'');
    app.attach_file(Path::new(path));
    CommandResult::Continue
}

pub(super) fn handle_clear(app: &mut ChatApp, _invocation: CommandInvocation<'_>) -> CommandResult {
    app.clear_history();
    CommandResult::Continue
}

pub(super) fn handle_model(app: &mut ChatApp, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        let current = app.settings().model.clone();
        let listing = MODEL_CHOICES
            .iter()
            .map(|model| {
                if *model == current {
                    format!("• {model} (current)")
                } else {
                    format!("  {model}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        app.set_notice(NoticeKind::Info, format!("Models:\n{listing}"));
    } else {
        app.select_model(invocation.args);
    }
    CommandResult::Continue
}

pub(super) fn handle_quit(_app: &mut ChatApp, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::Quit
}
