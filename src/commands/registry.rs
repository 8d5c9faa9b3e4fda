use super::CommandResult;
use crate::ui::app::ChatApp;

pub type CommandHandler = fn(&mut ChatApp, CommandInvocation<'_>) -> CommandResult;

pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
    pub handler: CommandHandler,
}

#[derive(Clone, Copy)]
pub struct CommandInvocation<'a> {
    pub args: &'a str,
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands()
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        usage: "/help",
        help: "Show available commands and keys.",
        handler: super::handle_help,
    },
    Command {
        name: "attach",
        usage: "/attach <path>",
        help: "Add a PNG or JPEG image to the conversation.",
        handler: super::handle_attach,
    },
    Command {
        name: "clear",
        usage: "/clear",
        help: "Forget the whole conversation.",
        handler: super::handle_clear,
    },
    Command {
        name: "model",
        usage: "/model [name]",
        help: "Show the model list or switch models (a unique prefix is enough).",
        handler: super::handle_model,
    },
    Command {
        name: "quit",
        usage: "/quit",
        help: "Leave studymate.",
        handler: super::handle_quit,
    },
];
