//! Studymate is a terminal study assistant that streams answers from
//! OpenAI-compatible chat completion APIs.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the conversation store, image encoding, math markup
//!   normalization, configuration, and the streaming completion orchestrator.
//! - [`ui`] renders the terminal interface and runs the interactive event loop.
//! - [`commands`] implements slash-command parsing and execution for the chat.
//! - [`api`] defines the chat completion wire payloads.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`], which resolves settings and dispatches into
//! [`ui::chat_loop`] for interactive sessions or [`cli::ask`] for one-shot
//! questions.

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod logging;
pub mod ui;
