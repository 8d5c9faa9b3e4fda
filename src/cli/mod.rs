//! Command-line interface parsing and handling
//!
//! Parses arguments, resolves session settings from flags, environment and
//! the config file, then dispatches to the chat UI or a one-shot command.

pub mod ask;
pub mod model_list;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::cli::ask::run_ask;
use crate::cli::model_list::list_models;
use crate::core::config::{Config, SettingsOverrides};
use crate::core::session::SessionSettings;
use crate::logging::{init_tracing, LogTarget};
use crate::ui::chat_loop::run_chat;

#[derive(Parser, Debug)]
#[command(name = "studymate")]
#[command(version)]
#[command(about = "A terminal study assistant that streams answers from OpenAI-compatible APIs")]
#[command(
    long_about = "Studymate is a full-screen terminal tutor. Ask questions in any school \
subject, attach photos of homework, and read answers as they stream in with math shown \
in $...$ / $$...$$ form.\n\n\
Environment Variables:\n\
  OPENAI_API_KEY    API key used as a bearer token\n\
  OPENAI_BASE_URL   OpenAI-compatible base URL (defaults to https://api.openai.com/v1)\n\n\
Controls:\n\
  Enter             Send the message\n\
  Alt+Enter         Insert a new line\n\
  PageUp/PageDown   Scroll the conversation\n\
  Esc               Interrupt the answer being streamed\n\
  Ctrl+C            Quit\n\n\
Commands:\n\
  /attach <path>    Attach a PNG or JPEG image\n\
  /model [name]     Show or switch the model\n\
  /clear            Start a new conversation\n\
  /help             Show all commands"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// API key (overrides the config file)
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// OpenAI-compatible base URL (overrides the config file)
    #[arg(long, global = true, env = "OPENAI_BASE_URL")]
    pub base_url: Option<String>,

    /// Model to use; a unique prefix of one of the offered models is accepted
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Write diagnostic logs to the given file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start the chat interface (default)
    Chat,
    /// Ask a single question and print the answer
    Ask {
        /// Image to send before the question
        #[arg(short = 'i', long, value_name = "PATH")]
        image: Option<PathBuf>,
        /// The question
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        prompt: Vec<String>,
    },
    /// List the models that can be selected
    Models,
}

impl Args {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
        }
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let command = args.command.clone().unwrap_or(Commands::Chat);

    let log_target = match (&args.log, &command) {
        (Some(path), _) => Some((LogTarget::File(path), "info")),
        (None, Commands::Chat) => None,
        (None, _) => Some((LogTarget::Stderr, "warn")),
    };
    if let Some((target, level)) = log_target {
        init_tracing(target, level)?;
    }

    let settings = match resolve_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Error: {e}");
            std::process::exit(1);
        }
    };
    debug!(model = %settings.model, base_url = %settings.base_url, "settings resolved");

    match command {
        Commands::Chat => run_chat(settings).await,
        Commands::Ask { image, prompt } => {
            if let Err(e) = run_ask(settings, prompt, image.as_deref()).await {
                eprintln!("\n❌ Error: {e}");
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Models => {
            list_models(&settings.model)?;
            Ok(())
        }
    }
}

fn resolve_settings(args: &Args) -> Result<SessionSettings, Box<dyn Error>> {
    let config = Config::load()?;
    Ok(config.resolve_settings(args.overrides())?)
}
