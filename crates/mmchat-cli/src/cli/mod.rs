//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use mmchat_core::config;

use crate::logging;

mod commands;

#[derive(Parser)]
#[command(name = "mmchat")]
#[command(version)]
#[command(about = "Multimodal chat assistant with web-grounded answers")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override the model from config
    #[arg(short, long, global = true)]
    model: Option<String>,
}

impl Cli {
    /// Everything but `config` reaches the store or the gateway.
    fn logs_to_file(&self) -> bool {
        !matches!(self.command, Some(Commands::Config { .. }))
    }
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Start an interactive chat (default)
    Chat,
    /// Sends one prompt to the current session and prints the reply
    Exec {
        /// The prompt to send
        #[arg(short, long)]
        prompt: String,

        /// Attach an image file to the prompt
        #[arg(short, long, value_name = "PATH")]
        image: Option<String>,

        /// Start a new session for this prompt
        #[arg(long)]
        new: bool,
    },
    /// Manage saved chat sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum SessionCommands {
    /// Lists saved sessions
    List,
    /// Shows a session transcript
    Show {
        /// The ID of the session to show
        #[arg(value_name = "SESSION_ID")]
        id: String,
    },
    /// Deletes a session
    Delete {
        /// The ID of the session to delete
        #[arg(value_name = "SESSION_ID")]
        id: String,
    },
    /// Creates an empty session and makes it the latest
    New,
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.logs_to_file());

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Cli { command, model } = cli;

    let load_config = || -> Result<config::Config> {
        let mut config = config::Config::load().context("load config")?;
        if let Some(model) = model.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            config.model = model.to_string();
        }
        Ok(config)
    };

    // default to chat mode
    let Some(command) = command else {
        return commands::chat::run(&load_config()?, false).await;
    };

    match command {
        Commands::Chat => commands::chat::run(&load_config()?, true).await,
        Commands::Exec { prompt, image, new } => {
            commands::exec::run(commands::exec::ExecRunOptions {
                prompt: &prompt,
                image: image.as_deref(),
                new_session: new,
                config: &load_config()?,
            })
            .await
        }

        Commands::Sessions { command } => match command {
            SessionCommands::List => commands::sessions::list(),
            SessionCommands::Show { id } => commands::sessions::show(&id),
            SessionCommands::Delete { id } => commands::sessions::delete(&id),
            SessionCommands::New => {
                commands::sessions::new_session();
                Ok(())
            }
        },

        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
