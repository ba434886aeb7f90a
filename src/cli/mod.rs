pub mod commands;
pub mod config;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::client::ApiClient;
use config::Session;

#[derive(Parser)]
#[command(name = "pixxor")]
#[command(about = "pixxor CLI - share photo albums from the command line")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, help = "API server URL (defaults to PIXXOR_SERVER or the saved session)")]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Authentication and account management")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "Albums and their members")]
    Albums {
        #[command(subcommand)]
        cmd: commands::albums::AlbumCommands,
    },

    #[command(about = "Uploads, images and effects")]
    Images {
        #[command(subcommand)]
        cmd: commands::images::ImageCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Everything a command needs: output mode, session and an API client
pub struct CliContext {
    pub output: OutputFormat,
    pub server: String,
    pub session: Session,
}

impl CliContext {
    pub fn client(&self) -> ApiClient {
        ApiClient::new(
            self.server.clone(),
            self.session.active_token().map(str::to_string),
        )
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output = OutputFormat::from_cli(&cli);
    let session = config::load_session()?;
    let server = config::resolve_server(cli.server.as_deref(), &session);
    let mut ctx = CliContext { output, server, session };

    match cli.command {
        Commands::Auth { cmd } => commands::auth::handle(cmd, &mut ctx).await,
        Commands::Albums { cmd } => commands::albums::handle(cmd, &ctx).await,
        Commands::Images { cmd } => commands::images::handle(cmd, &ctx).await,
    }
}
