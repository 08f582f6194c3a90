pub mod commands;
pub mod config;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVER: &str = "http://localhost:3000";

#[derive(Parser)]
#[command(name = "desk")]
#[command(about = "Digital Desk CLI - account and brain dump access from the terminal")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, env = "DESK_SERVER", default_value = DEFAULT_SERVER, help = "Server base URL")]
    pub server: String,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create an account and log in")]
    Register {
        #[arg(help = "Username")]
        username: String,
        #[arg(long, env = "DESK_PASSWORD", help = "Password (read from stdin if not provided)")]
        password: Option<String>,
        #[arg(long, help = "Display name (defaults to the username)")]
        display_name: Option<String>,
    },

    #[command(about = "Log in to the server")]
    Login {
        #[arg(help = "Username")]
        username: String,
        #[arg(long, env = "DESK_PASSWORD", help = "Password (read from stdin if not provided)")]
        password: Option<String>,
    },

    #[command(about = "End the current session")]
    Logout,

    #[command(about = "Show the logged-in user")]
    Whoami,

    #[command(about = "Show server health and local session state")]
    Status,

    #[command(about = "Change your password")]
    Passwd {
        #[arg(long, help = "Current password (read from stdin if not provided)")]
        current: Option<String>,
        #[arg(long, help = "New password (read from stdin if not provided)")]
        new: Option<String>,
    },

    #[command(about = "Brain dump operations")]
    Dumps {
        #[command(subcommand)]
        cmd: commands::dumps::DumpCommands,
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

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let mut client = config::open_client(&cli.server)?;

    match cli.command {
        Commands::Register {
            username,
            password,
            display_name,
        } => commands::auth::register(&mut client, &username, password, display_name, &output_format).await,
        Commands::Login { username, password } => {
            commands::auth::login(&mut client, &username, password, &output_format).await
        }
        Commands::Logout => commands::auth::logout(&mut client, &output_format).await,
        Commands::Whoami => commands::auth::whoami(client, &output_format).await,
        Commands::Status => commands::auth::status(&mut client, &output_format).await,
        Commands::Passwd { current, new } => {
            commands::auth::passwd(&mut client, current, new, &output_format).await
        }
        Commands::Dumps { cmd } => commands::dumps::handle(cmd, &mut client, &output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["desk", "whoami", "--json", "--server", "http://desk.test"]).unwrap();
        assert!(matches!(cli.command, Commands::Whoami));
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));
        assert_eq!(cli.server, "http://desk.test");
    }

    #[test]
    fn parses_nested_dump_commands() {
        let cli = Cli::try_parse_from(["desk", "dumps", "add", "buy milk"]).unwrap();
        match cli.command {
            Commands::Dumps {
                cmd: commands::dumps::DumpCommands::Add { content },
            } => assert_eq!(content, "buy milk"),
            _ => panic!("expected dumps add"),
        }
    }
}
