use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::config::CliClient;
use crate::cli::utils::{output_empty_collection, output_success};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum DumpCommands {
    #[command(about = "List your brain dumps, newest first")]
    List,

    #[command(about = "Add a brain dump")]
    Add {
        #[arg(help = "Content")]
        content: String,
    },

    #[command(about = "Delete a brain dump")]
    Rm {
        #[arg(help = "Brain dump id")]
        id: Uuid,
    },
}

pub async fn handle(cmd: DumpCommands, client: &mut CliClient, output_format: &OutputFormat) -> anyhow::Result<()> {
    match cmd {
        DumpCommands::List => {
            let dumps = client.list_brain_dumps().await?;
            if dumps.is_empty() {
                return output_empty_collection(output_format, "brain_dumps", "No brain dumps yet");
            }

            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&json!({ "brain_dumps": dumps }))?);
                }
                OutputFormat::Text => {
                    for dump in &dumps {
                        println!("{}  {}  {}", dump.id, dump.created_at.format("%Y-%m-%d %H:%M"), dump.content);
                    }
                }
            }
            Ok(())
        }
        DumpCommands::Add { content } => {
            let dump = client.add_brain_dump(&content).await?;
            output_success(
                output_format,
                &format!("Added brain dump {}", dump.id),
                Some(json!({ "brain_dump": dump })),
            )
        }
        DumpCommands::Rm { id } => {
            client.delete_brain_dump(id).await?;
            output_success(output_format, &format!("Deleted brain dump {}", id), None)
        }
    }
}
