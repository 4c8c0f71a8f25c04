//! skysync CLI - Command-line interface for the sync engine
//!
//! Pushes record batches, live photos and plain files to a cloud store and
//! reconciles or translates what comes back.

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, FilesCommands, LivePhotoCommands, MetadataCommands};
use crate::commands::common::{load_settings, motion_transcoder};
use crate::commands::completions::run_completions;
use crate::commands::files::{
    run_files_check, run_files_delete, run_files_download, run_files_list, run_files_upload,
};
use crate::commands::live_photo::{
    run_live_photo_decode, run_live_photo_encode, run_live_photo_pull, run_live_photo_push,
};
use crate::commands::metadata::{run_metadata_show, run_metadata_translate};
use crate::commands::resolve::run_resolve;
use crate::commands::sync::run_sync;
use crate::error::CliError;

const DEFAULT_LOG_DIRECTIVE: &str = "skysync=info";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let settings = load_settings(cli.api_base_url, cli.metadata_dir)?;

    match cli.command {
        Commands::Sync {
            endpoint,
            method,
            input,
            json,
        } => {
            run_sync(settings, &endpoint, method.into(), input.as_deref(), json).await?;
        }
        Commands::LivePhoto { command } => match command {
            LivePhotoCommands::Push { still, video, json } => {
                run_live_photo_push(settings, &still, &video, json).await?;
            }
            LivePhotoCommands::Pull { id, out_dir } => {
                run_live_photo_pull(settings, &id, &out_dir).await?;
            }
            LivePhotoCommands::Encode {
                still,
                video,
                output,
            } => {
                run_live_photo_encode(&motion_transcoder(&settings), &still, &video, &output)
                    .await?;
            }
            LivePhotoCommands::Decode { input, out_dir } => {
                run_live_photo_decode(&motion_transcoder(&settings), &input, &out_dir).await?;
            }
        },
        Commands::Resolve {
            local,
            remote,
            strategy,
            output,
        } => run_resolve(&local, &remote, strategy.as_deref(), output.as_deref())?,
        Commands::Metadata { command } => match command {
            MetadataCommands::Show { id, remote } => {
                run_metadata_show(&settings, &id, remote).await?;
            }
            MetadataCommands::Translate { input, remote } => {
                run_metadata_translate(input.as_deref(), remote)?;
            }
        },
        Commands::Files { command } => match command {
            FilesCommands::Upload {
                path,
                key,
                namespace,
                content_type,
            } => {
                run_files_upload(&path, key.as_deref(), &namespace, content_type.as_deref())
                    .await?;
            }
            FilesCommands::Download { key, output } => {
                run_files_download(&key, output.as_deref()).await?;
            }
            FilesCommands::List { prefix, json } => run_files_list(&prefix, json).await?,
            FilesCommands::Delete { key } => run_files_delete(&key).await?,
            FilesCommands::Check => run_files_check().await?,
        },
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = DEFAULT_LOG_DIRECTIVE.parse::<Directive>() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
