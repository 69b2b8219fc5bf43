//! Thumbnailer CLI: operate on the configured storage directly.
//!
//! Reads the same environment as the API service (STORAGE_BACKEND,
//! STORAGE_CONNECTION_STRING, ...). Results are printed as JSON on stdout.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::sync::Arc;
use thumbnailer_cli::{commands, init_tracing};
use thumbnailer_core::{Config, Location, ThumbnailEntry, TriggerMode};
use thumbnailer_processing::MediaValidator;
use thumbnailer_storage::create_storage;
use thumbnailer_worker::{DerivativePipeline, PipelineConfig, TriggerQueueConfig};

#[derive(Parser)]
#[command(name = "thumbnailer", about = "Thumbnailer operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LocationArg {
    Source,
    Derived,
}

impl From<LocationArg> for Location {
    fn from(arg: LocationArg) -> Self {
        match arg {
            LocationArg::Source => Location::Source,
            LocationArg::Derived => Location::Derived,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Upload an image into the source location
    Upload {
        /// Path to the image
        file: std::path::PathBuf,
    },
    /// List thumbnails (or source objects)
    List {
        #[arg(long, value_enum, default_value = "derived")]
        location: LocationArg,
        /// Only keys starting with this prefix
        #[arg(long, default_value = "")]
        prefix: String,
    },
    /// Run the pipeline once for a source key
    Handle {
        /// Source object key
        source_key: String,
    },
    /// Regenerate thumbnails for every source object
    Reprocess {
        /// Only source keys starting with this prefix
        #[arg(long, default_value = "")]
        prefix: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    config.validate().context("Configuration validation failed")?;

    let storage = create_storage(&config.storage)
        .await
        .context("Failed to create storage backend")?;
    let pipeline = Arc::new(DerivativePipeline::new(
        storage.clone(),
        PipelineConfig::from(&config),
    ));

    match cli.command {
        Commands::Upload { file } => {
            let validator = MediaValidator::from_config(&config.upload);
            let result = commands::upload(&storage, &validator, &file).await?;
            print_json(&result)?;

            // Without platform eventing the CLI is the trigger.
            if config.trigger.mode == TriggerMode::InProcess {
                let outcome = commands::handle(&pipeline, &result.key).await?;
                print_json(&outcome)?;
            }
        }
        Commands::List { location, prefix } => {
            let location = Location::from(location);
            let objects = commands::list(&storage, location, &prefix).await?;
            match location {
                Location::Derived => {
                    let entries: Vec<ThumbnailEntry> =
                        objects.into_iter().map(ThumbnailEntry::from).collect();
                    print_json(&entries)?;
                }
                Location::Source => print_json(&objects)?,
            }
        }
        Commands::Handle { source_key } => {
            let outcome = commands::handle(&pipeline, &source_key).await?;
            print_json(&outcome)?;
        }
        Commands::Reprocess { prefix } => {
            let queue_config = TriggerQueueConfig::from(&config.trigger);
            let summary =
                commands::reprocess(storage.clone(), pipeline, queue_config, &prefix).await?;
            print_json(&summary)?;
        }
    }

    Ok(())
}
