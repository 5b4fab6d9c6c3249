/*!
# BSL Support CLI

Command-line access to the support status of 1C:Enterprise configuration objects.
*/

use anyhow::{bail, Context, Result};
use bsl_support::core::discover_support_files;
use bsl_support::{
    load_support_index, ConfigurationObjectId, EffectiveSupportStatus, IndexBuildError,
    SupportConfig, SupportError, SupportIndex, SupportVariant,
};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "bsl-support",
    version = env!("CARGO_PKG_VERSION"),
    author = "BSL Analyzer Team",
    about = "Support status of 1C:Enterprise (BSL) configuration objects"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Support settings file (TOML, YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Abort on the first object with broken support data
    #[arg(long, global = true)]
    strict: bool,

    /// Output format
    #[arg(short = 'f', long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the effective support status of objects
    Status {
        /// ParentConfigurations.bin or a directory containing it
        #[arg(long)]
        file: PathBuf,

        /// Object UUIDs
        #[arg(short, long = "object", required = true)]
        objects: Vec<String>,
    },

    /// Show the provider chain and status statistics
    Summary {
        /// ParentConfigurations.bin or a directory containing it
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("bsl_support={}", log_level))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => SupportConfig::load_from_file(path)?,
        None => SupportConfig::default(),
    };
    if cli.strict {
        config.strict = true;
    }

    match cli.command {
        Commands::Status { file, objects } => {
            let index = load_index(&file, &config)?;
            print_statuses(&index, &objects, cli.format)?;
        }
        Commands::Summary { file } => {
            let index = load_index(&file, &config)?;
            print_summary(&index, cli.format)?;
        }
    }

    Ok(())
}

fn load_index(path: &Path, config: &SupportConfig) -> Result<SupportIndex> {
    let file = if path.is_dir() {
        match discover_support_files(path).into_iter().next() {
            Some(file) => file,
            None => bail!("No ParentConfigurations.bin found under {}", path.display()),
        }
    } else {
        path.to_path_buf()
    };

    match load_support_index(&file, config) {
        Ok(index) => Ok(index),
        Err(SupportError::Build(IndexBuildError::Strict(failure))) => {
            eprintln!("{} {}", "error:".red().bold(), failure);
            std::process::exit(1);
        }
        Err(e) => Err(e)
            .with_context(|| format!("Failed to load support data from {}", file.display())),
    }
}

fn print_statuses(index: &SupportIndex, objects: &[String], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let statuses: Vec<serde_json::Value> = objects
                .iter()
                .map(|object| {
                    let id = ConfigurationObjectId::from(object.as_str());
                    serde_json::json!({
                        "object": object,
                        "status": index.status(&id),
                        "failure": index.failure(&id).map(|f| f.to_string()),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&statuses)?);
        }
        OutputFormat::Text => {
            for object in objects {
                let id = ConfigurationObjectId::from(object.as_str());
                let status = index.status(&id);
                println!("{}: {}", object.bold(), paint(&status));
                if let Some(failure) = index.failure(&id) {
                    println!("  {}", failure.to_string().dimmed());
                }
            }
        }
    }
    Ok(())
}

fn print_summary(index: &SupportIndex, format: OutputFormat) -> Result<()> {
    let stats = index.statistics();
    match format {
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "providers": index.chain().providers(),
                "statistics": stats,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Text => {
            println!("{}", "Support chain (nearest first):".bold());
            for (position, provider) in index.chain().providers().iter().enumerate() {
                println!(
                    "  {}. {} {} ({})",
                    position, provider.name, provider.version, provider.vendor
                );
            }
            println!("{}", "Objects:".bold());
            println!("  total:               {}", stats.total_objects);
            println!("  supported, editable: {}", stats.supported_editable);
            println!("  supported, locked:   {}", stats.supported_read_only);
            println!("  deleted:             {}", stats.deleted);
            println!("  not supported:       {}", stats.not_supported);
            println!("  unresolved:          {}", stats.unresolved);
        }
    }
    Ok(())
}

fn paint(status: &EffectiveSupportStatus) -> colored::ColoredString {
    let text = status.to_string();
    if status.is_unresolved() {
        return text.magenta();
    }
    match status.variant {
        SupportVariant::Deleted => text.red(),
        SupportVariant::Supported { editable: false } => text.yellow(),
        _ => text.green(),
    }
}
