//! CLI entry point for folio

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio_rs::{BuildOptions, Site};

#[derive(Parser)]
#[command(name = "folio")]
#[command(version)]
#[command(about = "Render a folder of front-matter documents into a static website", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the site into the output directory
    #[command(alias = "b")]
    Build {
        /// Also render units marked `published: false`
        #[arg(long)]
        drafts: bool,

        /// Remove the output directory before writing
        #[arg(long)]
        clean: bool,

        /// Write to this directory instead of the configured one
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove the output directory
    Clean,

    /// List site content
    List {
        /// Collection name, `tags` or `categories`
        #[arg(default_value = "posts")]
        r#type: String,
    },

    /// Display version information
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "folio_rs=debug,folio=debug,info"
    } else {
        "folio_rs=info,folio=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    // Determine base directory
    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to read the current directory")?,
    };

    match cli.command {
        Commands::Build {
            drafts,
            clean,
            output,
        } => {
            let mut site = Site::new(&base_dir)?;
            if let Some(output) = output {
                site.output_dir = if output.is_absolute() {
                    output
                } else {
                    base_dir.join(output)
                };
            }

            let report = site.build(&BuildOptions { drafts, clean })?;
            if !report.is_success() {
                return Ok(ExitCode::FAILURE);
            }
            println!("Built successfully!");
        }

        Commands::Clean => {
            let site = Site::new(&base_dir)?;
            tracing::info!("Cleaning output folder...");
            site.clean()?;
            println!("Cleaned successfully!");
        }

        Commands::List { r#type } => {
            let site = Site::new(&base_dir)?;
            folio_rs::commands::list::run(&site, &r#type)?;
        }

        Commands::Version => {
            println!("folio version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(ExitCode::SUCCESS)
}
