//! Fastpack CLI - a fast npm-compatible package installer.

use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;

use fp_io::ProjectLayout;

mod commands;
mod display;

#[derive(Parser)]
#[command(name = "fp")]
#[command(about = "Fastpack - a fast npm-compatible package installer")]
#[command(version)]
struct Cli {
    /// Project root directory
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Registry base URL
    #[arg(long, default_value = "https://registry.npmjs.org")]
    registry: String,

    /// Maximum number of concurrent install workers
    #[arg(long, default_value_t = fp_io::DEFAULT_CONCURRENCY)]
    concurrency: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a project manifest, lockfile, and working directories
    Init {
        /// Directory to initialize
        dir: PathBuf,

        /// Accept all defaults without prompting
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Install packages (all manifest dependencies when none are named)
    Install {
        /// Packages to install, as name or name@version
        packages: Vec<String>,
    },

    /// Run a script declared in the manifest
    Run {
        /// Script name
        script: String,
    },

    /// Run the start script
    Start,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<i32, fp_core::Error> {
    match cli.command {
        Commands::Init { dir, yes } => {
            commands::init::run(&dir, yes)?;
            Ok(0)
        }
        Commands::Install { packages } => {
            commands::install::run(
                ProjectLayout::new(&cli.dir),
                cli.registry,
                cli.concurrency,
                packages,
            )
            .await
        }
        Commands::Run { script } => commands::run::run(&cli.dir, &script),
        Commands::Start => commands::run::run(&cli.dir, "start"),
    }
}
