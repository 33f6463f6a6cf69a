//! Kiln CLI tool.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::ApiClient;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Kiln snapshot build CLI", long_about = None)]
struct Cli {
    /// API server URL
    #[arg(long, env = "KILN_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect tracked snapshots
    Snapshots {
        #[command(subcommand)]
        command: SnapshotCommands,
    },
    /// Reconcile a snapshot with its build job and artifact
    Refresh {
        /// Commit id, or `latest` for the head of the tracked branch
        target: String,
    },
    /// Start a build job for a commit unless one is running
    Rebuild {
        /// Commit id
        commit: String,
    },
    /// Hide a snapshot from listings
    Ignore {
        /// Commit id
        commit: String,
    },
    /// Pull recent commits from the source repository
    Sync,
    /// Validate a system configuration file
    Validate {
        /// Path to the configuration file
        #[arg(default_value = "kiln.kdl")]
        path: String,
    },
}

#[derive(Subcommand)]
enum SnapshotCommands {
    /// List snapshots, newest first
    List {
        /// Include ignored snapshots
        #[arg(long)]
        all: bool,
    },
    /// Show one snapshot
    Show {
        /// Commit id
        commit: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = ApiClient::new(&cli.api_url)?;

    match cli.command {
        Commands::Snapshots { command } => match command {
            SnapshotCommands::List { all } => commands::list(&client, all).await?,
            SnapshotCommands::Show { commit } => commands::show(&client, &commit).await?,
        },
        Commands::Refresh { target } => commands::act(&client, &target, "refresh").await?,
        Commands::Rebuild { commit } => commands::act(&client, &commit, "rebuild").await?,
        Commands::Ignore { commit } => commands::act(&client, &commit, "ignore").await?,
        Commands::Sync => commands::sync(&client).await?,
        Commands::Validate { path } => commands::validate(&path)?,
    }

    Ok(())
}
