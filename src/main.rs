use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use diaglog_store::{DiagnosticCapture, Environment, LogStore};

mod config;
mod ingest;
mod viewer;

use config::{CliConfig, EnvConfig, FileConfig, Settings};

/// diaglog - bounded structured log store with diagnostic capture
#[derive(Parser, Debug)]
#[command(name = "diaglog")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Environment deciding the default mirrors (development or production)
    #[arg(long, value_name = "ENV", value_parser = parse_env_arg, global = true)]
    env: Option<Environment>,

    /// Maximum number of retained entries
    #[arg(long, value_name = "N", global = true)]
    max_logs: Option<usize>,

    /// Remote collection endpoint
    #[arg(long, value_name = "URL", global = true)]
    endpoint: Option<String>,

    /// Directory downloaded artifacts are written to
    #[arg(long, value_name = "DIR", global = true)]
    export_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Browse the log store in an interactive viewer
    View {
        /// Preload a downloaded logs-*.json artifact
        #[arg(long, value_name = "FILE")]
        import: Option<PathBuf>,

        /// Log lines read from stdin while the viewer runs
        #[arg(long)]
        stdin: bool,
    },

    /// Log stdin until EOF, then download the logs and print the artifact path
    Ingest,
}

fn parse_env_arg(s: &str) -> Result<Environment, String> {
    config::parse_environment(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing for debugging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

fn load_settings(args: &Args) -> Result<Settings> {
    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let env = EnvConfig::from_env()?;
    let cli = CliConfig {
        environment: args.env,
        max_logs: args.max_logs,
        remote_endpoint: args.endpoint.clone(),
        export_dir: args.export_dir.clone(),
    };
    Ok(Settings::resolve(file, env, cli))
}

async fn run(args: Args) -> Result<()> {
    let mut settings = load_settings(&args)?;

    if matches!(args.command, Command::View { .. }) {
        // Console output would tear through the alternate screen
        settings.store.console = Some(false);
    }

    let store = LogStore::new(settings.store);
    let capture =
        DiagnosticCapture::install(&store).context("Failed to install diagnostic capture")?;

    let result = match args.command {
        Command::View { import, stdin } => {
            let options = viewer::ViewOptions {
                import,
                stdin,
                export_dir: settings.export_dir,
            };
            viewer::run(&store, &capture, options).await
        }
        Command::Ingest => ingest::run(&store, settings.export_dir)
            .await
            .map(|path| println!("{}", path.display())),
    };

    store.shutdown().await;
    if let Some(stats) = store.remote_stats()
        && stats.failed > 0
    {
        tracing::warn!(
            sent = stats.sent,
            failed = stats.failed,
            "Some entries never reached the remote endpoint"
        );
    }

    result
}
