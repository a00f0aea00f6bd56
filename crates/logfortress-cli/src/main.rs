use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use logfortress_core::{Config, StreamLine, StreamMode};
use logfortress_manager::LogSourceManager;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod table;

#[derive(Parser, Debug)]
#[command(name = "logfortress")]
#[command(author, version, about = "Manage and follow Docker container logs")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Override the configuration directory
    #[arg(long)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List running containers (use -a to include custom sources)
    List {
        /// Include custom log sources
        #[arg(short, long)]
        all: bool,
    },
    /// Register a custom log source
    #[command(name = "register-custom", alias = "register_custom")]
    RegisterCustom {
        /// Name of the Docker container
        container_name: String,
        /// Path to the log file inside the container
        log_file_path: String,
    },
    /// Follow the logs of a container
    Access {
        /// The container ID or name
        container_id_or_name: String,
    },
    /// Follow the custom log source of a container
    #[command(name = "access-custom", alias = "access_custom")]
    AccessCustom {
        /// The container name
        container_name: String,
    },
    /// List Docker networks and their containers
    Networks,
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::new(filter))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = match cli.config_dir {
        Some(dir) => Config::load_from(dir)?,
        None => Config::load()?,
    };
    let mut manager = LogSourceManager::connect(config).await?;

    match cli.command {
        Commands::List { all: false } => {
            println!("Log sources (running containers):");
            table::print_running(&manager.list_running().await?);
        }
        Commands::List { all: true } => {
            let reconciled = manager.list_reconciled().await?;
            println!("Log sources");
            table::print_running(&reconciled.running);
            println!();
            if reconciled.custom.is_empty() {
                println!("No custom log sources registered.");
            } else {
                println!("Custom log sources");
                table::print_custom(&reconciled.custom);
            }
        }
        Commands::RegisterCustom {
            container_name,
            log_file_path,
        } => {
            manager.register(&container_name, &log_file_path).await?;
            println!(
                "Registered custom log source for container '{container_name}' at path '{log_file_path}'"
            );
        }
        Commands::Access {
            container_id_or_name,
        } => {
            println!("Streaming logs for container: {container_id_or_name}");
            follow(&manager, &container_id_or_name, StreamMode::Native).await?;
        }
        Commands::AccessCustom { container_name } => {
            if let Some(path) = manager.custom_source(&container_name) {
                println!("Streaming custom logs for container: {container_name} from file: {path}");
            }
            follow(&manager, &container_name, StreamMode::CustomFile).await?;
        }
        Commands::Networks => {
            table::print_networks(&manager.list_networks().await?);
        }
    }

    Ok(())
}

/// Print lines until the stream ends or Ctrl-C is pressed.
async fn follow(manager: &LogSourceManager, container: &str, mode: StreamMode) -> Result<()> {
    let mut stream = manager.open_stream(container, mode).await?;

    loop {
        tokio::select! {
            line = stream.next_line() => match line {
                Some(StreamLine::Output(text)) => println!("{text}"),
                Some(StreamLine::Notice(text)) => eprintln!("{text}"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, closing stream");
                break;
            }
        }
    }

    stream.close();
    Ok(())
}
