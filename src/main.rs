//! cogbridge CLI: talk to a reasoning server through the symbolic memory bridge.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};

use cogbridge::config::BridgeConfig;
use cogbridge::connector::Connector;
use cogbridge::memory::{self, SymbolicMemory};
use cogbridge::notation;
use cogbridge::transport::FallbackQueue;

#[derive(Parser)]
#[command(name = "cogbridge", version, about = "Symbolic memory bridge to a reasoning server")]
struct Cli {
    /// TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Reasoning server host (overrides the config file).
    #[arg(long, global = true)]
    host: Option<String>,

    /// Reasoning server port (overrides the config file).
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Fallback staging directory (overrides the config file).
    #[arg(long, global = true)]
    staging_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the server answers.
    Ping,

    /// Send an expression and print the raw reply.
    Eval {
        expr: String,
        /// Reply deadline in milliseconds (defaults to the configured window).
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Store a payload into a memory space.
    Store { space: String, data: String },

    /// Query the server for the members of a space.
    Retrieve {
        space: String,
        #[arg(long, default_value = "*")]
        query: String,
    },

    /// Translate between client and server notation.
    Translate {
        #[arg(long, value_enum)]
        to: Direction,
        text: String,
    },

    /// Structural distance between two expressions.
    Distance { a: String, b: String },

    /// Inspect or replay the fallback queue.
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },

    /// Connect, then print cache statistics.
    Stats {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum QueueAction {
    /// List queued commands, oldest first.
    List,
    /// Send every queued command to the server.
    Replay,
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    Server,
    Client,
}

fn load_config(cli: &Cli) -> Result<BridgeConfig> {
    let mut config = BridgeConfig::load_or_default(cli.config.as_deref())?;
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(dir) = &cli.staging_dir {
        config.staging_dir = dir.clone();
    }
    Ok(config)
}

fn connected(config: BridgeConfig) -> Result<Arc<Connector>> {
    let connector = Arc::new(Connector::new(config));
    connector.connect()?;
    Ok(connector)
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Ping => {
            let endpoint = config.endpoint();
            let connector = connected(config)?;
            let reply = connector.evaluate("(ping)");
            if reply.is_empty() {
                println!("{endpoint}: connected, no reply within the response window");
            } else {
                println!("{endpoint}: {}", reply.trim_end());
            }
        }

        Commands::Eval { expr, timeout_ms } => {
            let connector = connected(config)?;
            let reply = match timeout_ms {
                Some(ms) => {
                    connector.evaluate_with_timeout(&expr, std::time::Duration::from_millis(ms))
                }
                None => connector.evaluate(&expr),
            };
            println!("{}", reply.trim_end());
        }

        Commands::Store { space, data } => {
            let connector = connected(config)?;
            let memory = SymbolicMemory::new(Arc::clone(&connector));
            memory.store(&space, &data)?;
            println!("stored into {space}");
            print!("{}", connector.stats());
        }

        Commands::Retrieve { space, query } => {
            let connector = connected(config)?;
            let memory = SymbolicMemory::new(connector);
            println!("{}", memory.retrieve(&space, &query).trim_end());
        }

        Commands::Translate { to, text } => {
            match to {
                Direction::Server => {
                    // Identifiers already in client text come back as glyphs.
                    for collision in notation::check_collisions(&text) {
                        eprintln!("warning: {collision}");
                    }
                    println!("{}", notation::to_server_notation(&text));
                }
                Direction::Client => println!("{}", notation::to_client_notation(&text)),
            }
        }

        Commands::Distance { a, b } => {
            println!("{:.4}", memory::distance(&a, &b));
        }

        Commands::Queue { action } => match action {
            QueueAction::List => {
                let queue = FallbackQueue::new(config.staging_dir.clone());
                let pending = queue.pending()?;
                if pending.is_empty() {
                    println!("queue at {} is empty", queue.dir().display());
                }
                for path in pending {
                    let command = queue.read(&path)?;
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    println!("{name}\t{command}");
                }
            }
            QueueAction::Replay => {
                let connector = connected(config)?;
                let replayed = connector.replay_fallback()?;
                let left = connector.fallback().len();
                println!("replayed {replayed} command(s), {left} left in queue");
            }
        },

        Commands::Stats { json } => {
            let connector = connected(config)?;
            let stats = connector.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats).into_diagnostic()?);
            } else {
                print!("{stats}");
            }
        }
    }

    Ok(())
}
