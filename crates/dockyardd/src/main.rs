//! dockyardd — the Dockyard daemon.
//!
//! Single binary that assembles the Dockyard subsystems:
//! - Application record store (redb)
//! - Container runtime client (Docker, or in-memory for dry runs)
//! - Reconciler with per-application locking
//! - REST API
//!
//! # Usage
//!
//! ```text
//! dockyardd serve --config /etc/dockyard/dockyard.toml --port 8080
//! dockyardd fingerprint docker-compose.yml --name web
//! ```

mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use dockyard_core::config::RuntimeKind;

#[derive(Parser)]
#[command(name = "dockyardd", about = "Dockyard compose application daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum RuntimeArg {
    Docker,
    Memory,
}

impl From<RuntimeArg> for RuntimeKind {
    fn from(arg: RuntimeArg) -> Self {
        match arg {
            RuntimeArg::Docker => RuntimeKind::Docker,
            RuntimeArg::Memory => RuntimeKind::Memory,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run the API server.
    Serve {
        /// Path to dockyard.toml.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides the config file).
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for persistent state (overrides the config file).
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Container runtime backend (overrides the config file).
        #[arg(long, value_enum)]
        runtime: Option<RuntimeArg>,

        /// Keep application records in memory only.
        #[arg(long)]
        in_memory: bool,
    },

    /// Parse a compose file and print its fingerprints.
    Fingerprint {
        /// Compose file to read.
        file: PathBuf,

        /// Project name, when the file does not declare one.
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Serve {
            config,
            port,
            data_dir,
            runtime,
            in_memory,
        } => {
            let mut cfg = match config {
                Some(path) => dockyard_core::DaemonConfig::from_file(&path)?,
                None => dockyard_core::DaemonConfig::default(),
            };
            if let Some(port) = port {
                cfg.server.port = port;
            }
            if let Some(dir) = data_dir {
                cfg.store.data_dir = dir;
            }
            if let Some(kind) = runtime {
                cfg.runtime.kind = kind.into();
            }
            cfg.store.in_memory |= in_memory;
            serve::run(cfg).await
        }
        Command::Fingerprint { file, name } => print_fingerprints(&file, name.as_deref()),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,dockyardd=debug,dockyard=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn print_fingerprints(file: &std::path::Path, name: Option<&str>) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)?;
    let definition = dockyard_core::parse_definition(&raw, name)?;

    let services = definition
        .service_fingerprints()?
        .into_iter()
        .map(|(service, fp)| (service, serde_json::Value::String(fp.to_string())))
        .collect::<serde_json::Map<_, _>>();
    let out = serde_json::json!({
        "name": definition.name,
        "fingerprint": definition.fingerprint,
        "services": services,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
