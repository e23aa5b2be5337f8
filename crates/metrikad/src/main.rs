//! metrikad — the Metrika daemon.
//!
//! One binary, two roles:
//! - `server` — stores metrics and serves the HTTP (and optionally gRPC) API
//! - `agent` — samples runtime and host metrics and pushes them to a server
//!
//! # Usage
//!
//! ```text
//! metrikad server -a 0.0.0.0:8080 -f /var/lib/metrika/metrics.json -i 60
//! metrikad agent -a metrics.internal:8080 -p 2 -r 10 -l 3 -k secret
//! ```
//!
//! Every flag has an environment fallback (`ADDRESS`, `STORE_INTERVAL`, ...).
//! Settings resolve as flags, then the `-c` config file, then defaults.

mod agent_mode;
mod server_mode;
mod signal;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use metrika_core::{AgentFileConfig, ServerFileConfig};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,metrika=debug,metrikad=debug";

#[derive(Parser)]
#[command(name = "metrikad", about = "Metrika metrics daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the metrics server.
    Server(ServerArgs),
    /// Run the sampling agent.
    Agent(AgentArgs),
}

#[derive(Args)]
struct ServerArgs {
    /// HTTP listen address (host:port).
    #[arg(short, long, env = "ADDRESS")]
    address: Option<String>,

    /// gRPC listen address; gRPC is off when unset.
    #[arg(long, env = "GRPC_ADDRESS")]
    grpc_address: Option<String>,

    /// Seconds between snapshot saves.
    #[arg(short = 'i', long, env = "STORE_INTERVAL")]
    store_interval: Option<u64>,

    /// Snapshot file for the in-memory store.
    #[arg(short = 'f', long, env = "FILE_STORAGE_PATH")]
    file_storage_path: Option<PathBuf>,

    /// Load the snapshot file at startup.
    #[arg(short, long, env = "RESTORE")]
    restore: Option<bool>,

    /// Path of the redb database file.
    #[arg(short, long, env = "DATABASE_DSN")]
    database_dsn: Option<String>,

    /// HMAC secret for batch signatures.
    #[arg(short, long, env = "KEY")]
    key: Option<String>,

    /// PEM private key for encrypted batches.
    #[arg(long, env = "CRYPTO_KEY")]
    crypto_key: Option<PathBuf>,

    /// JSON or TOML config file.
    #[arg(short, long, env = "CONFIG")]
    config: Option<PathBuf>,
}

impl ServerArgs {
    fn resolve(self) -> anyhow::Result<metrika_core::ServerConfig> {
        let flags = ServerFileConfig {
            address: self.address,
            grpc_address: self.grpc_address,
            store_interval: self.store_interval,
            store_file: self.file_storage_path,
            restore: self.restore,
            database_dsn: self.database_dsn,
            key: self.key,
            crypto_key: self.crypto_key,
        };
        let file = match &self.config {
            Some(path) => ServerFileConfig::from_file(path)?,
            None => ServerFileConfig::default(),
        };
        Ok(flags.merge(file).resolve())
    }
}

#[derive(Args)]
struct AgentArgs {
    /// Server HTTP address (host:port).
    #[arg(short, long, env = "ADDRESS")]
    address: Option<String>,

    /// Send batches over gRPC to this address instead of HTTP.
    #[arg(long, env = "GRPC_ADDRESS")]
    grpc_address: Option<String>,

    /// Seconds between batch reports.
    #[arg(short, long, env = "REPORT_INTERVAL")]
    report_interval: Option<u64>,

    /// Seconds between samples.
    #[arg(short, long, env = "POLL_INTERVAL")]
    poll_interval: Option<u64>,

    /// HMAC secret for batch signatures.
    #[arg(short, long, env = "KEY")]
    key: Option<String>,

    /// Number of concurrent delivery workers.
    #[arg(short = 'l', long, env = "RATE_LIMIT")]
    rate_limit: Option<u64>,

    /// PEM public key for encrypting batches.
    #[arg(long, env = "CRYPTO_KEY")]
    crypto_key: Option<PathBuf>,

    /// JSON or TOML config file.
    #[arg(short, long, env = "CONFIG")]
    config: Option<PathBuf>,
}

impl AgentArgs {
    fn resolve(self) -> anyhow::Result<metrika_core::AgentConfig> {
        let flags = AgentFileConfig {
            address: self.address,
            grpc_address: self.grpc_address,
            report_interval: self.report_interval,
            poll_interval: self.poll_interval,
            key: self.key,
            rate_limit: self.rate_limit,
            crypto_key: self.crypto_key,
        };
        let file = match &self.config {
            Some(path) => AgentFileConfig::from_file(path)?,
            None => AgentFileConfig::default(),
        };
        Ok(flags.merge(file).resolve())
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Server(args) => server_mode::run_server(args.resolve()?).await,
        Command::Agent(args) => agent_mode::run_agent(args.resolve()?).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn server_flags_override_file() {
        let cli = Cli::try_parse_from([
            "metrikad",
            "server",
            "-a",
            "127.0.0.1:9000",
            "-i",
            "0",
            "-f",
            "/tmp/metrics.json",
            "--restore",
            "false",
        ])
        .unwrap();
        let Command::Server(args) = cli.command else {
            panic!("expected server command");
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.address, "127.0.0.1:9000");
        assert_eq!(config.store_interval, Duration::from_secs(300));
        assert_eq!(config.store_file, Some(PathBuf::from("/tmp/metrics.json")));
        assert!(!config.restore);
    }

    #[test]
    fn agent_flags_parse() {
        let cli = Cli::try_parse_from([
            "metrikad",
            "--log-format",
            "json",
            "agent",
            "-p",
            "1",
            "-r",
            "5",
            "-l",
            "8",
            "-k",
            "s",
        ])
        .unwrap();
        assert!(matches!(cli.log_format, LogFormat::Json));
        let Command::Agent(args) = cli.command else {
            panic!("expected agent command");
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.report_interval, Duration::from_secs(5));
        assert_eq!(config.rate_limit, 8);
        assert_eq!(config.key.as_deref(), Some("s"));
    }
}
