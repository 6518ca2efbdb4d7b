use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl From<LogLevel> for tracing_subscriber::filter::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing_subscriber::filter::LevelFilter::ERROR,
            LogLevel::Warn => tracing_subscriber::filter::LevelFilter::WARN,
            LogLevel::Info => tracing_subscriber::filter::LevelFilter::INFO,
            LogLevel::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
            LogLevel::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
        }
    }
}

/// Command line surface of the relay daemon.
#[derive(Parser, Debug)]
#[command(
    name = "relayd",
    version,
    about = "Relays /v1 chat, embeddings and responses traffic across Azure OpenAI backends"
)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "relayd.toml")]
    pub config: PathBuf,

    /// Logging verbosity level
    #[arg(long, default_value = "info")]
    pub log_level: LogLevel,

    /// Run as a background daemon
    #[arg(short = 'd', long)]
    pub daemon: bool,
}

/// Spawn the process as a background daemon when `enable` is true.
///
/// In tests or foreground runs pass `false` to skip daemonization.
pub fn maybe_daemonize(enable: bool) -> anyhow::Result<()> {
    if enable {
        daemonize::Daemonize::new()
            .start()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    Ok(())
}
