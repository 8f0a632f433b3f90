pub mod config;
pub mod pid;
pub mod send;

use clap::{Parser, Subcommand};

/// Chime — a personal reminder/notification scheduling daemon.
#[derive(Debug, Parser)]
#[command(name = "chimed", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the scheduling daemon (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Deliver a single notification immediately and print the outcome.
    Send {
        /// Notification title.
        title: String,
        /// Notification body.
        message: String,
        /// Destination (webhook URL, channel id, ...).
        #[arg(long)]
        destination: String,
        /// Priority: low, normal, or high.
        #[arg(long, default_value = "normal")]
        priority: String,
    },
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `CHIME_CONFIG` (or
/// `config.toml` by default).  Returns the parsed [`Config`] and the
/// path that was used.
///
/// Shared by `serve`, `send`, and `config` subcommands so the logic lives
/// in one place.
pub fn load_config() -> anyhow::Result<(chime_domain::config::Config, String)> {
    let config_path =
        std::env::var("CHIME_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        chime_domain::config::Config::default()
    };

    Ok((config, config_path))
}
