//! CLI command definitions and handlers.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use lansend_core::config::Config;

/// Load configuration with graceful fallback to defaults.
///
/// If the config file doesn't exist or can't be parsed, a warning is logged
/// and the defaults are used.
pub fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        tracing::warn!("Ignoring configuration file: {}", e);
        Config::default()
    })
}

pub mod config;
pub mod info;
pub mod scan;
pub mod send;
pub mod serve;

/// Lansend - LocalSend-compatible local network file transfer
#[derive(Parser)]
#[command(name = "lansend")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Announce this device and receive files
    Serve(ServeArgs),

    /// Send a file to a device
    Send(SendArgs),

    /// Listen for devices on the network
    Scan(ScanArgs),

    /// Query a device's info
    Info(InfoArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the serve command
#[derive(Parser)]
pub struct ServeArgs {
    /// HTTP port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Device alias announced to peers
    #[arg(short, long, env = "LANSEND_ALIAS")]
    pub alias: Option<String>,

    /// Directory received files are written to
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Announcement interval (e.g., 2s, 10s)
    #[arg(short, long)]
    pub interval: Option<String>,

    /// Receive only, do not announce periodically
    #[arg(long)]
    pub quiet_discovery: bool,
}

/// Arguments for the send command
#[derive(Parser)]
pub struct SendArgs {
    /// Address of the receiving device
    pub target: String,

    /// File to send
    pub file: PathBuf,

    /// Port of the receiving device
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Device alias presented to the receiver
    #[arg(short, long, env = "LANSEND_ALIAS")]
    pub alias: Option<String>,

    /// Connect over HTTPS (accepts self-signed certificates)
    #[arg(long)]
    pub https: bool,

    /// Attach a SHA-256 hash to the offer
    #[arg(long)]
    pub hash: bool,

    /// Output the result in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the scan command
#[derive(Parser)]
pub struct ScanArgs {
    /// Duration to scan (e.g., 5s, 10s)
    #[arg(short, long, default_value = "5s")]
    pub duration: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the info command
#[derive(Parser)]
pub struct InfoArgs {
    /// Address of the device
    pub target: String,

    /// Port of the device
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Connect over HTTPS (accepts self-signed certificates)
    #[arg(long)]
    pub https: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Parser)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,

        /// Value to set
        value: String,
    },

    /// Show all configuration
    Show,

    /// List all available configuration keys
    List,

    /// Show the configuration file path
    Path,

    /// Reset to defaults
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_send() {
        let cli = Cli::parse_from(["lansend", "send", "192.168.1.20", "report.txt", "--https"]);
        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.target, "192.168.1.20");
                assert_eq!(args.file, PathBuf::from("report.txt"));
                assert!(args.https);
                assert!(args.port.is_none());
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_parse_global_verbose() {
        let cli = Cli::parse_from(["lansend", "scan", "-v", "--duration", "3s"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Scan(ref a) if a.duration == "3s"));
    }
}
