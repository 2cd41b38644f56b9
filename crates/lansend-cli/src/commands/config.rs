//! Config command implementation.

use std::time::Duration;

use anyhow::{bail, Context, Result};

use lansend_core::config::Config;
use lansend_core::protocol::{DeviceType, ProtocolType};

use super::{ConfigAction, ConfigArgs};
use crate::ui::{format_duration, parse_duration};

/// Keys accepted by `config get` and `config set`.
const KEYS: &[(&str, &str)] = &[
    ("device.alias", "Name announced to other devices"),
    ("device.device_model", "Model string announced to other devices"),
    ("device.device_type", "mobile, desktop, web, headless or server"),
    ("network.port", "HTTP port of the receiver"),
    ("network.multicast_group", "IPv4 multicast group used for discovery"),
    ("network.multicast_port", "UDP port used for discovery"),
    ("network.announce_interval", "Time between periodic announcements"),
    ("network.reply_cooldown", "Minimum time between replies to one peer"),
    ("receiver.download_dir", "Directory received files are written to"),
    ("receiver.upload_timeout", "Maximum duration of a single upload"),
    ("receiver.session_ttl", "Idle session lifetime (0s disables expiry)"),
    ("sender.scheme", "http or https"),
    ("sender.connect_timeout", "Connect timeout for outgoing requests"),
    ("sender.request_timeout", "Timeout for control requests"),
    ("sender.hash_files", "Attach SHA-256 hashes to offers"),
];

/// Run the config command.
pub fn run(args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            match get_config_value(&config, &key) {
                Some(v) => println!("{}: {}", key, v),
                None => bail!("Unknown configuration key: {}", key),
            }
        }

        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            if !set_config_value(&mut config, &key, &value)? {
                bail!("Unknown configuration key: {}", key);
            }
            config.validate()?;
            config.save()?;
            println!("Set {} = {}", key, value);
        }

        ConfigAction::Show => {
            let config = Config::load()?;
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            println!();
            println!("Lansend Configuration");
            println!("{}", "─".repeat(50));
            println!();
            println!("{}", rendered.trim_end());
            println!();
        }

        ConfigAction::List => {
            for (key, description) in KEYS {
                println!("  {:28} {}", key, description);
            }
        }

        ConfigAction::Path => {
            println!("{}", Config::config_path().display());
        }

        ConfigAction::Reset => {
            Config::default().save()?;
            println!("Configuration reset to defaults.");
        }
    }

    Ok(())
}

fn get_config_value(config: &Config, key: &str) -> Option<String> {
    let value = match key {
        "device.alias" => config.device.alias.clone(),
        "device.device_model" => config.device.device_model.clone(),
        "device.device_type" => config.device.device_type.to_string(),
        "network.port" => config.network.port.to_string(),
        "network.multicast_group" => config.network.multicast_group.to_string(),
        "network.multicast_port" => config.network.multicast_port.to_string(),
        "network.announce_interval" => format_duration(config.network.announce_interval),
        "network.reply_cooldown" => format_duration(config.network.reply_cooldown),
        "receiver.download_dir" => config.receiver.download_dir.display().to_string(),
        "receiver.upload_timeout" => format_duration(config.receiver.upload_timeout),
        "receiver.session_ttl" => format_duration(config.receiver.session_ttl),
        "sender.scheme" => config.sender.scheme.to_string(),
        "sender.connect_timeout" => format_duration(config.sender.connect_timeout),
        "sender.request_timeout" => format_duration(config.sender.request_timeout),
        "sender.hash_files" => config.sender.hash_files.to_string(),
        _ => return None,
    };
    Some(value)
}

fn set_config_value(config: &mut Config, key: &str, value: &str) -> Result<bool> {
    match key {
        "device.alias" => config.device.alias = value.to_string(),
        "device.device_model" => config.device.device_model = value.to_string(),
        "device.device_type" => config.device.device_type = parse_device_type(value)?,
        "network.port" => config.network.port = value.parse()?,
        "network.multicast_group" => config.network.multicast_group = value.parse()?,
        "network.multicast_port" => config.network.multicast_port = value.parse()?,
        "network.announce_interval" => config.network.announce_interval = duration(value)?,
        "network.reply_cooldown" => config.network.reply_cooldown = duration(value)?,
        "receiver.download_dir" => config.receiver.download_dir = value.into(),
        "receiver.upload_timeout" => config.receiver.upload_timeout = duration(value)?,
        "receiver.session_ttl" => config.receiver.session_ttl = duration(value)?,
        "sender.scheme" => config.sender.scheme = parse_scheme(value)?,
        "sender.connect_timeout" => config.sender.connect_timeout = duration(value)?,
        "sender.request_timeout" => config.sender.request_timeout = duration(value)?,
        "sender.hash_files" => config.sender.hash_files = value.parse()?,
        _ => return Ok(false),
    }
    Ok(true)
}

fn duration(value: &str) -> Result<Duration> {
    parse_duration(value)
        .with_context(|| format!("Invalid duration: {} (use e.g. 5s, 2m, 1h)", value))
}

fn parse_device_type(value: &str) -> Result<DeviceType> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
        .with_context(|| format!("Unknown device type: {}", value))
}

fn parse_scheme(value: &str) -> Result<ProtocolType> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
        .with_context(|| format!("Unknown scheme: {}", value))
}
