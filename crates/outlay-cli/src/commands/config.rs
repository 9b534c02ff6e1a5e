//! Config command - View and manage Outlay configuration
//!
//! Provides the `outlay config` CLI command which:
//! 1. Shows the current configuration (YAML or JSON)
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use outlay_core::config::Config;

use crate::context::GlobalArgs;
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Keys accepted by `config set`, with a short description
const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("storage.database", "SQLite database file"),
    ("sync.interval_secs", "Seconds between periodic syncs"),
    ("sync.gateway_timeout_secs", "Seconds before a batch submit is abandoned"),
    ("sync.backoff_base_secs", "First retry delay after a failure"),
    ("sync.backoff_max_secs", "Upper bound on the retry delay"),
    ("sync.sync_on_reconnect", "true|false"),
    ("connectivity.probe_host", "Host probed for reachability"),
    ("connectivity.probe_port", "TCP port probed"),
    ("connectivity.probe_interval_secs", "Seconds between probes"),
    ("connectivity.probe_timeout_ms", "Probe connect timeout"),
    ("remote.drop_dir", "Directory that receives synced documents"),
    ("logging.level", "trace|debug|info|warn|error"),
];

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "sync.interval_secs")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, global: &GlobalArgs, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format, global.quiet);
        let config_path = global.config_path();

        match self {
            ConfigCommand::Show => execute_show(&config_path, format, &*formatter),
            ConfigCommand::Set { key, value } => {
                execute_set(&config_path, key, value, format, &*formatter)
            }
            ConfigCommand::Validate => execute_validate(&config_path, format, &*formatter),
        }
    }
}

/// Show current configuration
fn execute_show(
    config_path: &Path,
    format: OutputFormat,
    formatter: &dyn OutputFormatter,
) -> Result<()> {
    let config = Config::load_or_default(config_path);

    info!(config_path = %config_path.display(), "Showing configuration");

    if matches!(format, OutputFormat::Json) {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", config_path.display()));
        formatter.info("");

        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;

        for line in yaml.lines() {
            formatter.info(line);
        }
    }

    Ok(())
}

/// Set a configuration value using dot-notation
fn execute_set(
    config_path: &Path,
    key: &str,
    value: &str,
    format: OutputFormat,
    formatter: &dyn OutputFormatter,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path);

    info!(key = %key, value = %value, "Setting configuration value");

    if let Err(e) = apply_config_value(&mut config, key, value) {
        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "value": value,
                "error": e.to_string(),
            }));
        } else {
            formatter.error(&format!("Failed to set '{}': {:#}", key, e));
            formatter.info("");
            formatter.info("Supported keys:");
            for (name, description) in SUPPORTED_KEYS {
                formatter.info(&format!("  {:<36} - {}", name, description));
            }
        }
        return Ok(());
    }

    // Validate the new config before saving
    let errors = config.validate();
    if !errors.is_empty() {
        let error_msgs: Vec<String> = errors.iter().map(ToString::to_string).collect();
        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "value": value,
                "errors": error_msgs,
            }));
        } else {
            formatter.error(&format!(
                "Invalid value for '{}': {}",
                key,
                error_msgs.join("; ")
            ));
        }
        return Ok(());
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
    }

    let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
    std::fs::write(config_path, &yaml).context("Failed to write configuration file")?;

    if matches!(format, OutputFormat::Json) {
        formatter.print_json(&serde_json::json!({
            "success": true,
            "key": key,
            "value": value,
            "config_path": config_path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Set {} = {}", key, value));
        formatter.info(&format!("Saved to {}", config_path.display()));
    }

    Ok(())
}

/// Validate configuration file
fn execute_validate(
    config_path: &Path,
    format: OutputFormat,
    formatter: &dyn OutputFormatter,
) -> Result<()> {
    // Load explicitly so parse errors are reported instead of defaulted
    let config = match Config::load(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            if !config_path.exists() {
                if matches!(format, OutputFormat::Json) {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": config_path.display().to_string(),
                        "errors": ["Configuration file not found. Using defaults."],
                    }));
                } else {
                    formatter.info(&format!(
                        "Configuration file not found at {}",
                        config_path.display()
                    ));
                    formatter.info(
                        "Using default configuration. Run 'outlay config set <key> <value>' to create one.",
                    );
                }
                return Ok(());
            }

            if matches!(format, OutputFormat::Json) {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": [format!("Failed to parse configuration: {:#}", e)],
                }));
            } else {
                formatter.error(&format!("Failed to parse configuration: {:#}", e));
                formatter.info(&format!("File: {}", config_path.display()));
            }
            return Ok(());
        }
    };

    info!(config_path = %config_path.display(), "Validating configuration");

    let errors = config.validate();

    if matches!(format, OutputFormat::Json) {
        let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": error_strings,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", config_path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        formatter.info(&format!("File: {}", config_path.display()));
        formatter.info("");
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    Ok(())
}

fn parse_u64(key: &str, value: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .with_context(|| format!("Expected a non-negative integer for {}", key))
}

/// Apply a dot-notation key/value pair to a Config struct
///
/// See [`SUPPORTED_KEYS`] for the accepted keys.
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- storage ---
        "storage.database" => {
            config.storage.database = PathBuf::from(value);
        }

        // --- sync ---
        "sync.interval_secs" => {
            config.sync.interval_secs = parse_u64(key, value)?;
        }
        "sync.gateway_timeout_secs" => {
            config.sync.gateway_timeout_secs = parse_u64(key, value)?;
        }
        "sync.backoff_base_secs" => {
            config.sync.backoff_base_secs = parse_u64(key, value)?;
        }
        "sync.backoff_max_secs" => {
            config.sync.backoff_max_secs = parse_u64(key, value)?;
        }
        "sync.sync_on_reconnect" => {
            config.sync.sync_on_reconnect = value
                .parse::<bool>()
                .context("Expected true or false for sync.sync_on_reconnect")?;
        }

        // --- connectivity ---
        "connectivity.probe_host" => {
            config.connectivity.probe_host = value.to_string();
        }
        "connectivity.probe_port" => {
            config.connectivity.probe_port = value
                .parse::<u16>()
                .context("Expected a port number for connectivity.probe_port")?;
        }
        "connectivity.probe_interval_secs" => {
            config.connectivity.probe_interval_secs = parse_u64(key, value)?;
        }
        "connectivity.probe_timeout_ms" => {
            config.connectivity.probe_timeout_ms = parse_u64(key, value)?;
        }

        // --- remote ---
        "remote.drop_dir" => {
            config.remote.drop_dir = PathBuf::from(value);
        }

        // --- logging ---
        "logging.level" => {
            config.logging.level = value.to_string();
        }

        _ => {
            anyhow::bail!("Unknown configuration key: '{}'", key);
        }
    }

    Ok(())
}
