// Configuration management for the privileged route service
// Supports CLI arguments, environment variables and a TOML config file

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

use crate::routes::Ipv4Network;
use crate::routes::authz::AuthorizationTable;
use crate::service::server::{DEFAULT_MAX_MESSAGE_BYTES, ServerOptions};

/// Locations tried, in order, when no config file is given
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["/etc/privroute/privroute.toml", "privroute.toml"];

/// Handles requests for route installations from unprivileged processes
#[derive(Parser, Debug, Clone)]
#[command(name = "privroute")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// IP address to listen on
    #[arg(short = 's', long = "ip", env = "PRIVROUTE_IP")]
    pub ip: Option<String>,

    /// TCP port to listen on
    #[arg(short, long, env = "PRIVROUTE_PORT")]
    pub port: Option<u16>,

    /// Path to configuration file
    #[arg(short, long, env = "PRIVROUTE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(short, long, env = "PRIVROUTE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Seconds to wait for `ip route replace` before giving up
    #[arg(long, env = "PRIVROUTE_INSTALL_TIMEOUT")]
    pub install_timeout: Option<u64>,

    /// Seconds a client connection may stay idle
    #[arg(long, env = "PRIVROUTE_REQUEST_TIMEOUT")]
    pub request_timeout: Option<u64>,
}

/// Configuration file structure (TOML format)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub installer: InstallerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// DN -> networks that DN may route
    #[serde(default)]
    pub authorization: BTreeMap<String, Vec<Ipv4Network>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallerConfig {
    /// The `ip` binary from iproute2
    #[serde(default = "default_ip_command")]
    pub ip_command: PathBuf,

    #[serde(default = "default_install_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    6001
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_message_bytes() -> usize {
    DEFAULT_MAX_MESSAGE_BYTES
}
fn default_ip_command() -> PathBuf {
    PathBuf::from("/usr/bin/ip")
}
fn default_install_timeout() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: default_bind_address(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

impl Default for InstallerConfig {
    fn default() -> Self {
        InstallerConfig {
            ip_command: default_ip_command(),
            timeout_seconds: default_install_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}

impl ConfigFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Merged configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub source: PathBuf,
    pub bind_address: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub max_message_bytes: usize,
    pub ip_command: PathBuf,
    pub install_timeout: Duration,
    pub log_level: Level,
    pub authorization: AuthorizationTable,
}

impl Config {
    /// Load configuration from all sources.
    /// Priority: CLI args / environment > config file > defaults
    ///
    /// A config file is mandatory: it is the only source of the
    /// authorization table.
    pub fn load() -> anyhow::Result<Self> {
        let cli_args = CliArgs::parse();

        let path = match &cli_args.config {
            Some(path) => path.clone(),
            None => DEFAULT_CONFIG_PATHS
                .into_iter()
                .map(PathBuf::from)
                .find(|path| path.exists())
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "No configuration file found (tried {}); pass one with --config",
                        DEFAULT_CONFIG_PATHS.join(", ")
                    )
                })?,
        };

        let config_file = ConfigFile::load(&path)?;
        Self::merge(cli_args, config_file, path)
    }

    /// Merge configuration (CLI args override config file)
    pub fn merge(cli_args: CliArgs, config_file: ConfigFile, source: PathBuf) -> anyhow::Result<Self> {
        let log_level = parse_log_level(
            cli_args
                .log_level
                .as_deref()
                .unwrap_or(&config_file.logging.level),
        )?;

        let request_timeout = cli_args
            .request_timeout
            .unwrap_or(config_file.server.request_timeout_seconds);
        let install_timeout = cli_args
            .install_timeout
            .unwrap_or(config_file.installer.timeout_seconds);
        if request_timeout == 0 || install_timeout == 0 {
            anyhow::bail!("Timeouts must be at least one second");
        }
        if config_file.server.max_message_bytes == 0 {
            anyhow::bail!("max_message_bytes must be positive");
        }

        Ok(Config {
            source,
            bind_address: cli_args.ip.unwrap_or(config_file.server.bind_address),
            port: cli_args.port.unwrap_or(config_file.server.port),
            request_timeout: Duration::from_secs(request_timeout),
            max_message_bytes: config_file.server.max_message_bytes,
            ip_command: config_file.installer.ip_command,
            install_timeout: Duration::from_secs(install_timeout),
            log_level,
            authorization: AuthorizationTable::new(config_file.authorization),
        })
    }

    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            request_timeout: self.request_timeout,
            max_message_bytes: self.max_message_bytes,
        }
    }
}

pub fn parse_log_level(level_str: &str) -> anyhow::Result<Level> {
    match level_str.to_lowercase().as_str() {
        "error" => Ok(Level::ERROR),
        "warn" => Ok(Level::WARN),
        "info" => Ok(Level::INFO),
        "debug" => Ok(Level::DEBUG),
        "trace" => Ok(Level::TRACE),
        _ => Err(anyhow::anyhow!("Invalid log level: {}", level_str)),
    }
}
