//! Merges CLI flags with an optional `.ini` file into a single `Config`.
//! Precedence is CLI over file over built-in default: a field the CLI set
//! explicitly always wins; otherwise the `.ini` file's value is used if
//! present; otherwise the default applies.

use std::fmt;
use std::time::Duration;

use ini::Ini;

use crate::cli::Cli;

#[derive(Debug)]
pub enum ConfigError {
    InvalidFile(String),
    InvalidValue { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidFile(msg) => write!(f, "could not read config file: {msg}"),
            ConfigError::InvalidValue { key, value } => {
                write!(f, "invalid value {value:?} for {key}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

const DEFAULT_REPLICATION_FACTOR: usize = 3;
const DEFAULT_STABILIZE_INTERVAL_MS: u64 = 1000;

#[derive(Clone, Debug)]
pub struct Config {
    pub listen_address: String,
    pub bootstrap_address: Option<String>,
    pub replication_factor: usize,
    pub stabilize_interval: Duration,
    pub dev_mode: bool,
    pub snapshot_file: Option<String>,
    pub routing_timeout: Duration,
    pub ping_timeout: Duration,
    pub transfer_timeout: Duration,
}

impl Config {
    pub fn load(cli: Cli) -> Result<Config, ConfigError> {
        let mut file_replication_factor = None;
        let mut file_stabilize_interval_ms = None;

        if let Some(path) = &cli.config {
            let ini = Ini::load_from_file(path).map_err(|e| ConfigError::InvalidFile(e.to_string()))?;
            if let Some(section) = ini.section(Some("chord")) {
                if let Some(value) = section.get("replication") {
                    file_replication_factor = Some(
                        value
                            .parse::<usize>()
                            .map_err(|_| ConfigError::InvalidValue { key: "replication", value: value.to_string() })?,
                    );
                }
                if let Some(value) = section.get("stabilize_interval_ms") {
                    file_stabilize_interval_ms = Some(
                        value
                            .parse::<u64>()
                            .map_err(|_| ConfigError::InvalidValue { key: "stabilize_interval_ms", value: value.to_string() })?,
                    );
                }
            }
        }

        // CLI wins over file wins over default.
        let replication_factor = cli
            .replication
            .or(file_replication_factor)
            .unwrap_or(DEFAULT_REPLICATION_FACTOR);
        let stabilize_interval_ms = cli
            .stabilize_interval_ms
            .or(file_stabilize_interval_ms)
            .unwrap_or(DEFAULT_STABILIZE_INTERVAL_MS);

        if replication_factor < 1 {
            return Err(ConfigError::InvalidValue { key: "replication", value: replication_factor.to_string() });
        }

        Ok(Config {
            listen_address: cli.listen,
            bootstrap_address: cli.bootstrap,
            replication_factor,
            stabilize_interval: Duration::from_millis(stabilize_interval_ms),
            dev_mode: cli.dev_mode,
            snapshot_file: cli.snapshot_file,
            routing_timeout: Duration::from_secs(5),
            ping_timeout: Duration::from_secs(2),
            transfer_timeout: Duration::from_secs(10),
        })
    }

    #[cfg(test)]
    pub fn for_tests(listen_address: String) -> Config {
        Config {
            listen_address,
            bootstrap_address: None,
            replication_factor: 3,
            stabilize_interval: Duration::from_millis(1000),
            dev_mode: true,
            snapshot_file: None,
            routing_timeout: Duration::from_secs(5),
            ping_timeout: Duration::from_secs(2),
            transfer_timeout: Duration::from_secs(10),
        }
    }
}
