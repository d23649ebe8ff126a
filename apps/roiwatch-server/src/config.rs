use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("invalid ROIWATCH_PORT: {0}")]
    InvalidPort(String),
    #[error("invalid ROIWATCH_BIND: {0}")]
    InvalidBind(String),
    #[error("invalid ROIWATCH_POLL_MS: {0} (expected a positive integer)")]
    InvalidPollMs(String),
    #[error("invalid ROIWATCH_BUS_CAPACITY: {0} (expected a positive integer)")]
    InvalidBusCapacity(String),
}

#[derive(Debug, Clone)]
pub(crate) struct ServerConfig {
    pub addr: SocketAddr,
    pub log_csv: PathBuf,
    pub poll: Duration,
    pub bus_capacity: usize,
}

fn positive(raw: String, err: fn(String) -> ConfigError) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(err(raw)),
    }
}

pub(crate) fn server_config_from_env() -> Result<ServerConfig, ConfigError> {
    let bind = std::env::var("ROIWATCH_BIND").unwrap_or_else(|_| "127.0.0.1".into());
    let port_raw = std::env::var("ROIWATCH_PORT").unwrap_or_else(|_| "8000".into());
    let port: u16 = port_raw
        .parse()
        .map_err(|_| ConfigError::InvalidPort(port_raw))?;
    let addr = format!("{}:{}", bind, port)
        .parse()
        .map_err(|_| ConfigError::InvalidBind(bind.clone()))?;

    let log_csv = std::env::var("ROIWATCH_LOG_CSV")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/detection_log.csv"));

    let poll_ms = std::env::var("ROIWATCH_POLL_MS")
        .ok()
        .map(|raw| positive(raw, ConfigError::InvalidPollMs))
        .transpose()?
        .unwrap_or(1000);

    let bus_capacity = std::env::var("ROIWATCH_BUS_CAPACITY")
        .ok()
        .map(|raw| positive(raw, ConfigError::InvalidBusCapacity))
        .transpose()?
        .unwrap_or(256) as usize;

    Ok(ServerConfig {
        addr,
        log_csv,
        poll: Duration::from_millis(poll_ms),
        bus_capacity,
    })
}
