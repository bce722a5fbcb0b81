use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;
use crate::error::{AppError, Result};

pub const DEFAULT_PORT: u16 = 5000;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub classifier_program: String,
    pub classifier_script: Option<PathBuf>,
    pub classifier_timeout: Duration,
    pub classifier_max_concurrency: usize,
    pub static_dir: PathBuf,
}

impl Config {
    /// Reads the process environment. `main` loads `.env` beforehand.
    pub fn load() -> Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let ip = IpAddr::from_str(&host).map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;
        let port = parse_port(env::var("PORT").ok().as_deref());

        let classifier_program = env::var("CLASSIFIER_PROGRAM").unwrap_or_else(|_| "python3".to_string());
        let classifier_script = match env::var("CLASSIFIER_SCRIPT") {
            Ok(script) if script.trim().is_empty() => None,
            Ok(script) => Some(PathBuf::from(script)),
            Err(_) => Some(PathBuf::from("python/predict.py")),
        };

        let timeout_secs = parse_positive("CLASSIFIER_TIMEOUT_SECS", env::var("CLASSIFIER_TIMEOUT_SECS").ok(), 30)?;
        let classifier_max_concurrency =
            parse_positive("CLASSIFIER_MAX_CONCURRENCY", env::var("CLASSIFIER_MAX_CONCURRENCY").ok(), 8)? as usize;

        let static_dir = PathBuf::from(env::var("STATIC_DIR").unwrap_or_else(|_| "public".to_string()));

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            classifier_program,
            classifier_script,
            classifier_timeout: Duration::from_secs(timeout_secs),
            classifier_max_concurrency,
            static_dir,
        })
    }
}

/// Unset or unparseable ports fall back to [`DEFAULT_PORT`].
fn parse_port(raw: Option<&str>) -> u16 {
    match raw {
        None => DEFAULT_PORT,
        Some(raw) => match raw.trim().parse::<u16>() {
            Ok(0) | Err(_) => {
                warn!(port = raw, "invalid PORT, using {}", DEFAULT_PORT);
                DEFAULT_PORT
            }
            Ok(port) => port,
        },
    }
}

fn parse_positive(name: &str, raw: Option<String>, default: u64) -> Result<u64> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(AppError::ConfigError(format!("{} must be greater than zero", name))),
        Ok(value) => Ok(value),
        Err(e) => Err(AppError::ConfigError(format!("Invalid {}: {}", name, e))),
    }
}
