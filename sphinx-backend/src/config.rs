use std::{env, net::SocketAddr, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("{0} must be set")]
	Missing(&'static str),
	#[error("invalid value for {name}: {value:?} ({reason})")]
	Invalid { name: &'static str, value: String, reason: String },
}

/// Process configuration, read from the environment (and `.env`, loaded by `main`).
#[derive(Debug, Clone)]
pub struct Config {
	pub database_url: String,
	pub bind_addr: SocketAddr,
	pub api_version: String,
	pub max_connections: u32,
	/// `None` disables the per-query timeout.
	pub query_timeout: Option<Duration>,
}

impl Config {
	pub fn from_env() -> Result<Self, ConfigError> {
		let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
		let bind_addr = parse_or("SPHINX_BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 7800)))?;
		let api_version = env::var("SPHINX_API_VERSION").unwrap_or_else(|_| "v1".to_string());
		let max_connections = parse_or("SPHINX_MAX_CONNECTIONS", 5u32)?;
		let timeout_ms = parse_or("SPHINX_QUERY_TIMEOUT_MS", 5000u64)?;

		if api_version.is_empty() || api_version.contains('/') {
			return Err(ConfigError::Invalid {
				name: "SPHINX_API_VERSION",
				value: api_version,
				reason: "must be a single path segment".to_string(),
			});
		}
		if max_connections == 0 {
			return Err(ConfigError::Invalid {
				name: "SPHINX_MAX_CONNECTIONS",
				value: "0".to_string(),
				reason: "must be at least 1".to_string(),
			});
		}

		Ok(Self {
			database_url,
			bind_addr,
			api_version,
			max_connections,
			query_timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
		})
	}
}

fn parse_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
	T: std::str::FromStr,
	T::Err: std::fmt::Display,
{
	match env::var(name) {
		Ok(value) => {
			let parsed = value.trim().parse::<T>();
			parsed.map_err(|e| ConfigError::Invalid { name, value, reason: e.to_string() })
		}
		Err(_) => Ok(default),
	}
}
