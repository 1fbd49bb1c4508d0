use std::time::Duration;

use crate::dispatcher::DEFAULT_POLL_INTERVAL;

/// Errors raised while reading worker configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Postgres connection string.
    pub database_url: String,
    /// Sleep between polls that find no pending job.
    pub poll_interval: Duration,
    /// Connection pool size.
    pub max_connections: u32,
    /// Apply pending migrations at startup.
    pub run_migrations: bool,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default |
    /// |-----------------------------|---------|
    /// | `DATABASE_URL`              | required |
    /// | `WORKER_POLL_INTERVAL`      | `5` (seconds) |
    /// | `WORKER_DB_MAX_CONNECTIONS` | `10`    |
    /// | `WORKER_RUN_MIGRATIONS`     | `true`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let poll_secs: u64 = parse_or(
            &lookup,
            "WORKER_POLL_INTERVAL",
            DEFAULT_POLL_INTERVAL.as_secs(),
            "a positive number of seconds",
        )?;
        if poll_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "WORKER_POLL_INTERVAL",
                expected: "a positive number of seconds",
                value: "0".into(),
            });
        }

        let max_connections: u32 = parse_or(
            &lookup,
            "WORKER_DB_MAX_CONNECTIONS",
            ninja_db::DEFAULT_MAX_CONNECTIONS,
            "a positive integer",
        )?;
        if max_connections == 0 {
            return Err(ConfigError::Invalid {
                name: "WORKER_DB_MAX_CONNECTIONS",
                expected: "a positive integer",
                value: "0".into(),
            });
        }

        let run_migrations = match lookup("WORKER_RUN_MIGRATIONS") {
            None => true,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "WORKER_RUN_MIGRATIONS",
                        expected: "a boolean",
                        value: raw,
                    })
                }
            },
        };

        Ok(Self {
            database_url,
            poll_interval: Duration::from_secs(poll_secs),
            max_connections,
            run_migrations,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value: raw,
        }),
    }
}
