use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::workflows::assessment::OutcomePolicy;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the placement service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub assessment: AssessmentConfig,
    pub counters: CounterConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let defaults = AssessmentConfig::default();
        let duration_secs = numeric_var("ASSESSMENT_DURATION_SECS")?
            .unwrap_or(defaults.duration.as_secs());
        let max_warnings = numeric_var("ASSESSMENT_MAX_WARNINGS")?.unwrap_or(defaults.max_warnings);
        // The warning counter saturates at u8::MAX, so that budget could never block.
        if max_warnings == u8::MAX {
            return Err(ConfigError::InvalidNumber {
                key: "ASSESSMENT_MAX_WARNINGS",
            });
        }
        let closed_session_retention = numeric_var("ASSESSMENT_CLOSED_RETENTION")?
            .unwrap_or(defaults.closed_session_retention);
        let outcome_policy = match numeric_var::<u8>("ASSESSMENT_PASS_MARK")? {
            Some(minimum_percentage) if minimum_percentage <= 100 => {
                OutcomePolicy::PassMark { minimum_percentage }
            }
            Some(_) => {
                return Err(ConfigError::InvalidNumber {
                    key: "ASSESSMENT_PASS_MARK",
                })
            }
            None => OutcomePolicy::PendingReview,
        };

        let max_retries = numeric_var("COUNTER_MAX_RETRIES")?
            .unwrap_or(CounterConfig::default().max_retries);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            assessment: AssessmentConfig {
                duration: Duration::from_secs(duration_secs),
                max_warnings,
                outcome_policy,
                closed_session_retention,
                ..defaults
            },
            counters: CounterConfig { max_retries },
        })
    }
}

fn numeric_var<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(None),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Proctoring rules applied to every assessment session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentConfig {
    pub duration: Duration,
    pub tick: Duration,
    pub max_warnings: u8,
    pub outcome_policy: OutcomePolicy,
    /// Closed sessions kept for status lookups before the oldest are evicted.
    pub closed_session_retention: usize,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(30 * 60),
            tick: Duration::from_secs(1),
            max_warnings: 2,
            outcome_policy: OutcomePolicy::PendingReview,
            closed_session_retention: 1024,
        }
    }
}

/// Retry budget for the optimistic counter updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterConfig {
    pub max_retries: u32,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self { max_retries: 16 }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a valid non-negative number in range")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "ASSESSMENT_DURATION_SECS",
            "ASSESSMENT_MAX_WARNINGS",
            "ASSESSMENT_PASS_MARK",
            "ASSESSMENT_CLOSED_RETENTION",
            "COUNTER_MAX_RETRIES",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.assessment, AssessmentConfig::default());
        assert_eq!(config.counters.max_retries, 16);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn assessment_overrides_are_applied() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ASSESSMENT_DURATION_SECS", "600");
        env::set_var("ASSESSMENT_MAX_WARNINGS", "3");
        env::set_var("ASSESSMENT_PASS_MARK", "70");
        env::set_var("ASSESSMENT_CLOSED_RETENTION", "8");
        env::set_var("COUNTER_MAX_RETRIES", "4");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.assessment.closed_session_retention, 8);
        assert_eq!(config.assessment.duration, Duration::from_secs(600));
        assert_eq!(config.assessment.max_warnings, 3);
        assert_eq!(
            config.assessment.outcome_policy,
            OutcomePolicy::PassMark {
                minimum_percentage: 70
            }
        );
        assert_eq!(config.counters.max_retries, 4);
        reset_env();
    }

    #[test]
    fn rejects_out_of_range_pass_mark() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ASSESSMENT_PASS_MARK", "140");
        match AppConfig::load() {
            Err(ConfigError::InvalidNumber { key }) => assert_eq!(key, "ASSESSMENT_PASS_MARK"),
            other => panic!("expected invalid pass mark, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn rejects_warning_budget_that_can_never_block() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ASSESSMENT_MAX_WARNINGS", "255");
        match AppConfig::load() {
            Err(ConfigError::InvalidNumber { key }) => assert_eq!(key, "ASSESSMENT_MAX_WARNINGS"),
            other => panic!("expected invalid warning budget, got {other:?}"),
        }

        env::set_var("ASSESSMENT_MAX_WARNINGS", "254");
        let config = AppConfig::load().expect("254 warnings still block on the next loss");
        assert_eq!(config.assessment.max_warnings, 254);
        reset_env();
    }
}
