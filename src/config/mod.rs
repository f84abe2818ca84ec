//! Configuration loading for the event webhook.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `EVENTS_`, producing a typed [`AppConfig`].

use std::{
    collections::BTreeMap,
    env,
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ENV_PREFIX: &str = "EVENTS_";

/// Application configuration derived from `EVENTS_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_port: Option<u16>,
    #[serde(default = "default_tls_cert_path")]
    pub tls_cert_path: PathBuf,
    #[serde(default = "default_tls_key_path")]
    pub tls_key_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_max_body_kb")]
    pub max_body_kb: usize,
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_access_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_secret_access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamo_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamo_table: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            bind_host: default_bind_host(),
            http_port: None,
            https_port: None,
            tls_cert_path: default_tls_cert_path(),
            tls_key_path: default_tls_key_path(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            max_body_kb: default_max_body_kb(),
            shutdown_grace_seconds: default_shutdown_grace_seconds(),
            aws_profile: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: None,
            dynamo_endpoint: None,
            dynamo_table: None,
        }
    }
}

impl AppConfig {
    /// Returns the configured bind host as an IP address.
    pub fn bind_ip(&self) -> Result<IpAddr, ConfigError> {
        self.bind_host
            .parse()
            .map_err(|source| ConfigError::InvalidBindHost {
                value: self.bind_host.clone(),
                source,
            })
    }

    /// Socket address of the plain HTTP listener, if enabled.
    pub fn http_addr(&self) -> Result<Option<SocketAddr>, ConfigError> {
        let ip = self.bind_ip()?;
        Ok(self.http_port.map(|port| SocketAddr::new(ip, port)))
    }

    /// Socket address of the HTTPS listener, if enabled.
    pub fn https_addr(&self) -> Result<Option<SocketAddr>, ConfigError> {
        let ip = self.bind_ip()?;
        Ok(self.https_port.map(|port| SocketAddr::new(ip, port)))
    }

    /// Name of the events table.
    pub fn table_name(&self) -> Result<&str, ConfigError> {
        self.dynamo_table
            .as_deref()
            .filter(|table| !table.is_empty())
            .ok_or(ConfigError::MissingTable)
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_kb.saturating_mul(1024)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.aws_access_key_id.is_some() {
            config.aws_access_key_id = Some("[REDACTED]".to_string());
        }
        if config.aws_secret_access_key.is_some() {
            config.aws_secret_access_key = Some("[REDACTED]".to_string());
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if required settings are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http_port.is_none() && self.https_port.is_none() {
            return Err(ConfigError::MissingListenPort);
        }

        self.bind_ip()?;

        if self.aws_access_key_id.is_none() {
            return Err(ConfigError::MissingAwsAccessKeyId);
        }
        if self.aws_secret_access_key.is_none() {
            return Err(ConfigError::MissingAwsSecretAccessKey);
        }
        if self.aws_region.is_none() {
            return Err(ConfigError::MissingAwsRegion);
        }

        self.table_name()?;

        if self.max_body_kb == 0 || self.max_body_kb.checked_mul(1024).is_none() {
            return Err(ConfigError::InvalidMaxBody {
                value: self.max_body_kb,
            });
        }

        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_tls_cert_path() -> PathBuf {
    PathBuf::from("localhost.crt")
}

fn default_tls_key_path() -> PathBuf {
    PathBuf::from("localhost.key")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_max_body_kb() -> usize {
    1024
}

fn default_shutdown_grace_seconds() -> u64 {
    10
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid bind host '{value}': {source}")]
    InvalidBindHost {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("invalid {key} '{value}': expected a port number")]
    InvalidPort { key: &'static str, value: String },
    #[error("invalid {key} '{value}': expected a non-negative integer")]
    InvalidNumber { key: &'static str, value: String },
    #[error("no listener configured; set EVENTS_HTTP_PORT or EVENTS_HTTPS_PORT")]
    MissingListenPort,
    #[error("AWS access key id is missing; set EVENTS_AWS_ACCESS_KEY_ID")]
    MissingAwsAccessKeyId,
    #[error("AWS secret access key is missing; set EVENTS_AWS_SECRET_ACCESS_KEY")]
    MissingAwsSecretAccessKey,
    #[error("AWS region is missing; set EVENTS_AWS_REGION")]
    MissingAwsRegion,
    #[error("DynamoDB table name is missing; set EVENTS_DYNAMO_TABLE")]
    MissingTable,
    #[error("max body size must be a positive KiB count that fits in bytes, got {value} KiB")]
    InvalidMaxBody { value: usize },
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
}

/// Loads configuration using layered `.env` files and `EVENTS_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads and validates configuration.
    ///
    /// Precedence, lowest first: `.env`, `.env.local`, `.env.{profile}`,
    /// `.env.{profile}.local`, then the process environment.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let mut take = |key: &str| {
            layered
                .remove(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let profile = take("PROFILE").unwrap_or(profile_hint);
        let bind_host = take("BIND_HOST").unwrap_or_else(default_bind_host);
        let http_port = take("HTTP_PORT")
            .map(|v| parse_port("EVENTS_HTTP_PORT", v))
            .transpose()?;
        let https_port = take("HTTPS_PORT")
            .map(|v| parse_port("EVENTS_HTTPS_PORT", v))
            .transpose()?;
        let tls_cert_path = take("TLS_CERT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_tls_cert_path);
        let tls_key_path = take("TLS_KEY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_tls_key_path);
        let log_level = take("LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format = take("LOG_FORMAT").unwrap_or_else(default_log_format);
        let max_body_kb = take("MAX_BODY_KB")
            .map(|v| parse_number("EVENTS_MAX_BODY_KB", v))
            .transpose()?
            .unwrap_or_else(default_max_body_kb);
        let shutdown_grace_seconds = take("SHUTDOWN_GRACE_SECONDS")
            .map(|v| parse_number("EVENTS_SHUTDOWN_GRACE_SECONDS", v))
            .transpose()?
            .unwrap_or_else(default_shutdown_grace_seconds);

        let config = AppConfig {
            profile,
            bind_host,
            http_port,
            https_port,
            tls_cert_path,
            tls_key_path,
            log_level,
            log_format,
            max_body_kb,
            shutdown_grace_seconds,
            aws_profile: take("AWS_PROFILE"),
            aws_access_key_id: take("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: take("AWS_SECRET_ACCESS_KEY"),
            aws_region: take("AWS_REGION"),
            dynamo_endpoint: take("DYNAMO_ENDPOINT"),
            dynamo_table: take("DYNAMO_TABLE"),
        };

        config.validate()?;
        Ok(config)
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var("EVENTS_PROFILE")
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_port(key: &'static str, value: String) -> Result<u16, ConfigError> {
    match value.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ConfigError::InvalidPort { key, value }),
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidNumber { key, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            http_port: Some(8080),
            aws_access_key_id: Some("AKIDEXAMPLE".to_string()),
            aws_secret_access_key: Some("secret".to_string()),
            aws_region: Some("us-east-1".to_string()),
            dynamo_table: Some("events".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn requires_at_least_one_port() {
        let config = AppConfig {
            http_port: None,
            https_port: None,
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingListenPort)
        ));

        let https_only = AppConfig {
            http_port: None,
            https_port: Some(8443),
            ..valid_config()
        };
        assert!(https_only.validate().is_ok());
    }

    #[test]
    fn requires_credentials_region_and_table() {
        let config = AppConfig {
            aws_access_key_id: None,
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingAwsAccessKeyId)
        ));

        let config = AppConfig {
            aws_secret_access_key: None,
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingAwsSecretAccessKey)
        ));

        let config = AppConfig {
            aws_region: None,
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingAwsRegion)
        ));

        let config = AppConfig {
            dynamo_table: Some(String::new()),
            ..valid_config()
        };
        assert!(matches!(config.validate(), Err(ConfigError::MissingTable)));
    }

    #[test]
    fn rejects_unknown_log_format_and_zero_body_limit() {
        let config = AppConfig {
            log_format: "xml".to_string(),
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLogFormat { .. })
        ));

        let config = AppConfig {
            max_body_kb: 0,
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMaxBody { value: 0 })
        ));
    }

    #[test]
    fn oversized_body_limit_is_rejected_without_overflow() {
        let config = AppConfig {
            max_body_kb: usize::MAX,
            ..valid_config()
        };

        assert_eq!(config.max_body_bytes(), usize::MAX);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMaxBody { value }) if value == usize::MAX
        ));

        let config = AppConfig {
            max_body_kb: usize::MAX / 1024,
            ..valid_config()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn listener_addresses_use_bind_host() {
        let config = AppConfig {
            bind_host: "127.0.0.1".to_string(),
            https_port: Some(8443),
            ..valid_config()
        };

        assert_eq!(
            config.http_addr().unwrap(),
            Some("127.0.0.1:8080".parse().unwrap())
        );
        assert_eq!(
            config.https_addr().unwrap(),
            Some("127.0.0.1:8443".parse().unwrap())
        );

        let ipv6 = AppConfig {
            bind_host: "::1".to_string(),
            ..valid_config()
        };
        assert_eq!(ipv6.http_addr().unwrap(), Some("[::1]:8080".parse().unwrap()));
    }

    #[test]
    fn invalid_bind_host_is_rejected() {
        let config = AppConfig {
            bind_host: "not-an-ip".to_string(),
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBindHost { .. })
        ));
    }

    #[test]
    fn redacted_json_hides_credentials() {
        let json = valid_config().redacted_json().unwrap();

        assert!(!json.contains("AKIDEXAMPLE"));
        assert!(!json.contains("\"secret\""));
        assert!(json.contains("[REDACTED]"));
        assert!(json.contains("events"));
    }

    #[test]
    fn port_parsing() {
        assert_eq!(parse_port("EVENTS_HTTP_PORT", "8080".to_string()).unwrap(), 8080);
        assert!(parse_port("EVENTS_HTTP_PORT", "0".to_string()).is_err());
        assert!(parse_port("EVENTS_HTTP_PORT", "70000".to_string()).is_err());
        assert!(parse_port("EVENTS_HTTP_PORT", "http".to_string()).is_err());
    }
}
