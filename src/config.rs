//! Engine configuration
//!
//! Layered as built-in defaults, then `config/default.toml` and
//! `config/local.toml` when present, then `FEDCORE__*` environment variables.

use serde::Deserialize;
use std::{path::PathBuf, time::Duration};

use crate::error::AppError;

/// Root of the configuration tree
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub federation: FederationConfig,
    pub queue: QueueConfig,
    pub logging: LoggingConfig,
}

/// Listener and public identity of the node
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Authority that appears in every local actor URI, optionally with port
    pub domain: String,
    /// "https", or "http" for development hosts
    pub protocol: String,
}

impl ServerConfig {
    /// Prefix of every local URI, e.g. `https://node.example`
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file, created on first start
    pub path: PathBuf,
}

/// Federation behaviour: keys, outbound HTTP, delivery fan-out
#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    /// RSA modulus size for newly created actors
    pub key_bits: usize,
    /// User-Agent sent on every outbound request
    pub user_agent: String,
    /// Timeout for a single outbound request in seconds
    pub request_timeout_secs: u64,
    /// Maximum concurrent deliveries within one outbox job
    pub delivery_concurrency: usize,
    /// Deliver to `endpoints.sharedInbox` when a recipient advertises one
    pub prefer_shared_inbox: bool,
    /// Allow dereferencing loopback/private hosts (development only)
    pub allow_private_networks: bool,
    /// Age after which a cached profile document is rebuilt or re-fetched
    pub profile_ttl_secs: u64,
    /// TTL of verified public keys in the signature key cache
    pub key_cache_ttl_secs: u64,
}

impl FederationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Queue substrate settings
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Attempts before a job is dead-lettered
    pub max_attempts: u32,
    /// First retry delay in seconds (doubles each attempt)
    pub base_backoff_secs: u64,
    /// Upper bound for the retry delay in seconds
    pub max_backoff_secs: u64,
    /// Idle poll interval of the worker in milliseconds
    pub poll_interval_ms: u64,
    /// Jobs claimed per poll
    pub batch_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing level when `RUST_LOG` is unset
    pub level: String,
    /// "pretty" for terminals, "json" for log shippers
    pub format: String,
}

impl AppConfig {
    /// Build the layered configuration and validate it.
    ///
    /// # Errors
    /// `Config` when a source cannot be read or a value is out of range
    pub fn load() -> Result<Self, AppError> {
        use config::{Environment, File};

        let layered = config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.protocol", "http")?
            .set_default("server.domain", "localhost:8080")?
            .set_default("database.path", "data/fedcore.db")?
            .set_default("federation.key_bits", 2048)?
            .set_default("federation.user_agent", "fedcore/0.1.0")?
            .set_default("federation.request_timeout_secs", 10)?
            .set_default("federation.delivery_concurrency", 10)?
            .set_default("federation.prefer_shared_inbox", false)?
            .set_default("federation.allow_private_networks", false)?
            .set_default("federation.profile_ttl_secs", 86400)?
            .set_default("federation.key_cache_ttl_secs", 3600)?
            .set_default("queue.max_attempts", 8)?
            .set_default("queue.base_backoff_secs", 30)?
            .set_default("queue.max_backoff_secs", 21600)?
            .set_default("queue.poll_interval_ms", 2000)?
            .set_default("queue.batch_size", 32)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("FEDCORE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: Self = layered.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.federation.key_bits < 2048 {
            return Err(AppError::Config(
                "federation.key_bits must be at least 2048".to_string(),
            ));
        }

        if self.federation.delivery_concurrency == 0 {
            return Err(AppError::Config(
                "federation.delivery_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.queue.max_attempts == 0 {
            return Err(AppError::Config(
                "queue.max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.queue.base_backoff_secs > self.queue.max_backoff_secs {
            return Err(AppError::Config(
                "queue.base_backoff_secs must not exceed queue.max_backoff_secs".to_string(),
            ));
        }

        let is_https = self.server.protocol.eq_ignore_ascii_case("https");
        if !is_https && !self.server.protocol.eq_ignore_ascii_case("http") {
            return Err(AppError::Config(format!(
                "server.protocol must be http or https, got {}",
                self.server.protocol
            )));
        }

        if !is_https {
            if !is_development_host(&self.server.domain) {
                return Err(AppError::Config(format!(
                    "plain http is only allowed for loopback domains, not {}",
                    self.server.domain
                )));
            }
            tracing::warn!(
                domain = %self.server.domain,
                "Serving actor URIs over plain http for local development"
            );
        }

        Ok(())
    }
}

/// `localhost`, `*.localhost` or a loopback address, with or without port
fn is_development_host(domain: &str) -> bool {
    let Ok(url) = url::Url::parse(&format!("http://{}", domain.trim())) else {
        return false;
    };
    match url.host() {
        Some(url::Host::Domain(name)) => {
            let name = name.trim_end_matches('.');
            name == "localhost" || name.ends_with(".localhost")
        }
        Some(url::Host::Ipv4(ip)) => ip.is_loopback() || ip.is_unspecified(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback() || ip.is_unspecified(),
        None => false,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                domain: "localhost".to_string(),
                protocol: "http".to_string(),
            },
            database: DatabaseConfig {
                path: PathBuf::from("/tmp/fedcore-test.db"),
            },
            federation: FederationConfig {
                key_bits: 2048,
                user_agent: "fedcore-test".to_string(),
                request_timeout_secs: 5,
                delivery_concurrency: 4,
                prefer_shared_inbox: false,
                allow_private_networks: true,
                profile_ttl_secs: 86_400,
                key_cache_ttl_secs: 3_600,
            },
            queue: QueueConfig {
                max_attempts: 3,
                base_backoff_secs: 1,
                max_backoff_secs: 60,
                poll_interval_ms: 50,
                batch_size: 8,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn plain_http_is_allowed_on_loopback() {
        for domain in ["localhost", "localhost:8080", "node.localhost", "127.0.0.1:3000", "[::1]"] {
            let mut config = valid_config();
            config.server.domain = domain.to_string();
            assert!(config.validate().is_ok(), "{domain} should be accepted");
        }
    }

    #[test]
    fn plain_http_is_refused_for_public_domains() {
        let mut config = valid_config();
        config.server.domain = "node.example".to_string();

        assert!(matches!(
            config.validate(),
            Err(AppError::Config(message)) if message.contains("node.example")
        ));

        config.server.protocol = "https".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_weak_keys() {
        let mut config = valid_config();
        config.federation.key_bits = 1024;

        assert!(matches!(
            config.validate(),
            Err(AppError::Config(message)) if message.contains("key_bits")
        ));
    }

    #[test]
    fn validate_rejects_inverted_backoff_bounds() {
        let mut config = valid_config();
        config.queue.base_backoff_secs = 120;
        config.queue.max_backoff_secs = 60;

        assert!(config.validate().is_err());
    }

    #[test]
    fn base_url_joins_protocol_and_domain() {
        let config = valid_config();
        assert_eq!(config.server.base_url(), "http://localhost");
    }
}
