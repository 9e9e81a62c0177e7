//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::mailer::MailProvider;

/// Portal configuration.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Port for the HTTP/WebSocket server.
    pub port: u16,
    /// Path to the libSQL database file.
    pub db_path: PathBuf,
    /// Root directory for stored documents.
    pub data_dir: PathBuf,
    /// Wall-clock interval between scheduled reminder sweeps.
    pub sweep_interval: Duration,
    /// Maximum reminders processed in one sweep.
    pub sweep_limit: usize,
    /// Minimum spacing between on-demand sweep triggers.
    pub trigger_min_spacing: Duration,
    /// Per-email send timeout. A hung send must not block the rest of a sweep.
    pub send_timeout: Duration,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            db_path: PathBuf::from("./data/portal.db"),
            data_dir: PathBuf::from("./data/files"),
            sweep_interval: Duration::from_secs(60),
            sweep_limit: 200,
            trigger_min_spacing: Duration::from_secs(25),
            send_timeout: Duration::from_secs(30),
        }
    }
}

impl PortalConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env_parse("PORTAL_PORT", defaults.port);
        let db_path = std::env::var("PORTAL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);
        let data_dir = std::env::var("PORTAL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        Self {
            port,
            db_path,
            data_dir,
            sweep_interval: Duration::from_secs(env_parse(
                "PORTAL_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval.as_secs(),
            )),
            sweep_limit: env_parse("PORTAL_SWEEP_LIMIT", defaults.sweep_limit),
            trigger_min_spacing: Duration::from_secs(env_parse(
                "PORTAL_TRIGGER_MIN_SPACING_SECS",
                defaults.trigger_min_spacing.as_secs(),
            )),
            send_timeout: Duration::from_secs(env_parse(
                "PORTAL_SEND_TIMEOUT_SECS",
                defaults.send_timeout.as_secs(),
            )),
        }
    }
}

/// SMTP settings for the outbound mailer.
///
/// Provider selection happens here, at configuration load — an unsupported
/// provider identifier fails construction, not the first send.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub provider: MailProvider,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

impl SmtpSettings {
    /// Build from environment variables.
    /// Returns `Ok(None)` if `PORTAL_SMTP_PROVIDER` is not set (mailer disabled).
    pub fn from_env() -> std::result::Result<Option<Self>, ConfigError> {
        let Ok(provider_str) = std::env::var("PORTAL_SMTP_PROVIDER") else {
            return Ok(None);
        };
        let provider: MailProvider = provider_str.parse()?;

        let username = std::env::var("PORTAL_SMTP_USERNAME")
            .map_err(|_| ConfigError::MissingEnvVar("PORTAL_SMTP_USERNAME".into()))?;
        let password = std::env::var("PORTAL_SMTP_PASSWORD")
            .map_err(|_| ConfigError::MissingEnvVar("PORTAL_SMTP_PASSWORD".into()))?;
        let from_address =
            std::env::var("PORTAL_SMTP_FROM").unwrap_or_else(|_| username.clone());

        Ok(Some(Self {
            provider,
            username,
            password: SecretString::from(password),
            from_address,
        }))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = PortalConfig::default();
        assert_eq!(config.sweep_limit, 200);
        assert_eq!(config.trigger_min_spacing, Duration::from_secs(25));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
    }
}
