//! Outbound email — SMTP via lettre behind a pluggable `Mailer` trait.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;

use crate::config::SmtpSettings;
use crate::error::{ConfigError, DeliveryError};

/// A single outbound email.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Abstracts outbound email delivery. One concrete implementation per
/// provider; the dispatcher only sees this trait.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), DeliveryError>;
}

/// Supported SMTP providers. Parsed once at configuration load —
/// an unknown identifier fails here, never at send time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailProvider {
    Gmail,
    Office365,
}

impl MailProvider {
    /// SMTP relay host for this provider.
    pub fn relay_host(self) -> &'static str {
        match self {
            MailProvider::Gmail => "smtp.gmail.com",
            MailProvider::Office365 => "smtp.office365.com",
        }
    }
}

impl FromStr for MailProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gmail" => Ok(MailProvider::Gmail),
            "office365" | "outlook" => Ok(MailProvider::Office365),
            other => Err(ConfigError::InvalidValue {
                key: "PORTAL_SMTP_PROVIDER".into(),
                message: format!("unsupported provider '{other}' (expected gmail or office365)"),
            }),
        }
    }
}

/// SMTP mailer. The transport is built once at construction; lettre's
/// blocking transport runs off the async runtime via `spawn_blocking`.
pub struct SmtpMailer {
    transport: Arc<SmtpTransport>,
    from_address: String,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, ConfigError> {
        let creds = Credentials::new(
            settings.username.clone(),
            settings.password.expose_secret().to_string(),
        );

        let transport = SmtpTransport::relay(settings.provider.relay_host())
            .map_err(|e| ConfigError::InvalidValue {
                key: "PORTAL_SMTP_PROVIDER".into(),
                message: format!("SMTP relay setup failed: {e}"),
            })?
            .credentials(creds)
            .build();

        Ok(Self {
            transport: Arc::new(transport),
            from_address: settings.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), DeliveryError> {
        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e| DeliveryError::Build(format!("invalid from address: {e}")))?,
            )
            .to(email
                .to
                .parse()
                .map_err(|e| DeliveryError::Build(format!("invalid to address: {e}")))?)
            .subject(&email.subject)
            .body(email.body.clone())
            .map_err(|e| DeliveryError::Build(e.to_string()))?;

        let transport = Arc::clone(&self.transport);
        let to = email.to.clone();
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| DeliveryError::Send(format!("send task panicked: {e}")))?
            .map_err(|e| DeliveryError::Send(e.to_string()))?;

        tracing::info!(to = %to, "Email sent");
        Ok(())
    }
}

/// Dev-mode mailer used when SMTP is not configured: logs the email and
/// reports success. Delivery outcomes are still recorded normally.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), DeliveryError> {
        tracing::info!(to = %email.to, subject = %email.subject, "Email (log only, SMTP not configured)");
        Ok(())
    }
}

/// Syntactic email check, applied at reminder write time.
pub fn is_valid_email(s: &str) -> bool {
    static PATTERN: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
    });
    re.is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn provider_parses_known_identifiers() {
        assert_eq!("gmail".parse::<MailProvider>().unwrap(), MailProvider::Gmail);
        assert_eq!(
            "Office365".parse::<MailProvider>().unwrap(),
            MailProvider::Office365
        );
        assert_eq!(
            "outlook".parse::<MailProvider>().unwrap(),
            MailProvider::Office365
        );
    }

    #[test]
    fn unknown_provider_fails_at_parse() {
        assert!("sendgrid".parse::<MailProvider>().is_err());
        assert!("".parse::<MailProvider>().is_err());
    }

    #[test]
    fn smtp_mailer_constructs_for_known_provider() {
        let settings = SmtpSettings {
            provider: MailProvider::Gmail,
            username: "agency@gmail.com".into(),
            password: SecretString::from("hunter2"),
            from_address: "agency@gmail.com".into(),
        };
        assert!(SmtpMailer::new(&settings).is_ok());
    }

    #[test]
    fn email_validation_accepts_plausible_addresses() {
        assert!(is_valid_email("client@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.co"));
    }

    #[test]
    fn email_validation_rejects_malformed() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("nodomain@"));
        assert!(!is_valid_email("@nolocal.com"));
        assert!(!is_valid_email("notld@example"));
    }
}
