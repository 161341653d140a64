//! Alert email delivery.
//!
//! Delivery failures are reported to the caller, which logs and drops them.
//! Nothing here retries.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::{Config, TempScale};

// ---

/// A fired consecutive-exceedance alert. Temperatures are Kelvin.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub city: String,
    pub temp_k: f64,
    pub threshold_k: f64,
    pub consecutive: u32,
}

impl Alert {
    pub fn subject(&self) -> String {
        format!("Weather Alert for {}", self.city)
    }

    /// Plain-text body with temperatures in `scale`.
    pub fn body(&self, scale: TempScale) -> String {
        // ---
        format!(
            "The temperature in {city} has exceeded {threshold:.2} {scale} for {n} consecutive updates.\n\
             Latest reading: {temp:.2} {scale}.\n",
            city = self.city,
            threshold = scale.convert(self.threshold_k),
            temp = scale.convert(self.temp_k),
            n = self.consecutive,
            scale = scale,
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid email address '{0}': {1}")]
    Address(String, #[source] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError>;
}

/// STARTTLS SMTP submission with login credentials.
pub struct SmtpNotifier {
    // ---
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
    scale: TempScale,
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .parse()
        .map_err(|e| NotifyError::Address(address.to_string(), e))
}

impl SmtpNotifier {
    // ---
    /// Build the transport and parse all addresses up front so bad config
    /// fails at startup instead of on the first alert.
    pub fn from_config(cfg: &Config) -> Result<Self, NotifyError> {
        // ---
        let from = parse_mailbox(&cfg.email_address)?;
        let to = cfg
            .alert_recipients
            .iter()
            .map(|r| parse_mailbox(r))
            .collect::<Result<Vec<_>, _>>()?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_host)?
            .port(cfg.smtp_port)
            .credentials(Credentials::new(
                cfg.email_address.clone(),
                cfg.email_password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from,
            to,
            scale: cfg.temp_scale,
        })
    }

    fn message(&self, alert: &Alert) -> Result<Message, NotifyError> {
        // ---
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(alert.subject())
            .header(ContentType::TEXT_PLAIN);

        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }

        Ok(builder.body(alert.body(self.scale))?)
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        // ---
        let message = self.message(alert)?;
        self.transport.send(message).await?;

        tracing::info!(
            "Alert email sent to {} recipient(s) for {}",
            self.to.len(),
            alert.city
        );
        Ok(())
    }
}
