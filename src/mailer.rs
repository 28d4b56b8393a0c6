use crate::error::{DigestError, Result};
use std::sync::Mutex;

#[cfg(feature = "smtp")]
use crate::config::SmtpConfig;
#[cfg(feature = "smtp")]
use lettre::message::{Mailbox, MultiPart};
#[cfg(feature = "smtp")]
use lettre::transport::smtp::authentication::Credentials;
#[cfg(feature = "smtp")]
use lettre::transport::smtp::client::{Tls, TlsParameters};
#[cfg(feature = "smtp")]
use lettre::{Message, SmtpTransport, Transport};

/// A composed digest ready for delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub text: String,
    pub html: String,
    pub recipients: Vec<String>,
}

/// Delivers a notification to its recipients.
pub trait Notifier {
    fn deliver(&self, notification: &Notification) -> Result<()>;
}

impl<N: Notifier + ?Sized> Notifier for &N {
    fn deliver(&self, notification: &Notification) -> Result<()> {
        (**self).deliver(notification)
    }
}

/// Keeps delivered notifications in memory; can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failure: Mutex<Option<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following delivery fail with `reason`, or succeed with `None`.
    pub fn fail_with(&self, reason: Option<&str>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = reason.map(str::to_string);
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn deliver(&self, notification: &Notification) -> Result<()> {
        let failure = self
            .failure
            .lock()
            .map_err(|_| DigestError::Delivery("notifier lock poisoned".to_string()))?
            .clone();
        if let Some(reason) = failure {
            return Err(DigestError::Delivery(reason));
        }
        self.sent
            .lock()
            .map_err(|_| DigestError::Delivery("notifier lock poisoned".to_string()))?
            .push(notification.clone());
        Ok(())
    }
}

#[cfg(feature = "smtp")]
pub struct Mailer {
    smtp: SmtpTransport,
    from: Mailbox,
}

#[cfg(feature = "smtp")]
impl Mailer {
    /// SMTP over implicit TLS using the configured relay.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let tls_parameters = TlsParameters::new(config.host.clone())
            .map_err(|e| DigestError::Config(format!("tls setup for {}: {}", config.host, e)))?;

        let smtp = SmtpTransport::relay(&config.host)
            .map_err(|e| DigestError::Config(format!("smtp relay {}: {}", config.host, e)))?
            .credentials(creds)
            .port(config.port)
            .tls(Tls::Wrapper(tls_parameters))
            .build();

        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| DigestError::Config(format!("invalid sender '{}': {}", config.from, e)))?;

        Ok(Mailer { smtp, from })
    }

    fn build_message(&self, notification: &Notification) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(notification.subject.clone());
        for recipient in &notification.recipients {
            let mailbox: Mailbox = recipient.parse().map_err(|e| {
                DigestError::Delivery(format!("invalid recipient '{}': {}", recipient, e))
            })?;
            builder = builder.to(mailbox);
        }

        builder
            .multipart(MultiPart::alternative_plain_html(
                notification.text.clone(),
                notification.html.clone(),
            ))
            .map_err(|e| DigestError::Delivery(e.to_string()))
    }
}

#[cfg(feature = "smtp")]
impl Notifier for Mailer {
    fn deliver(&self, notification: &Notification) -> Result<()> {
        let email = self.build_message(notification)?;
        self.smtp
            .send(&email)
            .map_err(|e| DigestError::Delivery(e.to_string()))?;
        log::info!(
            "digest mailed to {} recipient(s)",
            notification.recipients.len()
        );
        Ok(())
    }
}
