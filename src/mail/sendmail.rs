use lettre::{
    Message, SmtpTransport, Transport,
    message::{Mailbox, header},
    transport::smtp::authentication::Credentials,
};
use std::sync::{Arc, Mutex};

use crate::config::Config;

pub type MailError = Box<dyn std::error::Error + Send + Sync>;

/// A message captured by the in-memory mailer.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outgoing mail channel
///
/// - `Smtp`: STARTTLS relay with credentials, used when `SMTP_SERVER` is set
/// - `Console`: writes the message to the log, for local development
/// - `Memory`: keeps messages in an outbox that tests can read back
#[derive(Clone)]
pub enum Mailer {
    Smtp {
        transport: SmtpTransport,
        from: Mailbox,
    },
    Console {
        from: Mailbox,
    },
    Memory {
        from: Mailbox,
        outbox: Arc<Mutex<Vec<SentMail>>>,
    },
}

impl Mailer {
    pub fn from_config(config: &Config) -> Result<Self, MailError> {
        let from: Mailbox = config.default_from_email.parse()?;

        match &config.smtp {
            Some(smtp) => {
                let creds = Credentials::new(smtp.username.clone(), smtp.password.clone());
                let transport = SmtpTransport::starttls_relay(&smtp.server)? // starts unencrypted, upgrades to TLS
                    .credentials(creds)
                    .port(smtp.port)
                    .build();
                Ok(Mailer::Smtp { transport, from })
            }
            None => Ok(Mailer::Console { from }),
        }
    }

    pub fn memory(from: &str) -> Result<Self, MailError> {
        Ok(Mailer::Memory {
            from: from.parse()?,
            outbox: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Messages captured so far; empty for the other mailers.
    pub fn sent(&self) -> Vec<SentMail> {
        match self {
            Mailer::Memory { outbox, .. } => outbox
                .lock()
                .map(|outbox| outbox.clone())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Send a plain-text message
    pub async fn send(&self, to_email: &str, subject: &str, body: String) -> Result<(), MailError> {
        match self {
            Mailer::Smtp { transport, from } => {
                let email = Message::builder()
                    .from(from.clone())
                    .to(to_email.parse()?)
                    .subject(subject)
                    .header(header::ContentType::TEXT_PLAIN)
                    .body(body)?;

                // SmtpTransport is blocking
                let transport = transport.clone();
                tokio::task::spawn_blocking(move || transport.send(&email)).await??;
                tracing::info!(to = %to_email, "Email sent successfully");
                Ok(())
            }
            Mailer::Console { from } => {
                tracing::info!(from = %from, to = %to_email, subject = %subject, "\n{}", body);
                Ok(())
            }
            Mailer::Memory { outbox, .. } => {
                let mut outbox = outbox
                    .lock()
                    .map_err(|_| "in-memory outbox lock poisoned")?;
                outbox.push(SentMail {
                    to: to_email.to_string(),
                    subject: subject.to_string(),
                    body,
                });
                Ok(())
            }
        }
    }
}
