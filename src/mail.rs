use std::path::Path;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{CertmailError, Result};

/// Sends one message per call over a fresh authenticated STARTTLS session.
/// Connections are not pooled or reused across recipients, and nothing is
/// retried; any failure propagates to the batch driver.
pub struct Mailer<'a> {
    config: &'a Config,
}

impl<'a> Mailer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: Option<&Path>,
    ) -> Result<()> {
        let smtp = &self.config.smtp;
        if smtp.username.is_empty() || smtp.password.is_empty() {
            return Err(CertmailError::MissingCredentials);
        }

        let from: Mailbox = format!("{} <{}>", self.config.from_name, smtp.username).parse()?;
        let builder = Message::builder().from(from).to(to.parse()?).subject(subject);

        let (message, attached) = match attachment {
            Some(path) => {
                let bytes = std::fs::read(path)?;
                let file_name = path
                    .file_name()
                    .and_then(|s| s.to_str())
                    .unwrap_or("attachment.pdf")
                    .to_string();
                let part = Attachment::new(file_name.clone())
                    .body(bytes, ContentType::parse("application/pdf")?);
                let message = builder.multipart(
                    MultiPart::mixed()
                        .singlepart(SinglePart::plain(body.to_string()))
                        .singlepart(part),
                )?;
                (message, Some(file_name))
            }
            None => {
                let message = builder
                    .header(ContentType::TEXT_PLAIN)
                    .body(body.to_string())?;
                (message, None)
            }
        };

        let transport = SmtpTransport::starttls_relay(&smtp.host)?
            .port(smtp.port)
            .credentials(Credentials::new(smtp.username.clone(), smtp.password.clone()))
            .build();
        let response = transport.send(&message)?;
        if smtp.debug {
            debug!("Relay response for {}: {:?}", to, response);
        }

        match attached {
            Some(file_name) => info!("Email sent to {} with {}", to, file_name),
            None => info!("Email sent to {} (no attachment)", to),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests_support::test_config;

    #[test]
    fn test_missing_credentials_fail_before_any_network_use() {
        let config = test_config(Path::new("."));
        let mailer = Mailer::new(&config);
        let err = mailer
            .send("jane@example.com", "Subject", "Body", None)
            .unwrap_err();
        assert!(matches!(err, CertmailError::MissingCredentials));
    }
}
