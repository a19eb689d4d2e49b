use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::info;

use crate::error::Result;

/// Where the finished digest goes.
pub trait MailSink {
    fn send(&self, subject: &str, body: &str, recipient: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SmtpSender {
    pub host: String,
    pub port: u16,
    pub user: String,
    password: String,
    pub from: String,
    /// Upgrade the connection with STARTTLS before authenticating.
    pub starttls: bool,
}

impl SmtpSender {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
        from: impl Into<String>,
        starttls: bool,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
            from: from.into(),
            starttls,
        }
    }

    fn transport(&self) -> Result<SmtpTransport> {
        let creds = Credentials::new(self.user.clone(), self.password.clone());
        let builder = if self.starttls {
            SmtpTransport::starttls_relay(&self.host)?
        } else {
            SmtpTransport::builder_dangerous(&self.host)
        };
        Ok(builder
            .port(self.port)
            .credentials(creds)
            .timeout(Some(Duration::from_secs(30)))
            .build())
    }
}

impl MailSink for SmtpSender {
    fn send(&self, subject: &str, body: &str, recipient: &str) -> Result<()> {
        let email = Message::builder()
            .from(self.from.parse()?)
            .to(recipient.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        self.transport()?.send(&email)?;
        info!("digest sent to {recipient} via {}:{}", self.host, self.port);
        Ok(())
    }
}
