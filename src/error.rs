use thiserror::Error;

/// Errors produced by the digest library.
#[derive(Error, Debug)]
pub enum DigestError {
    /// Missing or inconsistent configuration. Fatal, never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// A single send-time token could not be parsed.
    #[error("invalid send time '{token}': {reason}")]
    Format { token: String, reason: String },

    /// The summarization API answered with something we cannot use.
    #[error("unexpected summarizer response: {0}")]
    Remote(String),

    #[error("IMAP error: {0}")]
    Imap(#[from] imap::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("could not build outgoing message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

impl DigestError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for collaborator failures that the recurring loop may survive.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Imap(_)
                | Self::Tls(_)
                | Self::Smtp(_)
                | Self::Address(_)
                | Self::MessageBuild(_)
                | Self::Http(_)
                | Self::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DigestError>;
