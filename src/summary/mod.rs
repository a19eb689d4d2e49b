pub mod local;
pub mod remote;

use crate::domain::message::NormalizedMessage;
use crate::error::Result;

pub use remote::RemoteSummary;

/// How the digest text is produced, picked once from configuration.
#[derive(Debug, Clone)]
pub enum Summarizer {
    /// Offline template, no I/O.
    Local,
    /// OpenAI-compatible chat completion endpoint.
    Remote(RemoteSummary),
}

impl Summarizer {
    pub fn summarize(&self, messages: &[NormalizedMessage]) -> Result<String> {
        match self {
            Self::Local => Ok(local::summarize(messages)),
            Self::Remote(remote) => remote.summarize(messages),
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote(_) => "remote",
        }
    }
}
