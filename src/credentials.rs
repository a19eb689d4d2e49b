use keyring::Entry;
use log::warn;

use crate::error::Result;

const SERVICE: &str = "mail_digest";

/// Keyring account under which the summarization API key is kept.
pub const LLM_API_KEY_ACCOUNT: &str = "llm-api-key";

/// A secret kept in the OS keyring under the `mail_digest` service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Secret<'a> {
    /// Login password of an IMAP or SMTP user, keyed by that user.
    MailPassword(&'a str),
    LlmApiKey,
}

impl<'a> Secret<'a> {
    /// The secret named by a `set-password --account` value.
    pub fn from_account(account: &'a str) -> Self {
        if account == LLM_API_KEY_ACCOUNT {
            Self::LlmApiKey
        } else {
            Self::MailPassword(account)
        }
    }

    pub fn account(&self) -> &'a str {
        match self {
            Self::MailPassword(user) => user,
            Self::LlmApiKey => LLM_API_KEY_ACCOUNT,
        }
    }

    pub fn store(&self, value: &str) -> Result<()> {
        Entry::new(SERVICE, self.account())?.set_password(value)?;
        Ok(())
    }

    /// The stored value, or `None` when there is none. An unreachable
    /// keyring is logged and treated as empty.
    pub fn load(&self) -> Option<String> {
        let found = Entry::new(SERVICE, self.account()).and_then(|entry| entry.get_password());
        match found {
            Ok(value) => Some(value),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!("keyring lookup for {} failed: {e}", self.account());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_account_is_recognized() {
        assert_eq!(Secret::from_account("llm-api-key"), Secret::LlmApiKey);
        assert_eq!(
            Secret::from_account("me@gmail.com"),
            Secret::MailPassword("me@gmail.com")
        );
        assert_eq!(Secret::LlmApiKey.account(), LLM_API_KEY_ACCOUNT);
        assert_eq!(Secret::MailPassword("a@b.c").account(), "a@b.c");
    }
}
