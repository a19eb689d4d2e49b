use log::{debug, warn};
use native_tls::TlsConnector;

use crate::error::Result;
use crate::mail::fetcher::MailSource;

type TlsSession = imap::Session<native_tls::TlsStream<std::net::TcpStream>>;

/// IMAP over implicit TLS with LOGIN authentication.
pub struct ImapClient {
    pub server: String,
    pub port: u16,
    pub user: String,
    password: String,
    /// Fetch with `RFC822` (sets \Seen) instead of `BODY.PEEK[]`.
    pub mark_seen: bool,
}

impl ImapClient {
    pub fn new(
        server: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            port,
            user: user.into(),
            password: password.into(),
            mark_seen: true,
        }
    }

    pub fn with_mark_seen(mut self, mark_seen: bool) -> Self {
        self.mark_seen = mark_seen;
        self
    }

    fn connect_and_login(&self) -> Result<TlsSession> {
        let tls = TlsConnector::builder().build()?;
        let client = imap::connect((self.server.as_str(), self.port), self.server.as_str(), &tls)?;
        let session = client
            .login(&self.user, &self.password)
            .map_err(|(e, _client)| e)?;
        Ok(session)
    }

    fn fetch_in_session(
        &self,
        session: &mut TlsSession,
        mailbox: &str,
        criteria: &str,
        limit: usize,
    ) -> Result<Vec<Vec<u8>>> {
        session.select(mailbox)?;

        let mut ids: Vec<u32> = session.search(criteria)?.into_iter().collect();
        ids.sort_unstable();
        let start = ids.len().saturating_sub(limit);
        let ids = &ids[start..];
        debug!(
            "{} messages match '{}' in {}, taking {}",
            start + ids.len(),
            criteria,
            mailbox,
            ids.len()
        );

        let query = if self.mark_seen { "RFC822" } else { "BODY.PEEK[]" };
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            // One message per FETCH keeps a bad message from hiding the rest.
            let fetches = session.fetch(id.to_string(), query)?;
            match fetches.iter().next().and_then(|f| f.body()) {
                Some(body) => out.push(body.to_vec()),
                None => warn!("message {id} returned no body; skipping"),
            }
        }
        Ok(out)
    }
}

impl MailSource for ImapClient {
    fn fetch(&self, mailbox: &str, criteria: &str, limit: usize) -> Result<Vec<Vec<u8>>> {
        let mut session = self.connect_and_login()?;
        let result = self.fetch_in_session(&mut session, mailbox, criteria, limit);
        if let Err(e) = session.logout() {
            warn!("IMAP logout failed: {e}");
        }
        result
    }
}
