use log::{debug, warn};
use mailparse::MailHeaderMap;

use crate::domain::message::NormalizedMessage;
use crate::error::Result;
use crate::mail::decoders::{decode_header, normalize_body, unfold_header};
use crate::mail::extract::{MessagePart, extract_body};

pub const DEFAULT_BODY_MAX_CHARS: usize = 3000;

/// Where raw RFC 822 messages come from.
pub trait MailSource {
    /// Return at most `limit` raw messages matching `criteria` in `mailbox`.
    fn fetch(&self, mailbox: &str, criteria: &str, limit: usize) -> Result<Vec<Vec<u8>>>;
}

/// What to ask the mail source for on each cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub mailbox: String,
    pub criteria: String,
    pub limit: usize,
    pub body_max_chars: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            mailbox: "INBOX".to_string(),
            criteria: "UNSEEN".to_string(),
            limit: 15,
            body_max_chars: DEFAULT_BODY_MAX_CHARS,
        }
    }
}

/// Fetch and normalize the messages for one cycle.
pub fn fetch_messages(
    source: &dyn MailSource,
    opts: &FetchOptions,
) -> Result<Vec<NormalizedMessage>> {
    let raws = source.fetch(&opts.mailbox, &opts.criteria, opts.limit)?;
    debug!("fetched {} raw messages from {}", raws.len(), opts.mailbox);
    Ok(raws
        .iter()
        .map(|raw| normalize_message(raw, opts.body_max_chars))
        .collect())
}

/// Turn one raw message into sender, subject and a bounded body.
/// Unparseable input keeps its bytes as the body.
pub fn normalize_message(raw: &[u8], body_max_chars: usize) -> NormalizedMessage {
    match mailparse::parse_mail(raw) {
        Ok(parsed) => {
            let header = |name: &str| {
                let raw = parsed
                    .headers
                    .get_first_header(name)
                    .map(|h| unfold_header(h.get_value_raw()));
                decode_header(raw.as_deref())
            };
            let body = extract_body(&MessagePart::from_parsed(&parsed));
            NormalizedMessage {
                sender: header("From"),
                subject: header("Subject"),
                body: normalize_body(&body, body_max_chars),
            }
        }
        Err(e) => {
            warn!("could not parse message ({e}); using raw text");
            NormalizedMessage {
                sender: String::new(),
                subject: String::new(),
                body: normalize_body(&String::from_utf8_lossy(raw), body_max_chars),
            }
        }
    }
}
