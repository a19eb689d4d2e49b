use log::{debug, info};

use crate::domain::message::CycleReport;
use crate::error::Result;
use crate::mail::fetcher::{FetchOptions, MailSource, fetch_messages};
use crate::mail::smtp::MailSink;
use crate::summary::Summarizer;

/// Everything one fetch -> summarize -> dispatch cycle needs.
pub struct Pipeline {
    pub source: Box<dyn MailSource>,
    pub sink: Box<dyn MailSink>,
    pub summarizer: Summarizer,
    pub fetch: FetchOptions,
    pub recipient: String,
}

pub fn digest_subject(total: usize) -> String {
    format!("Mail digest ({total} analyzed)")
}

pub fn digest_body(summary: &str, total: usize) -> String {
    format!(
        "Automatic summary generated by mail_digest.\n\n\
         Total emails analyzed: {total}\n\n\
         {summary}"
    )
}

impl Pipeline {
    pub fn run_once(&self) -> Result<CycleReport> {
        let messages = fetch_messages(self.source.as_ref(), &self.fetch)?;
        if messages.is_empty() {
            info!("no new messages found");
            return Ok(CycleReport::NoMessages);
        }

        let summary = self.summarizer.summarize(&messages)?;
        info!(
            "summary of {} messages generated ({} mode)",
            messages.len(),
            self.summarizer.mode_name()
        );
        debug!("{summary}");

        let total = messages.len();
        self.sink.send(
            &digest_subject(total),
            &digest_body(&summary, total),
            &self.recipient,
        )?;
        info!("summary mailed to {}", self.recipient);
        Ok(CycleReport::Sent { analyzed: total })
    }
}
