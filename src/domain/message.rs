/// One mail reduced to what the summarizers need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMessage {
    pub sender: String,
    pub subject: String,
    pub body: String,
}

/// Outcome of one fetch -> summarize -> dispatch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleReport {
    /// Nothing matched the search; no summary was sent.
    NoMessages,
    Sent { analyzed: usize },
}
