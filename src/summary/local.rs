use crate::domain::message::NormalizedMessage;

/// How many messages the offline summary lists by name.
const TOP_N: usize = 5;

/// Deterministic digest built from subjects and senders only.
pub fn summarize(messages: &[NormalizedMessage]) -> String {
    let mut lines = vec![
        "Automatic summary (local mode):".to_string(),
        String::new(),
        "- critical items:".to_string(),
    ];
    for msg in messages.iter().take(TOP_N) {
        lines.push(format!("  • {} (from: {})", msg.subject, msg.sender));
    }
    lines.extend(
        [
            "",
            "- pending items by priority:",
            "  • High: review subjects mentioning 'urgent', 'deadline', 'due'.",
            "  • Medium: answer questions and follow-ups.",
            "  • Low: newsletters and general announcements.",
            "",
            "- what can wait:",
            "  • Informational messages with no immediate request for action.",
        ]
        .map(String::from),
    );
    lines.join("\n")
}
