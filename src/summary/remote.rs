use std::time::Duration;

use log::debug;
use serde::Deserialize;
use serde_json::json;

use crate::domain::message::NormalizedMessage;
use crate::error::{DigestError, Result};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const TIMEOUT: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str = "You summarize and prioritize emails with a focus on action.";

/// Settings for the chat-completions call.
#[derive(Clone)]
pub struct RemoteSummary {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

impl std::fmt::Debug for RemoteSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSummary")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct Completion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl RemoteSummary {
    pub fn summarize(&self, messages: &[NormalizedMessage]) -> Result<String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(TIMEOUT)
            .build()?;
        let payload = build_payload(&self.model, messages);
        debug!(
            "requesting summary of {} messages from {}",
            messages.len(),
            self.api_url
        );

        let resp = client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()?
            .error_for_status()?;
        let data: serde_json::Value = resp.json()?;
        parse_completion(data)
    }
}

/// The user prompt: instructions followed by every message in order.
pub fn build_prompt(messages: &[NormalizedMessage]) -> String {
    let mut lines = vec![
        "You are an assistant that identifies the emails most in need of immediate action.".to_string(),
        "Answer in the following format:".to_string(),
        "- summarize the critical items,".to_string(),
        "- list pending items by priority,".to_string(),
        "- point out what can wait.".to_string(),
        String::new(),
        "Emails:".to_string(),
    ];
    for (idx, msg) in messages.iter().enumerate() {
        lines.push(format!("[{}] From: {}", idx + 1, msg.sender));
        lines.push(format!("Subject: {}", msg.subject));
        lines.push(format!("Content: {}", msg.body));
        lines.push(String::new());
    }
    lines.join("\n")
}

pub fn build_payload(model: &str, messages: &[NormalizedMessage]) -> serde_json::Value {
    json!({
        "model": model,
        "messages": [
            {"role": "system", "content": SYSTEM_PROMPT},
            {"role": "user", "content": build_prompt(messages)},
        ],
        "temperature": 0.2,
    })
}

/// Pull `choices[0].message.content` out of a completion response.
pub fn parse_completion(data: serde_json::Value) -> Result<String> {
    let shown = data.to_string();
    let completion: Completion = serde_json::from_value(data)
        .map_err(|e| DigestError::Remote(format!("{e}: {shown}")))?;
    completion
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| DigestError::Remote(format!("no choices: {shown}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msgs() -> Vec<NormalizedMessage> {
        vec![
            NormalizedMessage {
                sender: "a@example.com".into(),
                subject: "Invoice due".into(),
                body: "Pay by Friday".into(),
            },
            NormalizedMessage {
                sender: "b@example.com".into(),
                subject: "Lunch".into(),
                body: "Tomorrow?".into(),
            },
        ]
    }

    #[test]
    fn prompt_enumerates_every_message() {
        let p = build_prompt(&msgs());
        assert!(p.contains("[1] From: a@example.com\nSubject: Invoice due\nContent: Pay by Friday"));
        assert!(p.contains("[2] From: b@example.com"));
    }

    #[test]
    fn payload_shape() {
        let v = build_payload("m1", &msgs());
        assert_eq!(v["model"], "m1");
        assert_eq!(v["messages"][0]["role"], "system");
        assert_eq!(v["messages"][1]["role"], "user");
        assert_eq!(v["temperature"], 0.2);
    }

    #[test]
    fn parses_first_choice() {
        let v = json!({"choices": [{"message": {"role": "assistant", "content": "done"}}]});
        assert_eq!(parse_completion(v).unwrap(), "done");
    }

    #[test]
    fn malformed_response_is_remote_error() {
        for v in [
            json!({"error": "quota"}),
            json!({"choices": []}),
            json!({"choices": [{"message": {}}]}),
        ] {
            assert!(matches!(parse_completion(v), Err(DigestError::Remote(_))));
        }
    }

    #[test]
    fn debug_hides_key() {
        let r = RemoteSummary {
            api_url: "https://llm.example/v1/chat/completions".into(),
            api_key: "sk-secret".into(),
            model: DEFAULT_MODEL.into(),
        };
        assert!(!format!("{r:?}").contains("sk-secret"));
    }
}
