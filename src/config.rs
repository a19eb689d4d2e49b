use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::credentials::Secret;
use crate::error::DigestError;
use crate::mail::fetcher::{DEFAULT_BODY_MAX_CHARS, FetchOptions};
use crate::mail::providers;
use crate::summary::{RemoteSummary, Summarizer, remote::DEFAULT_MODEL};

pub const DEFAULT_SEND_TIMES: &str = "06:00,24:00";

/// On-disk configuration. Every field is optional; environment variables
/// override the file and built-in defaults fill the rest.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Shared login for IMAP and SMTP when they are not set separately.
    pub email_address: Option<String>,
    pub imap: ImapConfig,
    pub smtp: SmtpConfig,
    pub summary: SummaryConfig,
    pub schedule: ScheduleConfig,
    #[serde(skip)]
    pub secrets: Secrets,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ImapConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub mailbox: Option<String>,
    pub search_criteria: Option<String>,
    pub limit: Option<usize>,
    pub body_max_chars: Option<usize>,
    pub mark_seen: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub use_tls: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct SummaryConfig {
    /// `local` or `llm` (alias `remote`).
    pub mode: Option<String>,
    pub api_url: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub send_times: Option<String>,
    pub continuous: Option<bool>,
}

/// Passwords and keys. Never read from or written to the config file.
#[derive(Clone, Default, PartialEq)]
pub struct Secrets {
    pub email_password: Option<String>,
    pub imap_password: Option<String>,
    pub smtp_password: Option<String>,
    pub llm_api_key: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = |o: &Option<String>| if o.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Secrets")
            .field("email_password", &set(&self.email_password))
            .field("imap_password", &set(&self.imap_password))
            .field("smtp_password", &set(&self.smtp_password))
            .field("llm_api_key", &set(&self.llm_api_key))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ImapSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub mark_seen: bool,
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from: String,
    pub to: String,
    pub starttls: bool,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub imap: ImapSettings,
    pub smtp: SmtpSettings,
    pub fetch: FetchOptions,
    pub summarizer: Summarizer,
    pub send_times: String,
    pub continuous: bool,
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("mail_digest"))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Read the config file if there is one; a missing file is an empty config.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&s)?;
    Ok(cfg)
}

/// Write a starter config for users to edit. Refuses to overwrite.
pub fn write_template(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let sample = Config {
        email_address: Some("you@gmail.com".to_string()),
        imap: ImapConfig {
            mailbox: Some("INBOX".to_string()),
            search_criteria: Some("UNSEEN".to_string()),
            limit: Some(15),
            ..ImapConfig::default()
        },
        smtp: SmtpConfig {
            use_tls: Some(true),
            ..SmtpConfig::default()
        },
        summary: SummaryConfig {
            mode: Some("local".to_string()),
            model: Some(DEFAULT_MODEL.to_string()),
            ..SummaryConfig::default()
        },
        schedule: ScheduleConfig {
            send_times: Some(DEFAULT_SEND_TIMES.to_string()),
            continuous: Some(false),
        },
        secrets: Secrets::default(),
    };
    fs::write(path, toml::to_string_pretty(&sample)?)?;
    Ok(())
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T, DigestError> {
    value
        .trim()
        .parse()
        .map_err(|_| DigestError::config(format!("{name} has an invalid value '{value}'")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, DigestError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(DigestError::config(format!(
            "{name} must be true or false, got '{value}'"
        ))),
    }
}

impl Config {
    /// Overlay environment variables. `get` is usually `std::env::var(..).ok()`.
    pub fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<(), DigestError> {
        let var = |name: &str| get(name).filter(|v| !v.trim().is_empty());

        macro_rules! text {
            ($name:literal => $field:expr) => {
                if let Some(v) = var($name) {
                    $field = Some(v.trim().to_string());
                }
            };
        }
        macro_rules! number {
            ($name:literal => $field:expr) => {
                if let Some(v) = var($name) {
                    $field = Some(parse_env($name, &v)?);
                }
            };
        }
        macro_rules! flag {
            ($name:literal => $field:expr) => {
                if let Some(v) = var($name) {
                    $field = Some(parse_bool($name, &v)?);
                }
            };
        }

        text!("EMAIL_ADDRESS" => self.email_address);
        text!("IMAP_USER" => self.imap.user);
        text!("IMAP_HOST" => self.imap.host);
        number!("IMAP_PORT" => self.imap.port);
        text!("IMAP_MAILBOX" => self.imap.mailbox);
        text!("IMAP_SEARCH_CRITERIA" => self.imap.search_criteria);
        number!("IMAP_LIMIT" => self.imap.limit);
        flag!("IMAP_MARK_SEEN" => self.imap.mark_seen);
        number!("BODY_MAX_CHARS" => self.imap.body_max_chars);
        text!("SMTP_USER" => self.smtp.user);
        text!("SMTP_HOST" => self.smtp.host);
        number!("SMTP_PORT" => self.smtp.port);
        flag!("SMTP_USE_TLS" => self.smtp.use_tls);
        text!("SMTP_FROM" => self.smtp.from);
        text!("SMTP_TO" => self.smtp.to);
        text!("SUMMARY_MODE" => self.summary.mode);
        text!("LLM_API_URL" => self.summary.api_url);
        text!("LLM_MODEL" => self.summary.model);
        text!("SEND_TIMES" => self.schedule.send_times);
        flag!("CONTINUOUS_MODE" => self.schedule.continuous);

        // secrets are taken verbatim
        let secret = |name: &str| get(name).filter(|v| !v.is_empty());
        if let Some(v) = secret("EMAIL_APP_PASSWORD") {
            self.secrets.email_password = Some(v);
        }
        if let Some(v) = secret("IMAP_PASSWORD") {
            self.secrets.imap_password = Some(v);
        }
        if let Some(v) = secret("SMTP_PASSWORD") {
            self.secrets.smtp_password = Some(v);
        }
        if let Some(v) = secret("LLM_API_KEY") {
            self.secrets.llm_api_key = Some(v);
        }
        Ok(())
    }

    pub fn imap_user(&self) -> Option<&str> {
        self.imap.user.as_deref().or(self.email_address.as_deref())
    }

    pub fn smtp_user(&self) -> Option<&str> {
        self.smtp.user.as_deref().or(self.email_address.as_deref())
    }

    /// Fill missing secrets using `lookup`, typically the keyring.
    pub fn fill_secrets(&mut self, lookup: impl Fn(Secret<'_>) -> Option<String>) {
        if self.secrets.imap_password.is_none() && self.secrets.email_password.is_none() {
            self.secrets.imap_password = self
                .imap_user()
                .map(Secret::MailPassword)
                .and_then(&lookup);
        }
        if self.secrets.smtp_password.is_none() && self.secrets.email_password.is_none() {
            self.secrets.smtp_password = self
                .smtp_user()
                .map(Secret::MailPassword)
                .and_then(&lookup);
        }
        if self.secrets.llm_api_key.is_none() {
            self.secrets.llm_api_key = lookup(Secret::LlmApiKey);
        }
    }

    pub fn continuous(&self) -> bool {
        self.schedule.continuous.unwrap_or(false)
    }

    pub fn send_times(&self) -> &str {
        self.schedule.send_times.as_deref().unwrap_or(DEFAULT_SEND_TIMES)
    }

    /// Resolve identities, hosts and the summary mode.
    pub fn resolve(&self) -> Result<Settings, DigestError> {
        let missing_identity = || {
            DigestError::config(
                "set IMAP_USER/IMAP_PASSWORD and SMTP_USER/SMTP_PASSWORD, \
                 or EMAIL_ADDRESS + EMAIL_APP_PASSWORD",
            )
        };
        let imap_user = self.imap_user().ok_or_else(missing_identity)?.to_string();
        let smtp_user = self.smtp_user().ok_or_else(missing_identity)?.to_string();
        let imap_password = self
            .secrets
            .imap_password
            .clone()
            .or_else(|| self.secrets.email_password.clone())
            .ok_or_else(missing_identity)?;
        let smtp_password = self
            .secrets
            .smtp_password
            .clone()
            .or_else(|| self.secrets.email_password.clone())
            .ok_or_else(missing_identity)?;

        let unknown_host = |user: &str| {
            DigestError::config(format!(
                "no IMAP_HOST/SMTP_HOST set and '{user}' is not at a known provider \
                 (gmail, outlook, hotmail, live, yahoo, icloud)"
            ))
        };
        let imap_provider = providers::for_address(&imap_user);
        let imap_host = match (&self.imap.host, imap_provider) {
            (Some(h), _) => h.clone(),
            (None, Some(p)) => p.imap_host.to_string(),
            (None, None) => return Err(unknown_host(&imap_user)),
        };
        let smtp_provider = providers::for_address(&smtp_user);
        let (smtp_host, default_port) = match (&self.smtp.host, smtp_provider) {
            (Some(h), p) => (h.clone(), p.map_or(587, |p| p.smtp_port)),
            (None, Some(p)) => (p.smtp_host.to_string(), p.smtp_port),
            (None, None) => return Err(unknown_host(&smtp_user)),
        };

        let summarizer = match self
            .summary
            .mode
            .as_deref()
            .unwrap_or("local")
            .to_ascii_lowercase()
            .as_str()
        {
            "local" => Summarizer::Local,
            "llm" | "remote" => Summarizer::Remote(RemoteSummary {
                api_url: self
                    .summary
                    .api_url
                    .clone()
                    .ok_or_else(|| DigestError::config("LLM_API_URL is required in llm mode"))?,
                api_key: self
                    .secrets
                    .llm_api_key
                    .clone()
                    .ok_or_else(|| DigestError::config("LLM_API_KEY is required in llm mode"))?,
                model: self
                    .summary
                    .model
                    .clone()
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            }),
            other => {
                return Err(DigestError::config(format!(
                    "invalid SUMMARY_MODE '{other}', use 'local' or 'llm'"
                )));
            }
        };

        let defaults = FetchOptions::default();
        let fetch = FetchOptions {
            mailbox: self.imap.mailbox.clone().unwrap_or(defaults.mailbox),
            criteria: self.imap.search_criteria.clone().unwrap_or(defaults.criteria),
            limit: self.imap.limit.unwrap_or(defaults.limit),
            body_max_chars: self.imap.body_max_chars.unwrap_or(DEFAULT_BODY_MAX_CHARS),
        };

        Ok(Settings {
            imap: ImapSettings {
                host: imap_host,
                port: self.imap.port.unwrap_or(993),
                user: imap_user,
                password: imap_password,
                mark_seen: self.imap.mark_seen.unwrap_or(true),
            },
            smtp: SmtpSettings {
                host: smtp_host,
                port: self.smtp.port.unwrap_or(default_port),
                from: self.smtp.from.clone().unwrap_or_else(|| smtp_user.clone()),
                to: self.smtp.to.clone().unwrap_or_else(|| smtp_user.clone()),
                user: smtp_user,
                password: smtp_password,
                starttls: self.smtp.use_tls.unwrap_or(true),
            },
            fetch,
            summarizer,
            send_times: self.send_times().to_string(),
            continuous: self.continuous(),
        })
    }
}

/// Load the config file, overlay the process environment and the keyring.
pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    let mut cfg = load_config_from(&path)?;
    cfg.apply_env(|name| std::env::var(name).ok())?;
    cfg.fill_secrets(|secret| secret.load());
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    fn from_env(pairs: &[(&str, &str)]) -> Result<Settings, DigestError> {
        let mut cfg = Config::default();
        cfg.apply_env(env(pairs))?;
        cfg.resolve()
    }

    #[test]
    fn single_gmail_identity_fills_everything() {
        let s = from_env(&[
            ("EMAIL_ADDRESS", "me@gmail.com"),
            ("EMAIL_APP_PASSWORD", "app-pw"),
        ])
        .unwrap();
        assert_eq!(s.imap.host, "imap.gmail.com");
        assert_eq!(s.imap.port, 993);
        assert_eq!(s.imap.user, "me@gmail.com");
        assert_eq!(s.imap.password, "app-pw");
        assert_eq!(s.smtp.host, "smtp.gmail.com");
        assert_eq!(s.smtp.port, 587);
        assert_eq!(s.smtp.to, "me@gmail.com");
        assert_eq!(s.smtp.from, "me@gmail.com");
        assert!(s.smtp.starttls);
        assert_eq!(s.fetch, FetchOptions::default());
        assert!(matches!(s.summarizer, Summarizer::Local));
        assert_eq!(s.send_times, "06:00,24:00");
        assert!(!s.continuous);
    }

    #[test]
    fn missing_password_is_config_error() {
        let err = from_env(&[("EMAIL_ADDRESS", "me@gmail.com")]).unwrap_err();
        assert!(matches!(err, DigestError::Config(_)));
    }

    #[test]
    fn unknown_domain_needs_hosts() {
        let base = [
            ("EMAIL_ADDRESS", "me@corp.example"),
            ("EMAIL_APP_PASSWORD", "pw"),
        ];
        assert!(matches!(from_env(&base), Err(DigestError::Config(_))));

        let mut with_hosts = base.to_vec();
        with_hosts.push(("IMAP_HOST", "mail.corp.example"));
        with_hosts.push(("SMTP_HOST", "smtp.corp.example"));
        with_hosts.push(("SMTP_PORT", "2525"));
        let s = from_env(&with_hosts).unwrap();
        assert_eq!(s.imap.host, "mail.corp.example");
        assert_eq!(s.smtp.port, 2525);
    }

    #[test]
    fn split_identities_and_overrides() {
        let s = from_env(&[
            ("IMAP_USER", "reader@yahoo.com"),
            ("IMAP_PASSWORD", "r"),
            ("SMTP_USER", "writer@icloud.com"),
            ("SMTP_PASSWORD", "w"),
            ("SMTP_TO", "boss@example.com"),
            ("SMTP_USE_TLS", "FALSE"),
            ("IMAP_LIMIT", "5"),
            ("IMAP_SEARCH_CRITERIA", "ALL"),
            ("BODY_MAX_CHARS", "500"),
            ("CONTINUOUS_MODE", "true"),
            ("SEND_TIMES", "07:30"),
        ])
        .unwrap();
        assert_eq!(s.imap.host, "imap.mail.yahoo.com");
        assert_eq!(s.smtp.host, "smtp.mail.me.com");
        assert_eq!(s.smtp.to, "boss@example.com");
        assert_eq!(s.smtp.from, "writer@icloud.com");
        assert!(!s.smtp.starttls);
        assert_eq!(s.fetch.limit, 5);
        assert_eq!(s.fetch.criteria, "ALL");
        assert_eq!(s.fetch.body_max_chars, 500);
        assert!(s.continuous);
        assert_eq!(s.send_times, "07:30");
    }

    #[test]
    fn bad_numbers_and_flags_are_rejected() {
        let mut cfg = Config::default();
        assert!(cfg.apply_env(env(&[("IMAP_LIMIT", "lots")])).is_err());
        assert!(cfg.apply_env(env(&[("SMTP_USE_TLS", "maybe")])).is_err());
    }

    #[test]
    fn llm_mode_requires_url_and_key() {
        let base = [
            ("EMAIL_ADDRESS", "me@gmail.com"),
            ("EMAIL_APP_PASSWORD", "pw"),
            ("SUMMARY_MODE", "LLM"),
        ];
        assert!(matches!(from_env(&base), Err(DigestError::Config(_))));

        let mut full = base.to_vec();
        full.push(("LLM_API_URL", "https://llm.example/v1/chat/completions"));
        full.push(("LLM_API_KEY", "k"));
        match from_env(&full).unwrap().summarizer {
            Summarizer::Remote(r) => {
                assert_eq!(r.model, DEFAULT_MODEL);
                assert_eq!(r.api_key, "k");
            }
            other => panic!("expected remote, got {other:?}"),
        }
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = from_env(&[
            ("EMAIL_ADDRESS", "me@gmail.com"),
            ("EMAIL_APP_PASSWORD", "pw"),
            ("SUMMARY_MODE", "magic"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn keyring_fallback_only_fills_gaps() {
        let mut cfg = Config::default();
        cfg.apply_env(env(&[
            ("EMAIL_ADDRESS", "me@gmail.com"),
            ("SMTP_PASSWORD", "from-env"),
        ]))
        .unwrap();
        cfg.fill_secrets(|secret| Some(format!("ring:{}", secret.account())));
        let s = cfg.resolve().unwrap();
        assert_eq!(s.imap.password, "ring:me@gmail.com");
        assert_eq!(s.smtp.password, "from-env");
    }

    #[test]
    fn file_then_env_layering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
email_address = "me@outlook.com"

[imap]
mailbox = "Archive"
limit = 3

[schedule]
send_times = "08:00"
"#,
        )
        .unwrap();
        let mut cfg = load_config_from(&path).unwrap();
        cfg.apply_env(env(&[("EMAIL_APP_PASSWORD", "pw"), ("IMAP_LIMIT", "9")]))
            .unwrap();
        let s = cfg.resolve().unwrap();
        assert_eq!(s.imap.host, "outlook.office365.com");
        assert_eq!(s.fetch.mailbox, "Archive");
        assert_eq!(s.fetch.limit, 9);
        assert_eq!(s.send_times, "08:00");
    }

    #[test]
    fn missing_file_is_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn template_round_trips_and_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");
        write_template(&path).unwrap();
        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.send_times(), DEFAULT_SEND_TIMES);
        assert!(write_template(&path).is_err());
    }
}
