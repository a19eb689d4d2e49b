use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use log::info;

use mail_digest::config::{Settings, config_path, load_config, write_template};
use mail_digest::credentials::Secret;
use mail_digest::daemon::{Clock, ScheduleEngine, SystemClock, schedule::Schedule};
use mail_digest::domain::message::CycleReport;
use mail_digest::mail::imap_client::ImapClient;
use mail_digest::mail::smtp::SmtpSender;
use mail_digest::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "mail_digest")]
#[command(about = "Summarize new mail and send the digest by email", long_about = None)]
struct Cli {
    /// Without a subcommand: one run, or the daemon when CONTINUOUS_MODE=true
    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch, summarize and send once
    Run,

    /// Send a digest at every scheduled time until killed
    Daemon {
        /// Comma separated HH:MM list, overrides SEND_TIMES
        #[arg(long)]
        times: Option<String>,
    },

    /// Print the upcoming send times
    NextRun {
        #[arg(long)]
        times: Option<String>,

        #[arg(long, default_value_t = 5)]
        count: usize,
    },

    /// Store a mail password (or the LLM API key, account "llm-api-key") in the keyring
    SetPassword {
        #[arg(long)]
        account: String,
    },

    /// Write a template config file
    InitConfig,
}

fn build_pipeline(settings: &Settings) -> Pipeline {
    let imap = &settings.imap;
    let smtp = &settings.smtp;
    Pipeline {
        source: Box::new(
            ImapClient::new(&imap.host, imap.port, &imap.user, &imap.password)
                .with_mark_seen(imap.mark_seen),
        ),
        sink: Box::new(SmtpSender::new(
            &smtp.host,
            smtp.port,
            &smtp.user,
            &smtp.password,
            &smtp.from,
            smtp.starttls,
        )),
        summarizer: settings.summarizer.clone(),
        fetch: settings.fetch.clone(),
        recipient: smtp.to.clone(),
    }
}

fn run_once(settings: &Settings) -> Result<()> {
    match build_pipeline(settings).run_once()? {
        CycleReport::NoMessages => info!("nothing to summarize"),
        CycleReport::Sent { analyzed } => info!("done, {analyzed} messages analyzed"),
    }
    Ok(())
}

fn run_daemon(settings: &Settings, times: Option<String>) -> Result<()> {
    let spec = times.unwrap_or_else(|| settings.send_times.clone());
    let schedule = Schedule::parse(&spec).context("invalid send times")?;
    let pipeline = build_pipeline(settings);
    let mut engine = ScheduleEngine::new(schedule);
    engine.run(|| {
        pipeline.run_once()?;
        Ok(())
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("LOG_LEVEL", "info"))
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Some(Command::SetPassword { account }) => {
            eprintln!("Paste the password (end with Ctrl-D):");
            let mut secret = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
            let secret = secret.trim();
            if secret.is_empty() {
                return Err(anyhow!("empty password, nothing stored"));
            }
            Secret::from_account(&account).store(secret)?;
            println!("Saved password for {account}");
            Ok(())
        }

        Some(Command::InitConfig) => {
            let path = config_path()?;
            write_template(&path)?;
            println!("Created template config at {}", path.display());
            Ok(())
        }

        Some(Command::NextRun { times, count }) => {
            let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
            let spec = times.unwrap_or_else(|| cfg.send_times().to_string());
            let schedule = Schedule::parse(&spec)?;
            println!("Send times: {schedule}");
            for t in schedule.upcoming(SystemClock.now(), count) {
                println!("{}", t.format("%Y-%m-%d %H:%M"));
            }
            Ok(())
        }

        Some(Command::Run) => {
            let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
            run_once(&cfg.resolve()?)
        }

        Some(Command::Daemon { times }) => {
            let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
            run_daemon(&cfg.resolve()?, times)
        }

        None => {
            let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
            let settings = cfg.resolve()?;
            if settings.continuous {
                run_daemon(&settings, None)
            } else {
                run_once(&settings)
            }
        }
    }
}
