use anyhow::Context;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use inbox_assist::config::EngineConfig;
use inbox_assist::pipeline::EmailAssistant;
use inbox_assist::pipeline::types::{EmailRecord, Tone};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries one JSON document per line.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = EngineConfig::from_env().context("Failed to load configuration")?;

    let tone: Tone = match std::env::var("INBOX_ASSIST_REPLY_TONE") {
        Ok(raw) => raw
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
            .context("Invalid INBOX_ASSIST_REPLY_TONE")?,
        Err(_) => Tone::default(),
    };

    eprintln!("Inbox Assist v{}", env!("CARGO_PKG_VERSION"));
    if config.model.enabled {
        eprintln!("   Model: {} at {}", config.model.model, config.model.base_url);
    } else {
        eprintln!("   Model: disabled (keyword rules and templates only)");
    }
    eprintln!("   Reply tone: {tone}");
    eprintln!("   Reading JSON lines from stdin (sender, subject, body).\n");

    let assistant =
        EmailAssistant::from_config(&config).context("Failed to build email assistant")?;
    if let Err(e) = assistant.check_model().await {
        warn!(error = %e, "Model endpoint not reachable, replies will use keyword rules and templates");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut emails = Vec::new();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let email: EmailRecord = match serde_json::from_str(&line) {
            Ok(email) => email,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping invalid email record");
                continue;
            }
        };

        let outcome = assistant.triage(&email, tone).await;
        println!(
            "{}",
            json!({
                "sender": email.sender(),
                "subject": email.subject(),
                "classification": outcome.classification,
                "response": outcome.response,
            })
        );
        emails.push(email);
    }

    let summary = assistant.summarize(&emails).await;
    println!("{}", json!({ "summary": summary }));

    Ok(())
}
