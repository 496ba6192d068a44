use std::{fs, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    AbOverride, CsrfTokenSource, FlowConfig, FlowController, FlowEvent, SessionCookies, Step,
    SubmissionClient, SubmissionConfig, WizardSession, DEFAULT_PLAN_PRICE_CENTS,
};
use tracing::warn;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:8443")]
    server_url: String,
    #[arg(long, default_value_t = 12_000)]
    timeout_ms: u64,
    #[arg(long, default_value_t = DEFAULT_PLAN_PRICE_CENTS)]
    plan_price_cents: u32,
    /// A, B, clear or reset
    #[arg(long)]
    ab: Option<AbOverride>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the anti-forgery cookie and report whether one was issued.
    Prime,
    /// Replay a JSON array of flow events against the server.
    Run { script: PathBuf },
}

fn describe(step: &Step) -> String {
    match step {
        Step::OfferAb(offer) => format!(
            "{} (variant {}, {} -> {} cents)",
            step.kind(),
            offer.variant.as_str(),
            offer.base_price_cents,
            offer.discounted_price_cents
        ),
        Step::OfferAccepted(acceptance) => format!(
            "{} ({} cents per month)",
            step.kind(),
            acceptance.discounted_price_cents
        ),
        _ => match step.status().and_then(|status| status.error.as_deref()) {
            Some(error) => format!("{} [error: {error}]", step.kind()),
            None => step.kind().to_string(),
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();

    let cookies = SessionCookies::new();
    let config = SubmissionConfig::new(&cli.server_url)?
        .with_timeout(Duration::from_millis(cli.timeout_ms));
    let client = SubmissionClient::new(config, cookies.clone())?;
    client.prime().await?;

    match cli.command {
        Command::Prime => {
            let issued = cookies.cookie_token().is_some();
            println!("csrf cookie issued={issued}");
        }
        Command::Run { script } => {
            let raw = fs::read_to_string(&script)
                .with_context(|| format!("failed to read script '{}'", script.display()))?;
            let events: Vec<FlowEvent> =
                serde_json::from_str(&raw).context("script must be a JSON array of flow events")?;

            let controller = FlowController::new(
                FlowConfig {
                    plan_price_cents: cli.plan_price_cents,
                    ab_override: cli.ab,
                },
                cookies,
            );
            let mut session = WizardSession::new(controller, Arc::new(client));
            for event in events {
                let name = event.name();
                match session.dispatch(event).await {
                    Ok(_) => println!("{name:>16} -> {}", describe(session.step())),
                    Err(err) => {
                        warn!(event = name, error = %err, "event rejected");
                        println!("{name:>16} !! {err}");
                    }
                }
            }
        }
    }

    Ok(())
}
