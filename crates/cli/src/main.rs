//! `vidgen` -- submit one video generation job and follow it to the end.
//!
//! Reads service settings from the environment (see
//! [`InferenceConfig::from_env`]), submits the job described by the
//! command-line arguments, logs progress as it changes and prints the
//! result URL on success. Ctrl-C cancels polling and exits.
//!
//! # Environment variables
//!
//! | Variable     | Default | Description                               |
//! |--------------|---------|-------------------------------------------|
//! | `RUST_LOG`   | --      | Log filter, e.g. `vidgen_inference=debug` |
//! | `LOG_FORMAT` | `text`  | `json` for one JSON object per log line   |

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vidgen_cli::{follow, parse_args, Invocation, USAGE};
use vidgen_core::state::JobPhase;
use vidgen_inference::config::InferenceConfig;
use vidgen_inference::controller::JobController;

const DEFAULT_LOG_FILTER: &str = "vidgen_cli=info,vidgen_inference=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(Invocation::Run(args)) => args,
        Ok(Invocation::Help) => {
            println!("{USAGE}");
            return Ok(());
        }
        Err(e) => {
            eprintln!("{e}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    let config = InferenceConfig::from_env().context("Invalid configuration")?;
    let request = args.load_request()?;

    tracing::info!(
        api_url = %config.api_url,
        fallback_policy = ?config.fallback_policy,
        kind = request.kind().as_str(),
        "Starting vidgen",
    );

    let controller = JobController::with_http(&config);
    let mut states = controller.subscribe();

    let run = async {
        controller.submit(request).await?;
        Ok::<_, anyhow::Error>(follow(&mut states).await)
    };

    let final_state = tokio::select! {
        result = run => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, cancelling job");
            controller.cancel().await;
            return Ok(());
        }
    };

    match final_state.phase() {
        JobPhase::Succeeded => {
            println!("{}", final_state.result_url().unwrap_or_default());
            Ok(())
        }
        JobPhase::Failed => {
            let message = final_state
                .error()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "unknown error".to_string());
            anyhow::bail!("Video generation failed: {message}")
        }
        phase => anyhow::bail!("Job ended unexpectedly in phase {phase:?}"),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
