use std::path::PathBuf;
use std::sync::Arc;

use advisor::models::{BackendSelection, Scope};
use advisor::render::{render_json, render_text};
use advisor::router::{self, TickerOutcome};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "analyze", about = "Multi-agent trading analysis")]
struct Cli {
    /// Ticker symbols to analyze
    #[arg(required = true)]
    tickers: Vec<String>,

    /// Analysis scope: fundamental, technical, sentiment, risk or comprehensive
    #[arg(short = 't', long = "type", default_value = "comprehensive")]
    scope: Scope,

    /// Hosting region passed to region-scoped backends
    #[arg(short, long)]
    region: Option<String>,

    /// Model override for this run
    #[arg(long)]
    model: Option<String>,

    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Log line format on stderr (respects RUST_LOG)
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = advisor::load_config(cli.config.as_deref())?;
    advisor::ensure_backend_available(&config.backend)
        .await
        .context("Reasoning backend unavailable")?;
    let coordinator =
        Arc::new(advisor::build_coordinator(&config).context("Failed to build coordinator")?);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; returning partial results");
            on_interrupt.cancel();
        }
    });

    let selection = BackendSelection {
        region: cli.region.clone(),
        model: cli.model.clone(),
    };
    let results = router::run_batch(coordinator, &cli.tickers, cli.scope, &selection, cancel).await;

    let mut printed = 0;
    for result in &results {
        match &result.outcome {
            TickerOutcome::Analyzed(rec) => {
                match cli.format {
                    OutputFormat::Text => {
                        if printed > 0 {
                            println!();
                        }
                        print!("{}", render_text(rec));
                    }
                    OutputFormat::Json => println!(
                        "{}",
                        render_json(rec, cli.pretty).context("Failed to serialize recommendation")?
                    ),
                }
                printed += 1;
            }
            TickerOutcome::Rejected(e) => eprintln!("{}: {e}", result.input),
            TickerOutcome::Failed(e) => eprintln!("{}: analysis failed: {e}", result.input),
        }
    }

    std::process::exit(router::exit_code(&results));
}
