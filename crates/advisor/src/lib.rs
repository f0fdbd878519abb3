//! Hierarchical multi-agent trading analysis.
//!
//! A coordinator fans one analysis request out to fundamental, technical,
//! sentiment and risk specialists, each of which drives a reasoning backend
//! over its own domain's tools, and votes their reports into one
//! recommendation.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use advisor::models::{AdvisorConfig, AnalysisRequest, BackendSelection, Scope};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let coordinator = advisor::build_coordinator(&AdvisorConfig::default())?;
//! let request = AnalysisRequest::new("AAPL", Scope::Comprehensive, BackendSelection::default())?;
//! let recommendation = coordinator.run(&request).await?;
//! println!("{}", advisor::render::render_text(&recommendation));
//! # Ok(())
//! # }
//! ```

pub use advisor_agents as agents;
pub use advisor_models as models;
pub use advisor_tools as tools;

pub mod render;
pub mod router;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use advisor_agents::claude_cli::check_program_available;
use advisor_agents::{
    ClaudeCliBackend, ClaudeCliConfig, Coordinator, CoordinatorSettings, PooledBackend,
    ReasoningBackend, RuleBasedBackend, SpecialistAgent, SpecialistWorker,
};
use advisor_models::{AdvisorConfig, BackendConfig, BackendKind};
use advisor_tools::{builtin_registry, CachedProvider, MockDataProvider};
use anyhow::Context;
use tracing::info;

/// Read configuration from `path`, or fall back to defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<AdvisorConfig, anyhow::Error> {
    let Some(path) = path else {
        return Ok(AdvisorConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    parse_config(&raw).with_context(|| format!("Failed to parse config: {}", path.display()))
}

pub fn parse_config(raw: &str) -> Result<AdvisorConfig, anyhow::Error> {
    Ok(toml::from_str(raw)?)
}

/// The reasoning backend named by `config`, wrapped in its concurrency pool.
pub fn build_backend(config: &BackendConfig) -> Arc<PooledBackend> {
    let inner: Arc<dyn ReasoningBackend> = match config.kind {
        BackendKind::Rules => Arc::new(RuleBasedBackend::new()),
        BackendKind::ClaudeCli => Arc::new(ClaudeCliBackend::new(ClaudeCliConfig {
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
            region: config.region.clone(),
            program: config.cli_program.clone(),
        })),
    };
    Arc::new(PooledBackend::new(inner, config.max_concurrency))
}

/// Fail fast when the configured backend cannot run on this host.
pub async fn ensure_backend_available(config: &BackendConfig) -> Result<(), anyhow::Error> {
    match config.kind {
        BackendKind::Rules => Ok(()),
        BackendKind::ClaudeCli => {
            if check_program_available(&config.cli_program).await {
                Ok(())
            } else {
                anyhow::bail!(
                    "`{} --version` failed; install the CLI or set [backend] kind = \"rules\"",
                    config.cli_program
                )
            }
        }
    }
}

/// Build a Coordinator from configuration.
pub fn build_coordinator(config: &AdvisorConfig) -> Result<Coordinator, anyhow::Error> {
    let provider = CachedProvider::new(
        MockDataProvider::new(),
        config.data.cache_max_capacity,
        Duration::from_secs(config.data.cache_ttl_seconds),
    );
    let registry = Arc::new(
        builtin_registry(Arc::new(provider)).context("Failed to register built-in tools")?,
    );
    let backend = build_backend(&config.backend);
    let shared: Arc<dyn ReasoningBackend> = backend.clone();

    let specialists: Vec<Arc<dyn SpecialistAgent>> = config
        .agents
        .specialists
        .iter()
        .filter(|s| s.enabled)
        .map(|s| {
            Arc::new(SpecialistWorker::from_config(
                s,
                &config.agents,
                Arc::clone(&registry),
                Arc::clone(&shared),
            )) as Arc<dyn SpecialistAgent>
        })
        .collect();

    info!(
        backend = backend.name(),
        specialists = specialists.len(),
        tools = registry.len(),
        "Coordinator ready"
    );

    Ok(Coordinator::new(
        specialists,
        CoordinatorSettings::from_config(&config.agents),
        config.vote.clone(),
    ))
}
