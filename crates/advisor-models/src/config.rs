use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::request::Domain;

/// Top-level configuration for the advisor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AdvisorConfig {
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub vote: VoteConfig,
}

/// Configuration for the dispatch and worker layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentsConfig {
    /// Overall deadline for one analysis request in seconds.
    pub total_timeout_seconds: u64,
    /// Per-worker budget in seconds (capped by the overall deadline).
    pub specialist_timeout_seconds: u64,
    /// Maximum tool-invocation rounds per worker before a final answer is forced.
    pub max_tool_rounds: u32,
    /// Multiplicative confidence penalty applied per failed tool invocation.
    pub tool_failure_penalty: Decimal,
    pub specialists: Vec<SpecialistConfig>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            total_timeout_seconds: 120,
            specialist_timeout_seconds: 45,
            max_tool_rounds: 6,
            tool_failure_penalty: Decimal::new(15, 2),
            specialists: Domain::ALL
                .iter()
                .map(|d| SpecialistConfig {
                    name: format!("{d}_analyst"),
                    domain: *d,
                    model: None,
                    enabled: true,
                })
                .collect(),
        }
    }
}

/// Configuration for a single specialist worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpecialistConfig {
    pub name: String,
    pub domain: Domain,
    /// Override model for this worker. Falls back to `BackendConfig::model`.
    pub model: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Deterministic local rules over tool payloads.
    #[default]
    Rules,
    /// The `claude` command-line client.
    ClaudeCli,
}

/// Configuration for the reasoning backend shared by all workers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub model: String,
    /// Hosting region, exported to region-scoped backends.
    pub region: Option<String>,
    /// Timeout for a single backend call in seconds.
    pub timeout_seconds: u64,
    /// Maximum concurrent backend calls; 1 serializes access.
    pub max_concurrency: usize,
    /// Executable used by the `claude_cli` backend.
    pub cli_program: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Rules,
            model: "claude-3-5-haiku-latest".to_string(),
            region: None,
            timeout_seconds: 45,
            max_concurrency: 4,
            cli_program: "claude".to_string(),
        }
    }
}

/// Configuration for the data provider cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    /// Maximum number of snapshots kept in memory.
    pub cache_max_capacity: u64,
    /// How long a fetched snapshot is reused, in seconds.
    pub cache_ttl_seconds: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            cache_max_capacity: 1_000,
            cache_ttl_seconds: 300,
        }
    }
}

/// Per-domain multipliers applied to each report's confidence in the comprehensive vote.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VoteConfig {
    pub fundamental: Decimal,
    pub technical: Decimal,
    pub sentiment: Decimal,
    pub risk: Decimal,
}

impl VoteConfig {
    pub fn weight(&self, domain: Domain) -> Decimal {
        match domain {
            Domain::Fundamental => self.fundamental,
            Domain::Technical => self.technical,
            Domain::Sentiment => self.sentiment,
            Domain::Risk => self.risk,
        }
    }
}

impl Default for VoteConfig {
    fn default() -> Self {
        Self {
            fundamental: Decimal::ONE,
            technical: Decimal::ONE,
            sentiment: Decimal::ONE,
            risk: Decimal::ONE,
        }
    }
}

fn default_true() -> bool {
    true
}
