pub mod backend;
pub mod claude_cli;
pub mod coordinator;
pub mod error;
pub mod parser;
pub mod prompts;
pub mod rules;
pub mod specialist;

pub mod test_support;

pub use backend::{PooledBackend, ReasoningBackend};
pub use claude_cli::{ClaudeCliBackend, ClaudeCliConfig};
pub use coordinator::{build_recommendation, weighted_vote, Coordinator, CoordinatorSettings};
pub use error::AgentError;
pub use rules::RuleBasedBackend;
pub use specialist::{SpecialistAgent, SpecialistWorker};
