pub mod agent_message;
pub mod config;
pub mod market_data;
pub mod recommendation;
pub mod report;
pub mod request;

pub use agent_message::{
    BackendReply, Conversation, ConversationTurn, OperationSpec, ToolInvocation, WorkerTask,
};
pub use config::{
    AdvisorConfig, AgentsConfig, BackendConfig, BackendKind, DataConfig, SpecialistConfig,
    VoteConfig,
};
pub use market_data::{
    AnalystRating, BandPosition, Benchmark, EarningsSurprise, Financials, RiskLevel, RiskProfile,
    SentimentSnapshot, SentimentTrend, TechnicalSnapshot, Trend, VolumeTrend,
};
pub use recommendation::{Recommendation, Stance, Warning};
pub use report::{Direction, DomainReport, FailureKind, Finding, ToolResult, ToolStatus, WorkerOutcome};
pub use request::{AnalysisRequest, BackendSelection, Domain, RequestError, Scope};
