use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use advisor_models::{
    AgentsConfig, BackendReply, Conversation, ConversationTurn, Domain, DomainReport,
    FailureKind, OperationSpec, SpecialistConfig, ToolInvocation, ToolResult, WorkerOutcome,
    WorkerTask,
};
use advisor_tools::ToolRegistry;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::backend::ReasoningBackend;
use crate::error::AgentError;
use crate::parser::parse_domain_report;
use crate::prompts::instructions_for;

/// Trait for specialist agents. Mockable for testing.
///
/// `analyze` never fails: every problem is folded into the returned outcome.
#[async_trait]
pub trait SpecialistAgent: Send + Sync {
    fn name(&self) -> &str;
    fn domain(&self) -> Domain;

    async fn analyze(&self, task: &WorkerTask) -> WorkerOutcome;
}

/// A specialist that drives a reasoning backend through rounds of tool calls.
pub struct SpecialistWorker {
    name: String,
    domain: Domain,
    model: Option<String>,
    registry: Arc<ToolRegistry>,
    backend: Arc<dyn ReasoningBackend>,
    max_tool_rounds: u32,
    tool_failure_penalty: Decimal,
}

impl SpecialistWorker {
    pub fn new(
        name: impl Into<String>,
        domain: Domain,
        registry: Arc<ToolRegistry>,
        backend: Arc<dyn ReasoningBackend>,
    ) -> Self {
        let defaults = AgentsConfig::default();
        Self {
            name: name.into(),
            domain,
            model: None,
            registry,
            backend,
            max_tool_rounds: defaults.max_tool_rounds,
            tool_failure_penalty: defaults.tool_failure_penalty,
        }
    }

    pub fn from_config(
        specialist: &SpecialistConfig,
        agents: &AgentsConfig,
        registry: Arc<ToolRegistry>,
        backend: Arc<dyn ReasoningBackend>,
    ) -> Self {
        Self::new(specialist.name.clone(), specialist.domain, registry, backend)
            .with_model(specialist.model.clone())
            .with_limits(agents.max_tool_rounds, agents.tool_failure_penalty)
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_limits(mut self, max_tool_rounds: u32, tool_failure_penalty: Decimal) -> Self {
        self.max_tool_rounds = max_tool_rounds;
        self.tool_failure_penalty = tool_failure_penalty;
        self
    }

    async fn run_rounds(&self, task: &WorkerTask) -> Result<DomainReport, AgentError> {
        let instructions = instructions_for(self.domain);
        let operations = self.registry.operations_for(self.domain);

        let mut conversation = Conversation::new(task, self.domain);
        if let Some(model) = &self.model {
            conversation
                .selection
                .model
                .get_or_insert_with(|| model.clone());
        }
        conversation.tools_exhausted = self.max_tool_rounds == 0;

        let mut tools_used = BTreeSet::new();
        let mut failed_calls = 0u32;

        loop {
            let offered: &[OperationSpec] = if conversation.tools_exhausted {
                &[]
            } else {
                &operations
            };
            let reply = self
                .backend
                .complete(&instructions, offered, &conversation)
                .await?;

            let invocation = match reply {
                BackendReply::Final(answer) => {
                    let mut report = parse_domain_report(self.domain, &answer, tools_used)?;
                    report.confidence = degrade(
                        report.confidence,
                        self.tool_failure_penalty,
                        failed_calls,
                    );
                    return Ok(report);
                }
                BackendReply::Invoke(invocation) => invocation,
            };

            if conversation.tools_exhausted {
                return Err(AgentError::Parse(format!(
                    "backend requested {:?} after the {}-round tool limit",
                    invocation.tool, self.max_tool_rounds
                )));
            }

            let (result, own_tool) = self.run_tool(&invocation).await;
            debug!(
                agent = %self.name,
                round = conversation.turns.len() + 1,
                tool = %invocation.tool,
                failed = result.is_error(),
                "Tool round complete"
            );
            if own_tool {
                tools_used.insert(invocation.tool.clone());
            }
            if result.is_error() {
                failed_calls += 1;
            }
            conversation.turns.push(ConversationTurn { invocation, result });

            if conversation.turns.len() >= self.max_tool_rounds as usize {
                conversation.tools_exhausted = true;
            }
        }
    }

    /// Run one requested tool, resolved only within this worker's domain.
    ///
    /// The flag is true when the tool belongs to the domain, whether or not it succeeded.
    async fn run_tool(&self, invocation: &ToolInvocation) -> (ToolResult, bool) {
        let tool = match self.registry.lookup(self.domain, &invocation.tool) {
            Ok(tool) => tool,
            Err(e) => {
                warn!(agent = %self.name, tool = %invocation.tool, "Backend requested a tool outside its domain");
                return (ToolResult::error(e.to_string()), false);
            }
        };
        match tool.invoke(&invocation.params).await {
            Ok(result) => (result, true),
            Err(e) => {
                warn!(agent = %self.name, tool = %invocation.tool, error = %e, "Tool failed");
                (ToolResult::error(e.to_string()), true)
            }
        }
    }
}

/// Apply `penalty` once per failed tool call: `confidence × (1 − penalty)^failures`.
pub fn degrade(confidence: Decimal, penalty: Decimal, failures: u32) -> Decimal {
    let keep = Decimal::ONE - penalty;
    (0..failures)
        .fold(confidence, |c, _| c * keep)
        .round_dp(4)
        .clamp(Decimal::ZERO, Decimal::ONE)
}

#[async_trait]
impl SpecialistAgent for SpecialistWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn domain(&self) -> Domain {
        self.domain
    }

    async fn analyze(&self, task: &WorkerTask) -> WorkerOutcome {
        let start = Instant::now();
        match tokio::time::timeout(task.time_budget, self.run_rounds(task)).await {
            Err(_) => {
                warn!(
                    agent = %self.name,
                    ticker = %task.ticker,
                    budget_ms = task.time_budget.as_millis(),
                    "Worker exceeded its time budget"
                );
                WorkerOutcome::TimedOut
            }
            Ok(Err(AgentError::Timeout(seconds))) => {
                warn!(
                    agent = %self.name,
                    ticker = %task.ticker,
                    backend_timeout_s = seconds,
                    "Backend call timed out"
                );
                WorkerOutcome::TimedOut
            }
            Ok(Ok(report)) => {
                info!(
                    agent = %self.name,
                    ticker = %task.ticker,
                    confidence = %report.confidence,
                    signal = %report.signal(),
                    elapsed_ms = start.elapsed().as_millis(),
                    "Worker produced report"
                );
                WorkerOutcome::Ok(report)
            }
            Ok(Err(e)) => {
                let kind = e.failure_kind().unwrap_or(FailureKind::BackendUnavailable);
                warn!(
                    agent = %self.name,
                    ticker = %task.ticker,
                    kind = %kind,
                    error = %e,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Worker failed"
                );
                WorkerOutcome::failed(kind, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleBasedBackend;
    use crate::test_support::{final_answer, invoke, sample_task, ScriptedBackend};
    use advisor_models::Stance;
    use advisor_tools::domains::{fundamental, risk, technical};
    use advisor_tools::{builtin_registry, MockDataProvider};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(builtin_registry(Arc::new(MockDataProvider::new())).unwrap())
    }

    fn worker(domain: Domain, backend: Arc<dyn ReasoningBackend>) -> SpecialistWorker {
        SpecialistWorker::new(format!("{domain}_analyst"), domain, registry(), backend)
    }

    #[test]
    fn degrade_compounds_per_failure() {
        assert_eq!(degrade(dec!(0.80), dec!(0.15), 0), dec!(0.80));
        assert_eq!(degrade(dec!(0.80), dec!(0.15), 1), dec!(0.68));
        assert_eq!(degrade(dec!(0.80), dec!(0.15), 2), dec!(0.578));
    }

    #[tokio::test]
    async fn rules_backend_uses_both_domain_tools() {
        let worker = worker(Domain::Risk, Arc::new(RuleBasedBackend::new()));
        let outcome = worker.analyze(&sample_task("JPM")).await;

        let WorkerOutcome::Ok(report) = outcome else {
            panic!("expected report");
        };
        assert_eq!(report.domain, Domain::Risk);
        let expected: BTreeSet<String> = [
            risk::CALCULATE_RISK_METRICS.to_string(),
            risk::PORTFOLIO_IMPACT_ANALYSIS.to_string(),
        ]
        .into();
        assert_eq!(report.tools_used, expected);
        assert!(report.confidence <= Decimal::ONE);
    }

    #[tokio::test]
    async fn scripted_tool_round_then_final() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            invoke(technical::IDENTIFY_PATTERNS, "NVDA"),
            final_answer(Stance::Buy, "0.75"),
        ]));
        let worker = worker(Domain::Technical, backend.clone());
        let outcome = worker.analyze(&sample_task("NVDA")).await;

        let WorkerOutcome::Ok(report) = outcome else {
            panic!("expected report");
        };
        assert_eq!(report.confidence, dec!(0.75));
        assert_eq!(report.signal(), Stance::Buy);
        assert!(report.tools_used.contains(technical::IDENTIFY_PATTERNS));

        let seen = backend.conversations().await;
        assert_eq!(seen.len(), 2);
        assert!(seen[0].turns.is_empty());
        assert_eq!(seen[1].turns.len(), 1);
        assert!(!seen[1].turns[0].result.is_error());
    }

    #[tokio::test]
    async fn foreign_tool_is_not_run_and_degrades_confidence() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            invoke(fundamental::GET_COMPANY_FINANCIALS, "AAPL"),
            final_answer(Stance::Hold, "0.80"),
        ]));
        let worker = worker(Domain::Technical, backend.clone());
        let outcome = worker.analyze(&sample_task("AAPL")).await;

        let WorkerOutcome::Ok(report) = outcome else {
            panic!("expected report");
        };
        assert!(report.tools_used.is_empty());
        assert_eq!(report.confidence, dec!(0.68));

        let seen = backend.conversations().await;
        assert!(seen[1].turns[0].result.is_error());
    }

    #[tokio::test]
    async fn invalid_params_count_as_failed_round() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            BackendReply::Invoke(ToolInvocation {
                tool: risk::PORTFOLIO_IMPACT_ANALYSIS.to_string(),
                params: serde_json::json!({"ticker": "KO", "position_size": 4.0}),
            }),
            final_answer(Stance::Sell, "0.60"),
        ]));
        let worker = worker(Domain::Risk, backend);
        let WorkerOutcome::Ok(report) = worker.analyze(&sample_task("KO")).await else {
            panic!("expected report");
        };
        assert!(report.tools_used.contains(risk::PORTFOLIO_IMPACT_ANALYSIS));
        assert_eq!(report.confidence, dec!(0.51));
    }

    #[tokio::test]
    async fn round_ceiling_forces_final_answer() {
        let mut script: Vec<BackendReply> = (0..3)
            .map(|_| invoke(technical::GET_PRICE_HISTORY, "TSLA"))
            .collect();
        script.push(final_answer(Stance::Hold, "0.50"));
        let backend = Arc::new(ScriptedBackend::new(script));
        let worker = worker(Domain::Technical, backend.clone())
            .with_limits(3, dec!(0.15));

        let outcome = worker.analyze(&sample_task("TSLA")).await;
        assert!(outcome.is_ok(), "{outcome:?}");

        let seen = backend.conversations().await;
        assert_eq!(seen.len(), 4);
        assert!(seen[3].tools_exhausted);
        assert_eq!(backend.operations_offered().await, vec![2, 2, 2, 0]);
    }

    #[tokio::test]
    async fn tool_request_after_ceiling_is_malformed() {
        let script: Vec<BackendReply> = (0..3)
            .map(|_| invoke(technical::GET_PRICE_HISTORY, "TSLA"))
            .collect();
        let worker = worker(Domain::Technical, Arc::new(ScriptedBackend::new(script)))
            .with_limits(2, dec!(0.15));

        let outcome = worker.analyze(&sample_task("TSLA")).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::MalformedReport));
    }

    #[tokio::test]
    async fn unparseable_final_is_malformed() {
        let backend = Arc::new(ScriptedBackend::new(vec![BackendReply::Final(
            serde_json::json!({"findings": "lots", "narrative": "x", "confidence": "0.5"}),
        )]));
        let outcome = worker(Domain::Sentiment, backend)
            .analyze(&sample_task("AMZN"))
            .await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::MalformedReport));
    }

    #[tokio::test]
    async fn backend_error_is_unavailable() {
        let backend = Arc::new(ScriptedBackend::failing("connection refused"));
        let outcome = worker(Domain::Fundamental, backend)
            .analyze(&sample_task("AAPL"))
            .await;
        match outcome {
            WorkerOutcome::Failed { kind, detail } => {
                assert_eq!(kind, FailureKind::BackendUnavailable);
                assert!(detail.contains("connection refused"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exceeding_budget_times_out() {
        let backend = Arc::new(
            ScriptedBackend::new(vec![final_answer(Stance::Buy, "0.9")])
                .with_delay(Duration::from_millis(200)),
        );
        let mut task = sample_task("AAPL");
        task.time_budget = Duration::from_millis(20);

        let outcome = worker(Domain::Fundamental, backend).analyze(&task).await;
        assert_eq!(outcome, WorkerOutcome::TimedOut);
    }

    #[tokio::test]
    async fn slow_final_answer_discards_completed_rounds() {
        let backend = Arc::new(
            ScriptedBackend::new(vec![
                invoke(technical::GET_PRICE_HISTORY, "AAPL"),
                invoke(technical::IDENTIFY_PATTERNS, "AAPL"),
                final_answer(Stance::Buy, "0.9"),
            ])
            .with_delay_from(2, Duration::from_millis(500)),
        );
        let mut task = sample_task("AAPL");
        task.time_budget = Duration::from_millis(100);

        let outcome = worker(Domain::Technical, backend.clone())
            .analyze(&task)
            .await;
        assert_eq!(outcome, WorkerOutcome::TimedOut);
        assert_eq!(backend.calls(), 3);
        let seen = backend.conversations().await;
        assert_eq!(seen[2].turns.len(), 2);
    }

    #[tokio::test]
    async fn backend_call_timeout_is_a_timed_out_outcome() {
        let backend = Arc::new(ScriptedBackend::timing_out(45));
        let outcome = worker(Domain::Risk, backend)
            .analyze(&sample_task("AAPL"))
            .await;
        assert_eq!(outcome, WorkerOutcome::TimedOut);
    }

    #[tokio::test]
    async fn worker_model_fills_missing_selection() {
        let backend = Arc::new(ScriptedBackend::new(vec![final_answer(Stance::Hold, "0.5")]));
        let worker = worker(Domain::Fundamental, backend.clone())
            .with_model(Some("claude-sonnet-4-5".to_string()));
        assert!(worker.analyze(&sample_task("AAPL")).await.is_ok());

        let seen = backend.conversations().await;
        assert_eq!(seen[0].selection.model.as_deref(), Some("claude-sonnet-4-5"));
    }
}
