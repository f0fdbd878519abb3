use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use advisor_models::recommendation::OUTPUT_SCHEMA_VERSION;
use advisor_models::{
    AgentsConfig, AnalysisRequest, Domain, DomainReport, FailureKind, Recommendation, Stance,
    VoteConfig, Warning, WorkerOutcome, WorkerTask,
};
use rust_decimal::Decimal;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AgentError;
use crate::specialist::SpecialistAgent;

/// Deadlines applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Overall deadline for one request.
    pub total_timeout: Duration,
    /// Budget for each worker; capped by `total_timeout`.
    pub worker_timeout: Duration,
}

impl CoordinatorSettings {
    pub fn from_config(config: &AgentsConfig) -> Self {
        Self {
            total_timeout: Duration::from_secs(config.total_timeout_seconds),
            worker_timeout: Duration::from_secs(config.specialist_timeout_seconds),
        }
    }

    pub fn worker_budget(&self) -> Duration {
        self.worker_timeout.min(self.total_timeout)
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from_config(&AgentsConfig::default())
    }
}

/// The coordinator fans a request out to one specialist per requested domain
/// and merges their outcomes into a Recommendation.
pub struct Coordinator {
    specialists: BTreeMap<Domain, Arc<dyn SpecialistAgent>>,
    settings: CoordinatorSettings,
    vote: VoteConfig,
}

enum Wait {
    Joined(Result<WorkerOutcome, JoinError>),
    Deadline,
    Cancelled,
}

impl Coordinator {
    /// One specialist per domain; a later specialist for the same domain replaces an earlier one.
    pub fn new(
        specialists: Vec<Arc<dyn SpecialistAgent>>,
        settings: CoordinatorSettings,
        vote: VoteConfig,
    ) -> Self {
        let mut by_domain = BTreeMap::new();
        for specialist in specialists {
            if let Some(previous) = by_domain.insert(specialist.domain(), specialist) {
                warn!(domain = %previous.domain(), replaced = %previous.name(), "Duplicate specialist for domain");
            }
        }
        Self {
            specialists: by_domain,
            settings,
            vote,
        }
    }

    /// Domains with an enabled specialist, in domain order.
    pub fn domains(&self) -> Vec<Domain> {
        self.specialists.keys().copied().collect()
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    pub async fn run(&self, request: &AnalysisRequest) -> Result<Recommendation, AgentError> {
        self.run_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Analyze a request, stopping early if `cancel` fires.
    ///
    /// Only an invalid request or a token cancelled before dispatch is an error;
    /// once workers are running a Recommendation is always returned.
    pub async fn run_with_cancel(
        &self,
        request: &AnalysisRequest,
        cancel: CancellationToken,
    ) -> Result<Recommendation, AgentError> {
        request.validate()?;
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + self.settings.total_timeout;
        let budget = self.settings.worker_budget();
        info!(
            ticker = %request.ticker,
            scope = %request.scope,
            request_id = %request.request_id,
            "Starting analysis"
        );

        let mut outcomes: BTreeMap<Domain, WorkerOutcome> = BTreeMap::new();
        // Dropping this future drops the handles, which aborts every worker.
        let mut handles: Vec<(Domain, AbortOnDropHandle<WorkerOutcome>)> = Vec::new();

        for domain in request.scope.domains() {
            let Some(specialist) = self.specialists.get(&domain) else {
                warn!(domain = %domain, "No enabled specialist for requested domain");
                outcomes.insert(
                    domain,
                    WorkerOutcome::failed(
                        FailureKind::Disabled,
                        format!("no enabled {domain} specialist"),
                    ),
                );
                continue;
            };

            let specialist = Arc::clone(specialist);
            let task = WorkerTask {
                request_id: request.request_id,
                ticker: request.ticker.clone(),
                selection: request.selection.clone(),
                time_budget: budget,
            };
            info!(agent = %specialist.name(), domain = %domain, budget_ms = budget.as_millis(), "Dispatching worker");
            let handle = tokio::spawn(async move { specialist.analyze(&task).await });
            handles.push((domain, AbortOnDropHandle::new(handle)));
        }

        let mut pending = handles.into_iter();
        while let Some((domain, mut handle)) = pending.next() {
            let wait = tokio::select! {
                biased;
                joined = &mut handle => Wait::Joined(joined),
                _ = tokio::time::sleep_until(deadline) => Wait::Deadline,
                _ = cancel.cancelled() => Wait::Cancelled,
            };

            let reason = match wait {
                Wait::Joined(joined) => {
                    outcomes.insert(domain, outcome_from_join(domain, joined));
                    continue;
                }
                Wait::Deadline => "overall deadline reached",
                Wait::Cancelled => "caller cancelled",
            };

            warn!(ticker = %request.ticker, reason, "Aborting outstanding workers");
            handle.abort();
            outcomes.insert(domain, WorkerOutcome::TimedOut);
            for (domain, handle) in pending.by_ref() {
                let outcome = if handle.is_finished() {
                    outcome_from_join(domain, handle.await)
                } else {
                    handle.abort();
                    WorkerOutcome::TimedOut
                };
                outcomes.insert(domain, outcome);
            }
        }

        let recommendation = build_recommendation(request, outcomes, &self.vote, start.elapsed());
        info!(
            ticker = %recommendation.ticker,
            stance = %recommendation.overall_stance,
            reports = recommendation.domain_reports.len(),
            warnings = recommendation.warnings.len(),
            elapsed_ms = recommendation.processing_time_ms,
            "Analysis complete"
        );
        Ok(recommendation)
    }
}

fn outcome_from_join(domain: Domain, joined: Result<WorkerOutcome, JoinError>) -> WorkerOutcome {
    match joined {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => {
            error!(domain = %domain, "Worker task panicked");
            WorkerOutcome::failed(FailureKind::Crashed, "worker task panicked")
        }
        Err(_) => WorkerOutcome::TimedOut,
    }
}

/// Merge worker outcomes into a Recommendation.
///
/// Outcomes for domains outside the request's scope are ignored.
pub fn build_recommendation(
    request: &AnalysisRequest,
    outcomes: BTreeMap<Domain, WorkerOutcome>,
    vote: &VoteConfig,
    elapsed: Duration,
) -> Recommendation {
    let requested = request.scope.domains();
    let mut domain_reports = BTreeMap::new();
    let mut warnings = Vec::new();

    for (domain, outcome) in outcomes {
        if !requested.contains(&domain) {
            continue;
        }
        match outcome {
            WorkerOutcome::Ok(report) => {
                domain_reports.insert(domain, report);
            }
            WorkerOutcome::Failed { kind, detail } => warnings.push(Warning {
                domain,
                kind,
                detail,
            }),
            WorkerOutcome::TimedOut => warnings.push(Warning {
                domain,
                kind: FailureKind::TimedOut,
                detail: "worker did not finish within its time budget".to_string(),
            }),
        }
    }

    let overall_stance = if domain_reports.is_empty() {
        Stance::InsufficientData
    } else if request.scope.is_single_domain() {
        domain_reports
            .values()
            .next()
            .map(DomainReport::signal)
            .unwrap_or(Stance::InsufficientData)
    } else {
        weighted_vote(&domain_reports, vote)
    };

    let rationale = rationale(&domain_reports, &warnings, overall_stance, requested.len());

    Recommendation {
        id: Uuid::new_v4(),
        schema_version: OUTPUT_SCHEMA_VERSION,
        request_id: request.request_id,
        ticker: request.ticker.clone(),
        scope: request.scope,
        decided_at: chrono::Utc::now(),
        domain_reports,
        overall_stance,
        rationale,
        warnings,
        processing_time_ms: elapsed.as_millis() as u64,
    }
}

/// Each report adds `confidence × weight` to its signal; the strict maximum wins
/// and any tie at the top is a hold.
pub fn weighted_vote(reports: &BTreeMap<Domain, DomainReport>, vote: &VoteConfig) -> Stance {
    let mut tallies: BTreeMap<Stance, Decimal> = BTreeMap::new();
    for (domain, report) in reports {
        *tallies.entry(report.signal()).or_default() += report.confidence * vote.weight(*domain);
    }

    let Some(top) = tallies.values().copied().max() else {
        return Stance::InsufficientData;
    };
    let mut leaders = tallies.iter().filter(|(_, tally)| **tally == top);
    match (leaders.next(), leaders.next()) {
        (Some((stance, _)), None) => *stance,
        _ => Stance::Hold,
    }
}

fn rationale(
    reports: &BTreeMap<Domain, DomainReport>,
    warnings: &[Warning],
    stance: Stance,
    requested: usize,
) -> String {
    let mut lines: Vec<String> = if reports.is_empty() {
        warnings
            .iter()
            .map(|w| format!("{}: {} ({})", w.domain, w.kind, w.detail))
            .collect()
    } else {
        reports
            .iter()
            .map(|(domain, report)| {
                format!(
                    "{domain} ({}, confidence {}): {}",
                    report.signal(),
                    report.confidence,
                    report.narrative
                )
            })
            .collect()
    };
    lines.push(format!(
        "Overall: {stance} from {} of {requested} requested domains.",
        reports.len()
    ));
    lines.join("\n")
}
