//! Test doubles for workers and reasoning backends.
//!
//! `ScriptedBackend` replays a fixed list of replies and records every
//! conversation it was shown. `MockSpecialist` skips the backend entirely and
//! returns a canned outcome, optionally after a delay or by panicking.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use advisor_models::{
    BackendReply, BackendSelection, Conversation, Direction, Domain, DomainReport, FailureKind,
    Finding, OperationSpec, Stance, ToolInvocation, WorkerOutcome, WorkerTask,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::backend::ReasoningBackend;
use crate::error::AgentError;
use crate::specialist::SpecialistAgent;

/// A worker task for `ticker` with a generous budget.
pub fn sample_task(ticker: &str) -> WorkerTask {
    WorkerTask {
        request_id: Uuid::new_v4(),
        ticker: ticker.to_string(),
        selection: BackendSelection::default(),
        time_budget: Duration::from_secs(5),
    }
}

/// An empty AAPL conversation for `domain`.
pub fn sample_conversation(domain: Domain) -> Conversation {
    Conversation::new(&sample_task("AAPL"), domain)
}

pub fn invoke(tool: &str, ticker: &str) -> BackendReply {
    BackendReply::Invoke(ToolInvocation {
        tool: tool.to_string(),
        params: serde_json::json!({ "ticker": ticker }),
    })
}

/// Findings whose net direction produces `signal`.
pub fn findings_for(signal: Stance) -> Vec<Finding> {
    let direction = match signal {
        Stance::Buy => Direction::Bullish,
        Stance::Sell => Direction::Bearish,
        Stance::Hold | Stance::InsufficientData => Direction::Neutral,
    };
    vec![Finding {
        metric: "mock".to_string(),
        observation: format!("mock {signal} evidence"),
        direction,
        value: None,
    }]
}

/// A final answer leaning toward `signal` at `confidence`.
pub fn final_answer(signal: Stance, confidence: &str) -> BackendReply {
    BackendReply::Final(serde_json::json!({
        "findings": findings_for(signal),
        "narrative": format!("Scripted {signal} view."),
        "confidence": confidence,
    }))
}

pub fn report_with(domain: Domain, signal: Stance, confidence: Decimal) -> DomainReport {
    DomainReport {
        domain,
        findings: findings_for(signal),
        narrative: format!("Mock {domain} analysis"),
        confidence,
        tools_used: BTreeSet::new(),
    }
}

enum Script {
    Replies(VecDeque<BackendReply>),
    Fail(String),
    Timeout(u64),
}

/// A reasoning backend that replays scripted replies in order.
pub struct ScriptedBackend {
    script: Mutex<Script>,
    delay: Option<Duration>,
    delay_from_call: usize,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    seen: Mutex<Vec<(usize, Conversation)>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<BackendReply>) -> Self {
        Self::with_script(Script::Replies(replies.into()))
    }

    /// `count` identical hold answers.
    pub fn finals(count: usize) -> Self {
        Self::new(
            (0..count)
                .map(|_| final_answer(Stance::Hold, "0.50"))
                .collect(),
        )
    }

    /// Every call fails with a backend error carrying `message`.
    pub fn failing(message: &str) -> Self {
        Self::with_script(Script::Fail(message.to_string()))
    }

    /// Every call fails as if the backend's own call timeout of `seconds` elapsed.
    pub fn timing_out(seconds: u64) -> Self {
        Self::with_script(Script::Timeout(seconds))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            delay: None,
            delay_from_call: 0,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Delay only the calls numbered `first_call` (zero-based) and later.
    pub fn with_delay_from(mut self, first_call: usize, delay: Duration) -> Self {
        self.delay = Some(delay);
        self.delay_from_call = first_call;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of `complete` calls observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Conversations in the order they were received.
    pub async fn conversations(&self) -> Vec<Conversation> {
        self.seen.lock().await.iter().map(|(_, c)| c.clone()).collect()
    }

    /// Number of operations offered on each call.
    pub async fn operations_offered(&self) -> Vec<usize> {
        self.seen.lock().await.iter().map(|(n, _)| *n).collect()
    }
}

#[async_trait]
impl ReasoningBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        _instructions: &str,
        operations: &[OperationSpec],
        conversation: &Conversation,
    ) -> Result<BackendReply, AgentError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.seen
            .lock()
            .await
            .push((operations.len(), conversation.clone()));

        if let Some(delay) = self.delay.filter(|_| call >= self.delay_from_call) {
            tokio::time::sleep(delay).await;
        }

        let reply = match &mut *self.script.lock().await {
            Script::Replies(replies) => replies
                .pop_front()
                .ok_or_else(|| AgentError::Backend("script exhausted".to_string())),
            Script::Fail(message) => Err(AgentError::Backend(message.clone())),
            Script::Timeout(seconds) => Err(AgentError::Timeout(*seconds)),
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}

enum Behavior {
    Outcome(WorkerOutcome),
    Panic,
}

/// Mock specialist for testing the coordinator without any backend.
pub struct MockSpecialist {
    name: String,
    domain: Domain,
    behavior: Behavior,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    completions: Arc<AtomicUsize>,
}

impl MockSpecialist {
    fn with_behavior(domain: Domain, behavior: Behavior) -> Self {
        Self {
            name: format!("{domain}_analyst"),
            domain,
            behavior,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            completions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns a report with the given signal and confidence.
    pub fn reporting(domain: Domain, signal: Stance, confidence: Decimal) -> Self {
        Self::with_behavior(
            domain,
            Behavior::Outcome(WorkerOutcome::Ok(report_with(domain, signal, confidence))),
        )
    }

    pub fn failing(domain: Domain, kind: FailureKind) -> Self {
        Self::with_behavior(
            domain,
            Behavior::Outcome(WorkerOutcome::failed(kind, format!("mock {kind}"))),
        )
    }

    pub fn timing_out(domain: Domain) -> Self {
        Self::with_behavior(domain, Behavior::Outcome(WorkerOutcome::TimedOut))
    }

    pub fn panicking(domain: Domain) -> Self {
        Self::with_behavior(domain, Behavior::Panic)
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared counter of `analyze` calls; stays valid after the mock is moved.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Shared counter of `analyze` calls that got past their delay.
    pub fn completion_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.completions)
    }
}

#[async_trait]
impl SpecialistAgent for MockSpecialist {
    fn name(&self) -> &str {
        &self.name
    }

    fn domain(&self) -> Domain {
        self.domain
    }

    async fn analyze(&self, _task: &WorkerTask) -> WorkerOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.completions.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Outcome(outcome) => outcome.clone(),
            Behavior::Panic => panic!("mock {} specialist panicked", self.domain),
        }
    }
}
