//! Request routing for batches of tickers.
//!
//! Every ticker is validated on its own and, when valid, analyzed as an
//! independent coordinator run. One ticker's rejection or failure never blocks
//! the others, and results come back in input order.

use std::sync::Arc;

use advisor_agents::Coordinator;
use advisor_models::{AnalysisRequest, BackendSelection, Recommendation, RequestError, Scope};
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{info, warn};

/// What happened to one ticker of a batch.
#[derive(Debug)]
pub enum TickerOutcome {
    Analyzed(Recommendation),
    /// The ticker failed validation and was never dispatched.
    Rejected(RequestError),
    /// The run itself errored (cancelled before dispatch or the task died).
    Failed(String),
}

#[derive(Debug)]
pub struct TickerResult {
    /// The ticker as the caller supplied it.
    pub input: String,
    pub outcome: TickerOutcome,
}

/// Validate each raw ticker into a request sharing `scope` and `selection`.
pub fn build_requests(
    tickers: &[String],
    scope: Scope,
    selection: &BackendSelection,
) -> Vec<(String, Result<AnalysisRequest, RequestError>)> {
    tickers
        .iter()
        .map(|raw| {
            (
                raw.clone(),
                AnalysisRequest::new(raw, scope, selection.clone()),
            )
        })
        .collect()
}

/// Analyze every valid ticker concurrently.
pub async fn run_batch(
    coordinator: Arc<Coordinator>,
    tickers: &[String],
    scope: Scope,
    selection: &BackendSelection,
    cancel: CancellationToken,
) -> Vec<TickerResult> {
    let mut pending = Vec::with_capacity(tickers.len());
    for (input, request) in build_requests(tickers, scope, selection) {
        match request {
            Ok(request) => {
                info!(ticker = %request.ticker, request_id = %request.request_id, %scope, "Dispatching analysis");
                let coordinator = Arc::clone(&coordinator);
                let cancel = cancel.clone();
                let handle = tokio::spawn(async move {
                    coordinator.run_with_cancel(&request, cancel).await
                });
                pending.push((input, Ok(AbortOnDropHandle::new(handle))));
            }
            Err(e) => {
                warn!(ticker = %input, error = %e, "Rejected ticker");
                pending.push((input, Err(e)));
            }
        }
    }

    let mut results = Vec::with_capacity(pending.len());
    for (input, entry) in pending {
        let outcome = match entry {
            Err(e) => TickerOutcome::Rejected(e),
            Ok(handle) => match handle.await {
                Ok(Ok(recommendation)) => TickerOutcome::Analyzed(recommendation),
                Ok(Err(e)) => TickerOutcome::Failed(e.to_string()),
                Err(e) => TickerOutcome::Failed(format!("analysis task failed: {e}")),
            },
        };
        results.push(TickerResult { input, outcome });
    }
    results
}

/// 0 when at least one ticker produced a Recommendation, 1 otherwise.
pub fn exit_code(results: &[TickerResult]) -> i32 {
    if results
        .iter()
        .any(|r| matches!(r.outcome, TickerOutcome::Analyzed(_)))
    {
        0
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_agents::test_support::MockSpecialist;
    use advisor_agents::{CoordinatorSettings, SpecialistAgent};
    use advisor_models::{Domain, Stance, VoteConfig};
    use rust_decimal_macros::dec;

    fn tickers(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn mock_coordinator() -> Arc<Coordinator> {
        let specialists: Vec<Arc<dyn SpecialistAgent>> = vec![
            Arc::new(MockSpecialist::reporting(Domain::Fundamental, Stance::Buy, dec!(0.8))),
            Arc::new(MockSpecialist::reporting(Domain::Technical, Stance::Sell, dec!(0.5))),
            Arc::new(MockSpecialist::reporting(Domain::Sentiment, Stance::Hold, dec!(0.6))),
            Arc::new(MockSpecialist::reporting(Domain::Risk, Stance::Buy, dec!(0.4))),
        ];
        Arc::new(Coordinator::new(
            specialists,
            CoordinatorSettings::default(),
            VoteConfig::default(),
        ))
    }

    #[test]
    fn requests_are_normalized_and_share_selection() {
        let selection = BackendSelection {
            region: Some("eu-west-1".to_string()),
            model: None,
        };
        let requests = build_requests(&tickers(&["aapl", " msft "]), Scope::Risk, &selection);

        let first = requests[0].1.as_ref().unwrap();
        assert_eq!(first.ticker, "AAPL");
        assert_eq!(first.scope, Scope::Risk);
        assert_eq!(first.selection, selection);
        assert_eq!(requests[1].1.as_ref().unwrap().ticker, "MSFT");
        assert_ne!(first.request_id, requests[1].1.as_ref().unwrap().request_id);
    }

    #[test]
    fn invalid_tickers_are_rejected_individually() {
        let requests = build_requests(
            &tickers(&["", "AAPL", "NOT A TICKER"]),
            Scope::Comprehensive,
            &BackendSelection::default(),
        );
        assert_eq!(requests[0].1, Err(RequestError::EmptyTicker));
        assert!(requests[1].1.is_ok());
        assert!(matches!(requests[2].1, Err(RequestError::InvalidTicker(_))));
    }

    #[tokio::test]
    async fn batch_results_keep_input_order() {
        let results = run_batch(
            mock_coordinator(),
            &tickers(&["tsla", "bad ticker", "aapl"]),
            Scope::Comprehensive,
            &BackendSelection::default(),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[1].input, "bad ticker");
        assert!(matches!(results[1].outcome, TickerOutcome::Rejected(_)));
        match (&results[0].outcome, &results[2].outcome) {
            (TickerOutcome::Analyzed(first), TickerOutcome::Analyzed(last)) => {
                assert_eq!(first.ticker, "TSLA");
                assert_eq!(last.ticker, "AAPL");
                assert_eq!(first.overall_stance, Stance::Buy);
            }
            other => panic!("expected two recommendations, got {other:?}"),
        }
        assert_eq!(exit_code(&results), 0);
    }

    #[tokio::test]
    async fn all_rejected_exits_nonzero() {
        let results = run_batch(
            mock_coordinator(),
            &tickers(&["", "???"]),
            Scope::Comprehensive,
            &BackendSelection::default(),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(exit_code(&results), 1);
    }

    #[tokio::test]
    async fn cancelled_batch_reports_failures() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let results = run_batch(
            mock_coordinator(),
            &tickers(&["AAPL"]),
            Scope::Technical,
            &BackendSelection::default(),
            cancel,
        )
        .await;

        assert!(matches!(results[0].outcome, TickerOutcome::Failed(_)));
        assert_eq!(exit_code(&results), 1);
    }
}
