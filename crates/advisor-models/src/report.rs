use std::collections::BTreeSet;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::recommendation::Stance;
use crate::request::Domain;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Error,
}

/// Output of a single tool invocation, fed straight back to the reasoning backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub status: ToolStatus,
    /// Structured domain data.
    pub payload: serde_json::Value,
    /// Human-readable summary of the payload.
    pub narrative: String,
}

impl ToolResult {
    pub fn success(payload: serde_json::Value, narrative: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Success,
            payload,
            narrative: narrative.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: ToolStatus::Error,
            payload: serde_json::json!({ "error": message }),
            narrative: message,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ToolStatus::Error
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

/// A single structured observation inside a domain report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    /// What was measured (e.g., "pe_ratio", "rsi").
    pub metric: String,
    pub observation: String,
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// One specialist's analysis of one domain. Immutable once returned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainReport {
    pub domain: Domain,
    pub findings: Vec<Finding>,
    pub narrative: String,
    /// 0.0 to 1.0 conviction in the findings.
    pub confidence: Decimal,
    /// Names of the domain's own tools invoked while producing the report.
    pub tools_used: BTreeSet<String>,
}

impl DomainReport {
    /// Directional signal implied by the findings: net bullish → buy, net bearish → sell.
    ///
    /// A report with zero confidence carries no conviction and signals hold.
    pub fn signal(&self) -> Stance {
        if self.confidence.is_zero() {
            return Stance::Hold;
        }
        let net: i64 = self
            .findings
            .iter()
            .map(|f| match f.direction {
                Direction::Bullish => 1,
                Direction::Bearish => -1,
                Direction::Neutral => 0,
            })
            .sum();
        match net {
            n if n > 0 => Stance::Buy,
            n if n < 0 => Stance::Sell,
            _ => Stance::Hold,
        }
    }
}

/// Why a worker did not produce a report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The backend's final answer could not be parsed into a report.
    MalformedReport,
    /// The reasoning backend could not be reached or errored.
    BackendUnavailable,
    /// The worker exceeded its time budget or the request deadline.
    TimedOut,
    /// No enabled worker is configured for the requested domain.
    Disabled,
    /// The worker task panicked.
    Crashed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::MalformedReport => "malformed report",
            FailureKind::BackendUnavailable => "backend unavailable",
            FailureKind::TimedOut => "timed out",
            FailureKind::Disabled => "disabled",
            FailureKind::Crashed => "crashed",
        };
        f.write_str(s)
    }
}

/// Terminal result of one dispatched worker. The coordinator's only view into execution.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    Ok(DomainReport),
    Failed { kind: FailureKind, detail: String },
    TimedOut,
}

impl WorkerOutcome {
    pub fn failed(kind: FailureKind, detail: impl Into<String>) -> Self {
        WorkerOutcome::Failed {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, WorkerOutcome::Ok(_))
    }

    /// The failure kind for anything other than a successful report.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            WorkerOutcome::Ok(_) => None,
            WorkerOutcome::Failed { kind, .. } => Some(*kind),
            WorkerOutcome::TimedOut => Some(FailureKind::TimedOut),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn finding(direction: Direction) -> Finding {
        Finding {
            metric: "m".to_string(),
            observation: "o".to_string(),
            direction,
            value: None,
        }
    }

    fn report(directions: &[Direction], confidence: Decimal) -> DomainReport {
        DomainReport {
            domain: Domain::Technical,
            findings: directions.iter().copied().map(finding).collect(),
            narrative: "test".to_string(),
            confidence,
            tools_used: BTreeSet::new(),
        }
    }

    #[test]
    fn signal_follows_net_direction() {
        use Direction::*;
        assert_eq!(report(&[Bullish, Bullish, Bearish], dec!(0.6)).signal(), Stance::Buy);
        assert_eq!(report(&[Bearish, Neutral], dec!(0.6)).signal(), Stance::Sell);
        assert_eq!(report(&[Bullish, Bearish], dec!(0.6)).signal(), Stance::Hold);
        assert_eq!(report(&[], dec!(0.6)).signal(), Stance::Hold);
    }

    #[test]
    fn zero_confidence_signals_hold() {
        assert_eq!(
            report(&[Direction::Bullish], Decimal::ZERO).signal(),
            Stance::Hold
        );
    }

    #[test]
    fn report_deserializes_without_optional_values() {
        let json = serde_json::json!({
            "domain": "risk",
            "findings": [{"metric": "beta", "observation": "high", "direction": "bearish"}],
            "narrative": "Elevated market risk",
            "confidence": "0.70",
            "tools_used": ["calculate_risk_metrics"]
        });
        let report: DomainReport = serde_json::from_value(json).unwrap();
        assert_eq!(report.domain, Domain::Risk);
        assert_eq!(report.confidence, dec!(0.70));
        assert!(report.findings[0].value.is_none());
        assert_eq!(report.signal(), Stance::Sell);
    }

    #[test]
    fn outcome_failure_kinds() {
        assert_eq!(WorkerOutcome::TimedOut.failure_kind(), Some(FailureKind::TimedOut));
        assert_eq!(
            WorkerOutcome::failed(FailureKind::MalformedReport, "bad").failure_kind(),
            Some(FailureKind::MalformedReport)
        );
        let ok = WorkerOutcome::Ok(report(&[], dec!(0.5)));
        assert!(ok.is_ok());
        assert_eq!(ok.failure_kind(), None);
    }

    #[test]
    fn tool_result_constructors() {
        let err = ToolResult::error("provider down");
        assert!(err.is_error());
        assert_eq!(err.payload["error"], "provider down");
        let ok = ToolResult::success(serde_json::json!({"pe_ratio": 21.0}), "P/E 21.0");
        assert!(!ok.is_error());
    }
}
