use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::report::{DomainReport, FailureKind};
use crate::request::{Domain, Scope};

pub const OUTPUT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Stance {
    Buy,
    Hold,
    Sell,
    InsufficientData,
}

impl Stance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stance::Buy => "buy",
            Stance::Hold => "hold",
            Stance::Sell => "sell",
            Stance::InsufficientData => "insufficient-data",
        }
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A domain whose worker did not produce a report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Warning {
    pub domain: Domain,
    pub kind: FailureKind,
    pub detail: String,
}

/// The synthesized output of one analysis request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub id: Uuid,
    pub schema_version: u32,
    /// ID of the AnalysisRequest this recommendation answers.
    pub request_id: Uuid,
    pub ticker: String,
    pub scope: Scope,
    pub decided_at: DateTime<Utc>,
    /// Reports from domains that succeeded, keyed in domain order.
    pub domain_reports: BTreeMap<Domain, DomainReport>,
    pub overall_stance: Stance,
    pub rationale: String,
    /// One entry per requested domain that did not succeed, in domain order.
    pub warnings: Vec<Warning>,
    pub processing_time_ms: u64,
}

impl Recommendation {
    pub fn is_insufficient(&self) -> bool {
        self.overall_stance == Stance::InsufficientData
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;

    #[test]
    fn stance_serialization() {
        assert_eq!(serde_json::to_string(&Stance::Buy).unwrap(), "\"buy\"");
        assert_eq!(
            serde_json::to_string(&Stance::InsufficientData).unwrap(),
            "\"insufficient-data\""
        );
        assert_eq!(Stance::InsufficientData.to_string(), "insufficient-data");
    }

    #[test]
    fn roundtrip_recommendation() {
        let mut reports = BTreeMap::new();
        reports.insert(
            Domain::Fundamental,
            DomainReport {
                domain: Domain::Fundamental,
                findings: vec![],
                narrative: "Solid balance sheet".to_string(),
                confidence: dec!(0.8),
                tools_used: BTreeSet::from(["get_company_financials".to_string()]),
            },
        );

        let recommendation = Recommendation {
            id: Uuid::new_v4(),
            schema_version: OUTPUT_SCHEMA_VERSION,
            request_id: Uuid::new_v4(),
            ticker: "AAPL".to_string(),
            scope: Scope::Comprehensive,
            decided_at: Utc::now(),
            domain_reports: reports,
            overall_stance: Stance::Hold,
            rationale: "fundamental: Solid balance sheet".to_string(),
            warnings: vec![Warning {
                domain: Domain::Risk,
                kind: FailureKind::TimedOut,
                detail: "exceeded 45s".to_string(),
            }],
            processing_time_ms: 1200,
        };

        let json = serde_json::to_string(&recommendation).unwrap();
        assert!(json.contains("\"fundamental\""));
        let deserialized: Recommendation = serde_json::from_str(&json).unwrap();
        assert_eq!(recommendation, deserialized);
        assert!(!deserialized.is_insufficient());
    }
}
