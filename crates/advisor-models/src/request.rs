use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Longest ticker symbol accepted by the router (covers share-class suffixes like `BRK.B`).
pub const MAX_TICKER_LEN: usize = 12;

/// One of the four analysis disciplines.
///
/// Variant order is the fixed domain order used for every ordered rendering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Fundamental,
    Technical,
    Sentiment,
    Risk,
}

impl Domain {
    pub const ALL: [Domain; 4] = [
        Domain::Fundamental,
        Domain::Technical,
        Domain::Sentiment,
        Domain::Risk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Fundamental => "fundamental",
            Domain::Technical => "technical",
            Domain::Sentiment => "sentiment",
            Domain::Risk => "risk",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fundamental" => Ok(Domain::Fundamental),
            "technical" => Ok(Domain::Technical),
            "sentiment" => Ok(Domain::Sentiment),
            "risk" => Ok(Domain::Risk),
            other => Err(RequestError::UnknownScope(other.to_string())),
        }
    }
}

/// Requested breadth of an analysis.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Fundamental,
    Technical,
    Sentiment,
    Risk,
    #[default]
    Comprehensive,
}

impl Scope {
    /// Domains a request with this scope dispatches to, in domain order.
    pub fn domains(&self) -> Vec<Domain> {
        match self {
            Scope::Fundamental => vec![Domain::Fundamental],
            Scope::Technical => vec![Domain::Technical],
            Scope::Sentiment => vec![Domain::Sentiment],
            Scope::Risk => vec![Domain::Risk],
            Scope::Comprehensive => Domain::ALL.to_vec(),
        }
    }

    pub fn is_single_domain(&self) -> bool {
        !matches!(self, Scope::Comprehensive)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Fundamental => "fundamental",
            Scope::Technical => "technical",
            Scope::Sentiment => "sentiment",
            Scope::Risk => "risk",
            Scope::Comprehensive => "comprehensive",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        if normalized == "comprehensive" {
            return Ok(Scope::Comprehensive);
        }
        let domain: Domain = normalized
            .parse()
            .map_err(|_| RequestError::UnknownScope(s.to_string()))?;
        Ok(Scope::from(domain))
    }
}

impl From<Domain> for Scope {
    fn from(domain: Domain) -> Self {
        match domain {
            Domain::Fundamental => Scope::Fundamental,
            Domain::Technical => Scope::Technical,
            Domain::Sentiment => Scope::Sentiment,
            Domain::Risk => Scope::Risk,
        }
    }
}

/// Opaque backend-selection parameters carried through to the reasoning backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendSelection {
    /// Hosting region for backends that are region-scoped.
    pub region: Option<String>,
    /// Model override for this request.
    pub model: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("ticker must not be empty")]
    EmptyTicker,

    #[error("invalid ticker {0:?}: expected 1-12 characters of A-Z, 0-9, '.' or '-'")]
    InvalidTicker(String),

    #[error("unknown analysis scope {0:?}")]
    UnknownScope(String),
}

/// A validated request to analyze one instrument.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisRequest {
    pub request_id: Uuid,
    /// Uppercase-normalized ticker symbol.
    pub ticker: String,
    pub scope: Scope,
    pub selection: BackendSelection,
}

impl AnalysisRequest {
    pub fn new(
        ticker: &str,
        scope: Scope,
        selection: BackendSelection,
    ) -> Result<Self, RequestError> {
        Ok(Self {
            request_id: Uuid::new_v4(),
            ticker: normalize_ticker(ticker)?,
            scope,
            selection,
        })
    }

    /// Re-check a request that may not have come through [`AnalysisRequest::new`].
    pub fn validate(&self) -> Result<(), RequestError> {
        let normalized = normalize_ticker(&self.ticker)?;
        if normalized != self.ticker {
            return Err(RequestError::InvalidTicker(self.ticker.clone()));
        }
        Ok(())
    }
}

/// Trim and uppercase a raw ticker, rejecting empty or malformed input.
pub fn normalize_ticker(raw: &str) -> Result<String, RequestError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RequestError::EmptyTicker);
    }
    let valid = trimmed.len() <= MAX_TICKER_LEN
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if !valid {
        return Err(RequestError::InvalidTicker(trimmed.to_string()));
    }
    Ok(trimmed.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_is_trimmed_and_uppercased() {
        let request =
            AnalysisRequest::new("  aapl ", Scope::Comprehensive, BackendSelection::default())
                .unwrap();
        assert_eq!(request.ticker, "AAPL");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn empty_ticker_rejected() {
        let err = AnalysisRequest::new("   ", Scope::Risk, BackendSelection::default()).unwrap_err();
        assert_eq!(err, RequestError::EmptyTicker);
    }

    #[test]
    fn malformed_ticker_rejected() {
        assert!(matches!(
            normalize_ticker("AA PL"),
            Err(RequestError::InvalidTicker(_))
        ));
        assert!(matches!(
            normalize_ticker("ABCDEFGHIJKLMN"),
            Err(RequestError::InvalidTicker(_))
        ));
        assert_eq!(normalize_ticker("brk.b").unwrap(), "BRK.B");
    }

    #[test]
    fn hand_built_request_fails_validation() {
        let request = AnalysisRequest {
            request_id: Uuid::new_v4(),
            ticker: String::new(),
            scope: Scope::Comprehensive,
            selection: BackendSelection::default(),
        };
        assert_eq!(request.validate(), Err(RequestError::EmptyTicker));

        let lowercase = AnalysisRequest {
            ticker: "msft".to_string(),
            ..request
        };
        assert!(matches!(
            lowercase.validate(),
            Err(RequestError::InvalidTicker(_))
        ));
    }

    #[test]
    fn scope_resolution() {
        assert_eq!(Scope::Comprehensive.domains().len(), 4);
        assert_eq!(Scope::Risk.domains(), vec![Domain::Risk]);
        assert!(Scope::Technical.is_single_domain());
        assert!(!Scope::Comprehensive.is_single_domain());
    }

    #[test]
    fn scope_parsing() {
        assert_eq!("Comprehensive".parse::<Scope>().unwrap(), Scope::Comprehensive);
        assert_eq!("sentiment".parse::<Scope>().unwrap(), Scope::Sentiment);
        assert_eq!(
            "macro".parse::<Scope>(),
            Err(RequestError::UnknownScope("macro".to_string()))
        );
    }

    #[test]
    fn domain_order_is_fixed() {
        let mut domains = vec![Domain::Risk, Domain::Sentiment, Domain::Fundamental, Domain::Technical];
        domains.sort();
        assert_eq!(domains, Domain::ALL.to_vec());
        assert_eq!(serde_json::to_string(&Domain::Risk).unwrap(), "\"risk\"");
    }
}
