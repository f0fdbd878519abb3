use std::sync::Arc;

use advisor_models::ToolResult;
use async_trait::async_trait;

use super::{optional_f64, ticker_param, ticker_schema};
use crate::error::ToolError;
use crate::provider::DataProvider;
use crate::registry::{ToolDescriptor, ToolHandler};

pub const CALCULATE_RISK_METRICS: &str = "calculate_risk_metrics";
pub const PORTFOLIO_IMPACT_ANALYSIS: &str = "portfolio_impact_analysis";

pub const BETA_HIGH: f64 = 1.5;
pub const BETA_MEDIUM: f64 = 0.8;

pub fn tools(provider: &Arc<dyn DataProvider>) -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            CALCULATE_RISK_METRICS,
            "Calculate comprehensive risk metrics for the security.",
            ticker_schema("JPM", serde_json::json!({})),
            Arc::new(RiskMetrics {
                provider: Arc::clone(provider),
            }),
        ),
        ToolDescriptor::new(
            PORTFOLIO_IMPACT_ANALYSIS,
            "Analyze the impact of adding this position to a diversified portfolio.",
            ticker_schema(
                "KO",
                serde_json::json!({
                    "position_size": {
                        "type": "number",
                        "description": "Position size as a fraction of the portfolio (0.05 = 5%)",
                        "default": 0.05,
                    }
                }),
            ),
            Arc::new(PortfolioImpact {
                provider: Arc::clone(provider),
            }),
        ),
    ]
}

pub fn beta_band(beta: f64) -> &'static str {
    if beta > BETA_HIGH {
        "high"
    } else if beta > BETA_MEDIUM {
        "medium"
    } else {
        "low"
    }
}

struct RiskMetrics {
    provider: Arc<dyn DataProvider>,
}

#[async_trait]
impl ToolHandler for RiskMetrics {
    async fn invoke(&self, params: &serde_json::Value) -> Result<ToolResult, ToolError> {
        let ticker = ticker_param(params)?;
        let data = self.provider.risk(&ticker).await?;
        let band = beta_band(data.beta);

        let mut payload = serde_json::to_value(&data)?;
        if let Some(obj) = payload.as_object_mut() {
            obj.insert("beta_band".to_string(), band.into());
        }

        let narrative = format!(
            "Risk Assessment for {ticker}: beta {:.2} ({band} market risk), volatility {:.1}% annualized, \
             95% VaR {:.1}% daily. S&P 500 correlation {:.2}, liquidity score {:.2}/1.0. \
             Sector risk {:?}, regulatory risk {:?}, ESG score {:.0}/100.",
            data.beta,
            data.volatility * 100.0,
            data.var_95 * 100.0,
            data.correlation_spy,
            data.liquidity_score,
            data.sector_risk,
            data.regulatory_risk,
            data.esg_score,
        );

        Ok(ToolResult::success(payload, narrative))
    }
}

struct PortfolioImpact {
    provider: Arc<dyn DataProvider>,
}

#[async_trait]
impl ToolHandler for PortfolioImpact {
    async fn invoke(&self, params: &serde_json::Value) -> Result<ToolResult, ToolError> {
        let ticker = ticker_param(params)?;
        let position_size = optional_f64(params, "position_size", 0.05)?;
        if !(position_size > 0.0 && position_size <= 1.0) {
            return Err(ToolError::InvalidParams(format!(
                "position_size must be in (0, 1], got {position_size}"
            )));
        }
        let data = self.provider.risk(&ticker).await?;

        let beta_impact = data.beta * position_size;
        let hedging_required = data.beta > BETA_HIGH;

        let payload = serde_json::json!({
            "ticker": ticker,
            "position_size": position_size,
            "portfolio_beta_impact": beta_impact,
            "diversification_benefit": data.diversification_benefit,
            "correlation_spy": data.correlation_spy,
            "hedging_required": hedging_required,
        });

        let narrative = format!(
            "Portfolio Impact Analysis for {ticker} (position size {:.1}%): beta impact +{beta_impact:.3}, \
             diversification benefit {:.0}%, S&P 500 correlation {:.2}. Hedging required: {}.",
            position_size * 100.0,
            data.diversification_benefit * 100.0,
            data.correlation_spy,
            if hedging_required { "yes" } else { "no" },
        );

        Ok(ToolResult::success(payload, narrative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockDataProvider;

    fn all() -> Vec<ToolDescriptor> {
        tools(&(Arc::new(MockDataProvider::new()) as Arc<dyn DataProvider>))
    }

    #[test]
    fn beta_bands() {
        assert_eq!(beta_band(1.8), "high");
        assert_eq!(beta_band(1.0), "medium");
        assert_eq!(beta_band(0.6), "low");
    }

    #[tokio::test]
    async fn risk_metrics_include_band() {
        let tools = all();
        let result = tools[0]
            .invoke(&serde_json::json!({"ticker": "JPM"}))
            .await
            .unwrap();
        let beta = result.payload["beta"].as_f64().unwrap();
        assert_eq!(result.payload["beta_band"], beta_band(beta));
    }

    #[tokio::test]
    async fn portfolio_impact_scales_with_position() {
        let tools = all();
        let small = tools[1]
            .invoke(&serde_json::json!({"ticker": "KO", "position_size": 0.05}))
            .await
            .unwrap();
        let large = tools[1]
            .invoke(&serde_json::json!({"ticker": "KO", "position_size": 0.10}))
            .await
            .unwrap();
        let small_impact = small.payload["portfolio_beta_impact"].as_f64().unwrap();
        let large_impact = large.payload["portfolio_beta_impact"].as_f64().unwrap();
        assert!((large_impact - 2.0 * small_impact).abs() < 1e-9);
    }

    #[tokio::test]
    async fn portfolio_impact_rejects_bad_size() {
        let tools = all();
        for size in [0.0, -0.1, 1.5] {
            let err = tools[1]
                .invoke(&serde_json::json!({"ticker": "KO", "position_size": size}))
                .await
                .unwrap_err();
            assert!(matches!(err, ToolError::InvalidParams(_)));
        }
    }
}
