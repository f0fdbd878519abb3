use std::sync::Arc;

use advisor_models::ToolResult;
use async_trait::async_trait;

use super::{optional_str, ticker_param, ticker_schema};
use crate::error::ToolError;
use crate::provider::DataProvider;
use crate::registry::{ToolDescriptor, ToolHandler};

pub const GET_COMPANY_FINANCIALS: &str = "get_company_financials";
pub const CALCULATE_RATIOS: &str = "calculate_ratios";

pub fn tools(provider: &Arc<dyn DataProvider>) -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            GET_COMPANY_FINANCIALS,
            "Retrieve comprehensive financial data for a company including income statement, \
             balance sheet, and cash flow metrics.",
            ticker_schema("AAPL", serde_json::json!({})),
            Arc::new(CompanyFinancials {
                provider: Arc::clone(provider),
            }),
        ),
        ToolDescriptor::new(
            CALCULATE_RATIOS,
            "Calculate and compare financial ratios against sector or market benchmarks.",
            ticker_schema(
                "MSFT",
                serde_json::json!({
                    "comparison_type": {
                        "type": "string",
                        "description": "The benchmark to compare against: \"sector\", \"market\" or \"industry\"",
                        "default": "sector",
                    }
                }),
            ),
            Arc::new(RatioComparison {
                provider: Arc::clone(provider),
            }),
        ),
    ]
}

struct CompanyFinancials {
    provider: Arc<dyn DataProvider>,
}

#[async_trait]
impl ToolHandler for CompanyFinancials {
    async fn invoke(&self, params: &serde_json::Value) -> Result<ToolResult, ToolError> {
        let ticker = ticker_param(params)?;
        let data = self.provider.financials(&ticker).await?;

        let narrative = format!(
            "Financial Analysis for {ticker}: market cap ${:.1}B, P/E {:.1}, analyst rating {:?}. \
             Revenue growth {:+.1}%, profit margin {:.1}%, ROE {:.1}%. \
             Debt-to-equity {:.2}, current ratio {:.2}, recent earnings {:?}.",
            data.market_cap / 1e9,
            data.pe_ratio,
            data.analyst_rating,
            data.revenue_growth * 100.0,
            data.profit_margin * 100.0,
            data.roe * 100.0,
            data.debt_to_equity,
            data.current_ratio,
            data.earnings_surprise,
        );

        Ok(ToolResult::success(serde_json::to_value(&data)?, narrative))
    }
}

const COMPARISON_TYPES: [&str; 3] = ["sector", "market", "industry"];

struct RatioComparison {
    provider: Arc<dyn DataProvider>,
}

#[async_trait]
impl ToolHandler for RatioComparison {
    async fn invoke(&self, params: &serde_json::Value) -> Result<ToolResult, ToolError> {
        let ticker = ticker_param(params)?;
        let comparison_type = optional_str(params, "comparison_type", "sector")?.to_lowercase();
        if !COMPARISON_TYPES.contains(&comparison_type.as_str()) {
            return Err(ToolError::InvalidParams(format!(
                "comparison_type must be one of {COMPARISON_TYPES:?}, got {comparison_type:?}"
            )));
        }

        let data = self.provider.financials(&ticker).await?;
        let benchmark = self.provider.benchmark(&ticker, &comparison_type).await?;

        let valuation = if data.pe_ratio > benchmark.pe_ratio {
            "premium"
        } else {
            "discount"
        };
        let performance = if data.roe > benchmark.roe {
            "outperforming"
        } else {
            "underperforming"
        };

        let payload = serde_json::json!({
            "ticker": ticker,
            "comparison_type": comparison_type,
            "pe_ratio": data.pe_ratio,
            "benchmark_pe_ratio": benchmark.pe_ratio,
            "roe": data.roe,
            "benchmark_roe": benchmark.roe,
            "profit_margin": data.profit_margin,
            "benchmark_profit_margin": benchmark.profit_margin,
            "relative_valuation": valuation,
            "relative_performance": performance,
        });

        let narrative = format!(
            "Ratio Analysis for {ticker} vs {comparison_type} average: P/E {:.1} ({comparison_type} {:.1}, {valuation}); \
             ROE {:.1}% ({comparison_type} {:.1}%); profit margin {:.1}% ({comparison_type} {:.1}%); {performance} peers.",
            data.pe_ratio,
            benchmark.pe_ratio,
            data.roe * 100.0,
            benchmark.roe * 100.0,
            data.profit_margin * 100.0,
            benchmark.profit_margin * 100.0,
        );

        Ok(ToolResult::success(payload, narrative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockDataProvider;

    fn provider() -> Arc<dyn DataProvider> {
        Arc::new(MockDataProvider::new())
    }

    #[tokio::test]
    async fn financials_payload_and_narrative() {
        let all = tools(&provider());
        let tool = &all[0];
        let result = tool
            .invoke(&serde_json::json!({"ticker": "aapl"}))
            .await
            .unwrap();
        assert!(!result.is_error());
        assert_eq!(result.payload["ticker"], "AAPL");
        assert!(result.payload["pe_ratio"].is_f64());
        assert!(result.narrative.starts_with("Financial Analysis for AAPL"));
    }

    #[tokio::test]
    async fn ratios_default_to_sector() {
        let all = tools(&provider());
        let tool = &all[1];
        let result = tool
            .invoke(&serde_json::json!({"ticker": "MSFT"}))
            .await
            .unwrap();
        assert_eq!(result.payload["comparison_type"], "sector");
        let valuation = result.payload["relative_valuation"].as_str().unwrap();
        assert!(valuation == "premium" || valuation == "discount");
    }

    #[tokio::test]
    async fn ratios_reject_unknown_comparison() {
        let all = tools(&provider());
        let tool = &all[1];
        let err = tool
            .invoke(&serde_json::json!({"ticker": "MSFT", "comparison_type": "galaxy"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn missing_ticker_is_invalid() {
        let all = tools(&provider());
        let tool = &all[0];
        let err = tool.invoke(&serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }
}
