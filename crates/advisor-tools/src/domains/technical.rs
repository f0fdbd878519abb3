use std::sync::Arc;

use advisor_models::ToolResult;
use async_trait::async_trait;

use super::{ticker_param, ticker_schema};
use crate::error::ToolError;
use crate::provider::DataProvider;
use crate::registry::{ToolDescriptor, ToolHandler};

pub const GET_PRICE_HISTORY: &str = "get_price_history";
pub const IDENTIFY_PATTERNS: &str = "identify_patterns";

pub const RSI_OVERBOUGHT: f64 = 70.0;
pub const RSI_OVERSOLD: f64 = 30.0;

pub fn tools(provider: &Arc<dyn DataProvider>) -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            GET_PRICE_HISTORY,
            "Get price action, moving averages, key support/resistance levels and volume trend.",
            ticker_schema("TSLA", serde_json::json!({})),
            Arc::new(PriceHistory {
                provider: Arc::clone(provider),
            }),
        ),
        ToolDescriptor::new(
            IDENTIFY_PATTERNS,
            "Identify chart patterns and technical indicator signals (RSI, MACD, Bollinger Bands).",
            ticker_schema("NVDA", serde_json::json!({})),
            Arc::new(PatternScan {
                provider: Arc::clone(provider),
            }),
        ),
    ]
}

/// Classify an RSI reading.
pub fn rsi_zone(rsi: f64) -> &'static str {
    if rsi > RSI_OVERBOUGHT {
        "overbought"
    } else if rsi < RSI_OVERSOLD {
        "oversold"
    } else {
        "neutral"
    }
}

struct PriceHistory {
    provider: Arc<dyn DataProvider>,
}

#[async_trait]
impl ToolHandler for PriceHistory {
    async fn invoke(&self, params: &serde_json::Value) -> Result<ToolResult, ToolError> {
        let ticker = ticker_param(params)?;
        let data = self.provider.technicals(&ticker).await?;

        let payload = serde_json::json!({
            "ticker": ticker,
            "current_price": data.current_price,
            "sma_50": data.sma_50,
            "sma_200": data.sma_200,
            "trend": data.trend,
            "support_level": data.support_level,
            "resistance_level": data.resistance_level,
            "volume_trend": data.volume_trend,
        });

        let narrative = format!(
            "Technical Analysis for {ticker}: price ${:.2}, 50-day SMA ${:.2}, 200-day SMA ${:.2}, \
             overall trend {:?}. Support ${:.2}, resistance ${:.2}. Volume trend {:?}.",
            data.current_price,
            data.sma_50,
            data.sma_200,
            data.trend,
            data.support_level,
            data.resistance_level,
            data.volume_trend,
        );

        Ok(ToolResult::success(payload, narrative))
    }
}

struct PatternScan {
    provider: Arc<dyn DataProvider>,
}

#[async_trait]
impl ToolHandler for PatternScan {
    async fn invoke(&self, params: &serde_json::Value) -> Result<ToolResult, ToolError> {
        let ticker = ticker_param(params)?;
        let data = self.provider.technicals(&ticker).await?;
        let zone = rsi_zone(data.rsi);

        let payload = serde_json::json!({
            "ticker": ticker,
            "rsi": data.rsi,
            "rsi_zone": zone,
            "macd_signal": data.macd_signal,
            "bollinger_position": data.bollinger_position,
            "pattern": data.pattern,
        });

        let narrative = format!(
            "Pattern Analysis for {ticker}: RSI {:.1} ({zone}), MACD signal {:?}, price at {:?} Bollinger band. \
             Detected pattern: {}.",
            data.rsi,
            data.macd_signal,
            data.bollinger_position,
            data.pattern.as_deref().unwrap_or("none"),
        );

        Ok(ToolResult::success(payload, narrative))
    }
}
