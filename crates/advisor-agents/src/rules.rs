//! A deterministic, offline reasoning backend.
//!
//! `RuleBasedBackend` walks the offered operations once each, then reads the
//! tool payloads and applies the same interpretation rules the domain
//! instructions describe. It never talks to the network, which makes it the
//! default backend and the one the end-to-end tests run against.

use advisor_models::{
    BackendReply, Conversation, Direction, Domain, Finding, OperationSpec, ToolInvocation,
};
use advisor_tools::domains::{fundamental, risk, sentiment, technical};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::backend::ReasoningBackend;
use crate::error::AgentError;

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedBackend;

impl RuleBasedBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReasoningBackend for RuleBasedBackend {
    fn name(&self) -> &str {
        "rules"
    }

    async fn complete(
        &self,
        _instructions: &str,
        operations: &[OperationSpec],
        conversation: &Conversation,
    ) -> Result<BackendReply, AgentError> {
        if !conversation.tools_exhausted {
            if let Some(next) = operations
                .iter()
                .find(|op| !conversation.has_invoked(&op.name))
            {
                return Ok(BackendReply::Invoke(ToolInvocation {
                    tool: next.name.clone(),
                    params: serde_json::json!({ "ticker": conversation.ticker }),
                }));
            }
        }
        Ok(BackendReply::Final(interpret(conversation)))
    }
}

/// Turn the tool results gathered so far into a final report object.
pub fn interpret(conversation: &Conversation) -> Value {
    let findings = match conversation.domain {
        Domain::Fundamental => fundamental_findings(conversation),
        Domain::Technical => technical_findings(conversation),
        Domain::Sentiment => sentiment_findings(conversation),
        Domain::Risk => risk_findings(conversation),
    };

    let count = |d: Direction| findings.iter().filter(|f| f.direction == d).count();
    let (bullish, bearish, neutral) = (
        count(Direction::Bullish),
        count(Direction::Bearish),
        count(Direction::Neutral),
    );

    let consulted: Vec<&str> = conversation
        .turns
        .iter()
        .filter(|t| !t.result.is_error())
        .map(|t| t.invocation.tool.as_str())
        .collect();
    let unavailable: Vec<String> = conversation
        .turns
        .iter()
        .filter(|t| t.result.is_error())
        .map(|t| format!("{} ({})", t.invocation.tool, t.result.narrative))
        .collect();

    let mut narrative = if findings.is_empty() {
        format!(
            "No usable {} data for {}.",
            conversation.domain, conversation.ticker
        )
    } else {
        format!(
            "Rule-based {} read for {}: {bullish} bullish, {bearish} bearish, {neutral} neutral \
             findings from {}.",
            conversation.domain,
            conversation.ticker,
            consulted.join(", ")
        )
    };
    if !unavailable.is_empty() {
        narrative.push_str(&format!(" Unavailable: {}.", unavailable.join("; ")));
    }

    serde_json::json!({
        "findings": findings,
        "narrative": narrative,
        "confidence": confidence(bullish, bearish, findings.len()).to_string(),
    })
}

/// 0.40 plus up to 0.50 for one-sided evidence; zero without any findings.
fn confidence(bullish: usize, bearish: usize, total: usize) -> Decimal {
    if total == 0 {
        return Decimal::ZERO;
    }
    let lean = Decimal::from(bullish.abs_diff(bearish) as u64) / Decimal::from(total as u64);
    (Decimal::new(40, 2) + Decimal::new(50, 2) * lean).round_dp(2)
}

fn payload<'a>(conversation: &'a Conversation, tool: &str) -> Option<&'a Value> {
    conversation
        .result_of(tool)
        .filter(|r| !r.is_error())
        .map(|r| &r.payload)
}

fn num(payload: &Value, key: &str) -> Option<f64> {
    payload.get(key).and_then(Value::as_f64)
}

fn text<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str)
}

fn finding(
    metric: &str,
    observation: String,
    direction: Direction,
    value: impl Into<Value>,
) -> Finding {
    Finding {
        metric: metric.to_string(),
        observation,
        direction,
        value: Some(value.into()),
    }
}

/// Bullish above `high`, bearish below `low`, neutral between.
fn band(value: f64, low: f64, high: f64) -> Direction {
    if value > high {
        Direction::Bullish
    } else if value < low {
        Direction::Bearish
    } else {
        Direction::Neutral
    }
}

fn trend_direction(label: &str) -> Direction {
    match label {
        "bullish" | "improving" => Direction::Bullish,
        "bearish" | "deteriorating" => Direction::Bearish,
        _ => Direction::Neutral,
    }
}

fn fundamental_findings(conversation: &Conversation) -> Vec<Finding> {
    let mut out = Vec::new();

    if let Some(p) = payload(conversation, fundamental::GET_COMPANY_FINANCIALS) {
        if let Some(growth) = num(p, "revenue_growth") {
            out.push(finding(
                "revenue_growth",
                format!("Revenue growth {:+.1}%", growth * 100.0),
                band(growth, 0.0, 0.10),
                growth,
            ));
        }
        if let Some(pe) = num(p, "pe_ratio") {
            let direction = if pe < 15.0 {
                Direction::Bullish
            } else if pe > 30.0 {
                Direction::Bearish
            } else {
                Direction::Neutral
            };
            out.push(finding("pe_ratio", format!("P/E {pe:.1}"), direction, pe));
        }
        if let Some(de) = num(p, "debt_to_equity") {
            if de > 1.5 {
                out.push(finding(
                    "debt_to_equity",
                    format!("Debt-to-equity {de:.2} (elevated leverage)"),
                    Direction::Bearish,
                    de,
                ));
            } else if de < 0.5 {
                out.push(finding(
                    "debt_to_equity",
                    format!("Debt-to-equity {de:.2} (conservative balance sheet)"),
                    Direction::Bullish,
                    de,
                ));
            }
        }
        if let Some(rating) = text(p, "analyst_rating") {
            let direction = match rating {
                "strong_buy" | "buy" => Direction::Bullish,
                "sell" | "strong_sell" => Direction::Bearish,
                _ => Direction::Neutral,
            };
            out.push(finding(
                "analyst_rating",
                format!("Analyst consensus {}", rating.replace('_', " ")),
                direction,
                rating,
            ));
        }
        if let Some(surprise) = text(p, "earnings_surprise") {
            let direction = match surprise {
                "beat" => Direction::Bullish,
                "miss" => Direction::Bearish,
                _ => Direction::Neutral,
            };
            out.push(finding(
                "earnings_surprise",
                format!("Latest earnings {surprise}"),
                direction,
                surprise,
            ));
        }
    }

    if let Some(p) = payload(conversation, fundamental::CALCULATE_RATIOS) {
        if let Some(performance) = text(p, "relative_performance") {
            let direction = if performance == "outperforming" {
                Direction::Bullish
            } else {
                Direction::Bearish
            };
            out.push(finding(
                "relative_performance",
                format!("ROE {performance} the benchmark"),
                direction,
                performance,
            ));
        }
        if let Some(valuation) = text(p, "relative_valuation") {
            let direction = if valuation == "discount" {
                Direction::Bullish
            } else {
                Direction::Neutral
            };
            out.push(finding(
                "relative_valuation",
                format!("Trades at a {valuation} to the benchmark P/E"),
                direction,
                valuation,
            ));
        }
    }

    out
}

fn technical_findings(conversation: &Conversation) -> Vec<Finding> {
    let mut out = Vec::new();

    if let Some(p) = payload(conversation, technical::GET_PRICE_HISTORY) {
        if let (Some(price), Some(sma_200)) = (num(p, "current_price"), num(p, "sma_200")) {
            let direction = if price > sma_200 {
                Direction::Bullish
            } else {
                Direction::Bearish
            };
            let side = if price > sma_200 { "above" } else { "below" };
            out.push(finding(
                "sma_200",
                format!("Price ${price:.2} {side} 200-day SMA ${sma_200:.2}"),
                direction,
                sma_200,
            ));
        }
        if let Some(trend) = text(p, "trend") {
            out.push(finding(
                "trend",
                format!("Overall trend {trend}"),
                trend_direction(trend),
                trend,
            ));
        }
    }

    if let Some(p) = payload(conversation, technical::IDENTIFY_PATTERNS) {
        if let Some(rsi) = num(p, "rsi") {
            let zone = technical::rsi_zone(rsi);
            let direction = match zone {
                "oversold" => Direction::Bullish,
                "overbought" => Direction::Bearish,
                _ => Direction::Neutral,
            };
            out.push(finding("rsi", format!("RSI {rsi:.0} ({zone})"), direction, rsi));
        }
        if let Some(macd) = text(p, "macd_signal") {
            out.push(finding(
                "macd",
                format!("MACD signal {macd}"),
                trend_direction(macd),
                macd,
            ));
        }
        match text(p, "bollinger_position") {
            Some("lower") => out.push(finding(
                "bollinger_position",
                "Price at the lower Bollinger band".to_string(),
                Direction::Bullish,
                "lower",
            )),
            Some("upper") => out.push(finding(
                "bollinger_position",
                "Price at the upper Bollinger band".to_string(),
                Direction::Bearish,
                "upper",
            )),
            _ => {}
        }
    }

    out
}

fn sentiment_findings(conversation: &Conversation) -> Vec<Finding> {
    let mut out = Vec::new();

    if let Some(p) = payload(conversation, sentiment::ANALYZE_NEWS_SENTIMENT) {
        if let Some(overall) = num(p, "overall_sentiment") {
            out.push(finding(
                "overall_sentiment",
                format!("Overall sentiment {overall:+.2}"),
                band(overall, -0.2, 0.2),
                overall,
            ));
        }
        if let Some(news) = num(p, "news_sentiment") {
            out.push(finding(
                "news_sentiment",
                format!("News sentiment {news:+.2}"),
                band(news, -0.2, 0.2),
                news,
            ));
        }
        if let Some(trend) = text(p, "sentiment_trend") {
            out.push(finding(
                "sentiment_trend",
                format!("Sentiment {trend}"),
                trend_direction(trend),
                trend,
            ));
        }
    }

    if let Some(p) = payload(conversation, sentiment::SOCIAL_MEDIA_TRENDS) {
        if let Some(social) = num(p, "social_sentiment") {
            let engagement = num(p, "engagement_rate").unwrap_or(0.0);
            out.push(finding(
                "social_sentiment",
                format!(
                    "Social sentiment {social:+.2} at {:.1}% engagement",
                    engagement * 100.0
                ),
                band(social, -0.2, 0.2),
                social,
            ));
        }
    }

    out
}

fn risk_findings(conversation: &Conversation) -> Vec<Finding> {
    let mut out = Vec::new();

    if let Some(p) = payload(conversation, risk::CALCULATE_RISK_METRICS) {
        if let Some(beta) = num(p, "beta") {
            let level = risk::beta_band(beta);
            let direction = match level {
                "high" => Direction::Bearish,
                "low" => Direction::Bullish,
                _ => Direction::Neutral,
            };
            out.push(finding(
                "beta",
                format!("Beta {beta:.2} ({level} market risk)"),
                direction,
                beta,
            ));
        }
        if let Some(vol) = num(p, "volatility").filter(|v| *v > 0.45) {
            out.push(finding(
                "volatility",
                format!("Annualized volatility {:.1}%", vol * 100.0),
                Direction::Bearish,
                vol,
            ));
        }
        if let Some(var) = num(p, "var_95").filter(|v| *v < -0.12) {
            out.push(finding(
                "var_95",
                format!("95% daily VaR {:.1}%", var * 100.0),
                Direction::Bearish,
                var,
            ));
        }
        if let Some(liquidity) = num(p, "liquidity_score").filter(|l| *l > 0.7) {
            out.push(finding(
                "liquidity_score",
                format!("Liquidity score {liquidity:.2}"),
                Direction::Bullish,
                liquidity,
            ));
        }
        for key in ["sector_risk", "regulatory_risk"] {
            if text(p, key) == Some("high") {
                out.push(finding(
                    key,
                    format!("{} is high", key.replace('_', " ")),
                    Direction::Bearish,
                    "high",
                ));
            }
        }
    }

    if let Some(p) = payload(conversation, risk::PORTFOLIO_IMPACT_ANALYSIS) {
        if let Some(benefit) = num(p, "diversification_benefit").filter(|b| *b > 0.85) {
            out.push(finding(
                "diversification_benefit",
                format!("Diversification benefit {:.0}%", benefit * 100.0),
                Direction::Bullish,
                benefit,
            ));
        }
        if p.get("hedging_required").and_then(Value::as_bool) == Some(true) {
            out.push(finding(
                "hedging_required",
                "Position requires hedging".to_string(),
                Direction::Bearish,
                true,
            ));
        }
    }

    out
}
