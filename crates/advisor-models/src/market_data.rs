use serde::{Deserialize, Serialize};

/// Company fundamentals as supplied by a data provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Financials {
    pub ticker: String,
    /// USD.
    pub market_cap: f64,
    pub pe_ratio: f64,
    /// Year-over-year, as a fraction (0.12 = 12%).
    pub revenue_growth: f64,
    pub profit_margin: f64,
    pub debt_to_equity: f64,
    pub roe: f64,
    pub current_ratio: f64,
    pub earnings_surprise: EarningsSurprise,
    pub analyst_rating: AnalystRating,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EarningsSurprise {
    Beat,
    Miss,
    Inline,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalystRating {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

/// Benchmark averages used for relative valuation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Benchmark {
    /// "sector", "market" or "industry".
    pub comparison_type: String,
    pub pe_ratio: f64,
    pub roe: f64,
    pub profit_margin: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Bullish,
    Bearish,
    Sideways,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BandPosition {
    Upper,
    Middle,
    Lower,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VolumeTrend {
    Increasing,
    Decreasing,
    Stable,
}

/// Price action and indicator readings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TechnicalSnapshot {
    pub ticker: String,
    pub current_price: f64,
    pub sma_50: f64,
    pub sma_200: f64,
    /// 0-100.
    pub rsi: f64,
    pub macd_signal: Trend,
    pub bollinger_position: BandPosition,
    pub volume_trend: VolumeTrend,
    pub support_level: f64,
    pub resistance_level: f64,
    pub trend: Trend,
    /// Chart pattern detected on the daily timeframe, if any.
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SentimentTrend {
    Improving,
    Deteriorating,
    Stable,
}

/// Sentiment scores on a -1 to +1 scale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SentimentSnapshot {
    pub ticker: String,
    pub news_sentiment: f64,
    pub social_sentiment: f64,
    pub analyst_sentiment: f64,
    pub overall_sentiment: f64,
    pub sentiment_trend: SentimentTrend,
    pub key_themes: Vec<String>,
    pub news_volume: u32,
    pub social_mentions: u32,
    /// Engagement rate as a fraction of mentions.
    pub social_engagement: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Market, liquidity and qualitative risk measures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskProfile {
    pub ticker: String,
    pub beta: f64,
    /// Annualized, as a fraction.
    pub volatility: f64,
    /// Daily 95% value-at-risk, negative fraction.
    pub var_95: f64,
    pub correlation_spy: f64,
    /// 0.0 (illiquid) to 1.0.
    pub liquidity_score: f64,
    pub sector_risk: RiskLevel,
    pub regulatory_risk: RiskLevel,
    /// 0-100.
    pub esg_score: f64,
    /// Fraction of portfolio risk removed through diversification.
    pub diversification_benefit: f64,
}
