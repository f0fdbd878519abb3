use std::sync::Arc;

use advisor_models::ToolResult;
use async_trait::async_trait;

use super::{optional_u64, ticker_param, ticker_schema};
use crate::error::ToolError;
use crate::provider::DataProvider;
use crate::registry::{ToolDescriptor, ToolHandler};

pub const ANALYZE_NEWS_SENTIMENT: &str = "analyze_news_sentiment";
pub const SOCIAL_MEDIA_TRENDS: &str = "social_media_trends";

const MAX_LOOKBACK_DAYS: u64 = 90;

pub fn tools(provider: &Arc<dyn DataProvider>) -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            ANALYZE_NEWS_SENTIMENT,
            "Analyze sentiment from recent news articles and press releases.",
            ticker_schema(
                "AMZN",
                serde_json::json!({
                    "days": {
                        "type": "integer",
                        "description": "Number of days of news to analyze",
                        "default": 7,
                    }
                }),
            ),
            Arc::new(NewsSentiment {
                provider: Arc::clone(provider),
            }),
        ),
        ToolDescriptor::new(
            SOCIAL_MEDIA_TRENDS,
            "Analyze social media mentions and sentiment trends.",
            ticker_schema("GME", serde_json::json!({})),
            Arc::new(SocialTrends {
                provider: Arc::clone(provider),
            }),
        ),
    ]
}

struct NewsSentiment {
    provider: Arc<dyn DataProvider>,
}

#[async_trait]
impl ToolHandler for NewsSentiment {
    async fn invoke(&self, params: &serde_json::Value) -> Result<ToolResult, ToolError> {
        let ticker = ticker_param(params)?;
        let days = optional_u64(params, "days", 7)?;
        if days == 0 || days > MAX_LOOKBACK_DAYS {
            return Err(ToolError::InvalidParams(format!(
                "days must be between 1 and {MAX_LOOKBACK_DAYS}, got {days}"
            )));
        }
        let data = self.provider.sentiment(&ticker).await?;

        let payload = serde_json::json!({
            "ticker": ticker,
            "days": days,
            "news_sentiment": data.news_sentiment,
            "social_sentiment": data.social_sentiment,
            "analyst_sentiment": data.analyst_sentiment,
            "overall_sentiment": data.overall_sentiment,
            "sentiment_trend": data.sentiment_trend,
            "news_volume": data.news_volume,
            "key_themes": data.key_themes,
        });

        let narrative = format!(
            "News Sentiment Analysis for {ticker} (last {days} days): news {:.2}, social {:.2}, \
             analyst {:.2}, overall {:.2} on a -1 to +1 scale. Trend {:?} across {} articles. \
             Key themes: {}.",
            data.news_sentiment,
            data.social_sentiment,
            data.analyst_sentiment,
            data.overall_sentiment,
            data.sentiment_trend,
            data.news_volume,
            data.key_themes.join(", "),
        );

        Ok(ToolResult::success(payload, narrative))
    }
}

struct SocialTrends {
    provider: Arc<dyn DataProvider>,
}

#[async_trait]
impl ToolHandler for SocialTrends {
    async fn invoke(&self, params: &serde_json::Value) -> Result<ToolResult, ToolError> {
        let ticker = ticker_param(params)?;
        let data = self.provider.sentiment(&ticker).await?;

        let payload = serde_json::json!({
            "ticker": ticker,
            "social_sentiment": data.social_sentiment,
            "mentions": data.social_mentions,
            "engagement_rate": data.social_engagement,
            "sentiment_trend": data.sentiment_trend,
        });

        let narrative = format!(
            "Social Media Analysis for {ticker}: {} mentions, engagement rate {:.1}%, \
             social sentiment {:.2}, trend {:?}.",
            data.social_mentions,
            data.social_engagement * 100.0,
            data.social_sentiment,
            data.sentiment_trend,
        );

        Ok(ToolResult::success(payload, narrative))
    }
}
