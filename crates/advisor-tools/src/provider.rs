//! The data-provider boundary.
//!
//! Tools never fetch data themselves; they ask a [`DataProvider`]. Production
//! deployments substitute a real market-data client here without touching
//! workers or the coordinator.

use std::future::Future;
use std::time::Duration;

use advisor_models::{
    AnalystRating, BandPosition, Benchmark, EarningsSurprise, Financials, RiskLevel, RiskProfile,
    SentimentSnapshot, SentimentTrend, TechnicalSnapshot, Trend, VolumeTrend,
};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::memory::SnapshotCache;

#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn financials(&self, ticker: &str) -> Result<Financials, ProviderError>;

    async fn benchmark(
        &self,
        ticker: &str,
        comparison_type: &str,
    ) -> Result<Benchmark, ProviderError>;

    async fn technicals(&self, ticker: &str) -> Result<TechnicalSnapshot, ProviderError>;

    async fn sentiment(&self, ticker: &str) -> Result<SentimentSnapshot, ProviderError>;

    async fn risk(&self, ticker: &str) -> Result<RiskProfile, ProviderError>;
}

const PATTERNS: [&str; 6] = [
    "ascending triangle",
    "head and shoulders",
    "double bottom",
    "bull flag",
    "wedge",
    "channel breakout",
];

const THEMES: [&str; 7] = [
    "earnings growth",
    "market expansion",
    "regulatory concerns",
    "innovation",
    "competition",
    "supply chain",
    "management changes",
];

/// Synthetic, deterministic market data.
///
/// Every snapshot is derived from a seed computed from the ticker, so the same
/// ticker always yields the same numbers and distinct tickers diverge.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockDataProvider;

impl MockDataProvider {
    pub fn new() -> Self {
        Self
    }

    fn rng(ticker: &str, stream: &str) -> StdRng {
        StdRng::seed_from_u64(fnv1a(ticker) ^ fnv1a(stream).rotate_left(17))
    }
}

/// FNV-1a; stable across builds, unlike `DefaultHasher`.
fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

fn pick<T: Copy>(rng: &mut StdRng, options: &[T]) -> T {
    options[rng.gen_range(0..options.len())]
}

#[async_trait]
impl DataProvider for MockDataProvider {
    async fn financials(&self, ticker: &str) -> Result<Financials, ProviderError> {
        let mut rng = Self::rng(ticker, "financials");
        Ok(Financials {
            ticker: ticker.to_string(),
            market_cap: rng.gen_range(50e9..2e12),
            pe_ratio: rng.gen_range(10.0..35.0),
            revenue_growth: rng.gen_range(-0.1..0.3),
            profit_margin: rng.gen_range(0.05..0.25),
            debt_to_equity: rng.gen_range(0.1..2.0),
            roe: rng.gen_range(0.08..0.25),
            current_ratio: rng.gen_range(1.0..3.0),
            earnings_surprise: pick(
                &mut rng,
                &[
                    EarningsSurprise::Beat,
                    EarningsSurprise::Miss,
                    EarningsSurprise::Inline,
                ],
            ),
            analyst_rating: pick(
                &mut rng,
                &[
                    AnalystRating::StrongBuy,
                    AnalystRating::Buy,
                    AnalystRating::Hold,
                    AnalystRating::Sell,
                    AnalystRating::StrongSell,
                ],
            ),
        })
    }

    async fn benchmark(
        &self,
        ticker: &str,
        comparison_type: &str,
    ) -> Result<Benchmark, ProviderError> {
        let mut rng = Self::rng(ticker, &format!("benchmark:{comparison_type}"));
        Ok(Benchmark {
            comparison_type: comparison_type.to_string(),
            pe_ratio: rng.gen_range(15.0..25.0),
            roe: rng.gen_range(0.10..0.20),
            profit_margin: rng.gen_range(0.08..0.18),
        })
    }

    async fn technicals(&self, ticker: &str) -> Result<TechnicalSnapshot, ProviderError> {
        let mut rng = Self::rng(ticker, "technicals");
        let current_price: f64 = rng.gen_range(50.0..500.0);
        Ok(TechnicalSnapshot {
            ticker: ticker.to_string(),
            current_price,
            sma_50: current_price * rng.gen_range(0.95..1.05),
            sma_200: current_price * rng.gen_range(0.90..1.10),
            rsi: rng.gen_range(20.0..80.0),
            macd_signal: pick(&mut rng, &[Trend::Bullish, Trend::Bearish, Trend::Sideways]),
            bollinger_position: pick(
                &mut rng,
                &[BandPosition::Upper, BandPosition::Middle, BandPosition::Lower],
            ),
            volume_trend: pick(
                &mut rng,
                &[
                    VolumeTrend::Increasing,
                    VolumeTrend::Decreasing,
                    VolumeTrend::Stable,
                ],
            ),
            support_level: current_price * rng.gen_range(0.85..0.95),
            resistance_level: current_price * rng.gen_range(1.05..1.15),
            trend: pick(&mut rng, &[Trend::Bullish, Trend::Bearish, Trend::Sideways]),
            pattern: Some(pick(&mut rng, &PATTERNS).to_string()),
        })
    }

    async fn sentiment(&self, ticker: &str) -> Result<SentimentSnapshot, ProviderError> {
        let mut rng = Self::rng(ticker, "sentiment");
        Ok(SentimentSnapshot {
            ticker: ticker.to_string(),
            news_sentiment: rng.gen_range(-1.0..1.0),
            social_sentiment: rng.gen_range(-1.0..1.0),
            analyst_sentiment: rng.gen_range(-1.0..1.0),
            overall_sentiment: rng.gen_range(-1.0..1.0),
            sentiment_trend: pick(
                &mut rng,
                &[
                    SentimentTrend::Improving,
                    SentimentTrend::Deteriorating,
                    SentimentTrend::Stable,
                ],
            ),
            key_themes: THEMES
                .choose_multiple(&mut rng, 3)
                .map(|t| t.to_string())
                .collect(),
            news_volume: rng.gen_range(10..=100),
            social_mentions: rng.gen_range(100..=5000),
            social_engagement: rng.gen_range(0.02..0.15),
        })
    }

    async fn risk(&self, ticker: &str) -> Result<RiskProfile, ProviderError> {
        let mut rng = Self::rng(ticker, "risk");
        let levels = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];
        Ok(RiskProfile {
            ticker: ticker.to_string(),
            beta: rng.gen_range(0.5..2.0),
            volatility: rng.gen_range(0.15..0.60),
            var_95: rng.gen_range(-0.15..-0.05),
            correlation_spy: rng.gen_range(0.3..0.9),
            liquidity_score: rng.gen_range(0.3..1.0),
            sector_risk: pick(&mut rng, &levels),
            regulatory_risk: pick(&mut rng, &levels),
            esg_score: rng.gen_range(30.0..90.0),
            diversification_benefit: rng.gen_range(0.7..0.95),
        })
    }
}

/// Read-through memoization over any provider.
///
/// Snapshots are cached per `kind:TICKER` for the configured TTL. Errors are
/// never cached.
pub struct CachedProvider<P> {
    inner: P,
    cache: SnapshotCache,
}

impl<P: DataProvider> CachedProvider<P> {
    pub fn new(inner: P, max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner,
            cache: SnapshotCache::new(max_capacity, ttl),
        }
    }

    async fn read_through<T, F, Fut>(&self, key: String, fetch: F) -> Result<T, ProviderError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        if let Some(value) = self.cache.get(&key).await {
            match serde_json::from_value(value) {
                Ok(snapshot) => {
                    debug!(key = %key, "Snapshot cache hit");
                    return Ok(snapshot);
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding undecodable cached snapshot");
                    self.cache.invalidate(&key).await;
                }
            }
        }

        let snapshot = fetch().await?;
        match serde_json::to_value(&snapshot) {
            Ok(value) => self.cache.insert(key, value).await,
            Err(e) => warn!(key = %key, error = %e, "Snapshot not cacheable"),
        }
        Ok(snapshot)
    }
}

#[async_trait]
impl<P: DataProvider> DataProvider for CachedProvider<P> {
    async fn financials(&self, ticker: &str) -> Result<Financials, ProviderError> {
        self.read_through(format!("financials:{ticker}"), || self.inner.financials(ticker))
            .await
    }

    async fn benchmark(
        &self,
        ticker: &str,
        comparison_type: &str,
    ) -> Result<Benchmark, ProviderError> {
        self.read_through(format!("benchmark:{comparison_type}:{ticker}"), || {
            self.inner.benchmark(ticker, comparison_type)
        })
        .await
    }

    async fn technicals(&self, ticker: &str) -> Result<TechnicalSnapshot, ProviderError> {
        self.read_through(format!("technicals:{ticker}"), || self.inner.technicals(ticker))
            .await
    }

    async fn sentiment(&self, ticker: &str) -> Result<SentimentSnapshot, ProviderError> {
        self.read_through(format!("sentiment:{ticker}"), || self.inner.sentiment(ticker))
            .await
    }

    async fn risk(&self, ticker: &str) -> Result<RiskProfile, ProviderError> {
        self.read_through(format!("risk:{ticker}"), || self.inner.risk(ticker))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn mock_is_deterministic_per_ticker() {
        let provider = MockDataProvider::new();
        let a = provider.financials("AAPL").await.unwrap();
        let b = provider.financials("AAPL").await.unwrap();
        let c = provider.financials("MSFT").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn mock_values_within_ranges() {
        let provider = MockDataProvider::new();
        for ticker in ["AAPL", "MSFT", "TSLA", "JPM", "BRK.B"] {
            let f = provider.financials(ticker).await.unwrap();
            assert!((10.0..35.0).contains(&f.pe_ratio));
            let t = provider.technicals(ticker).await.unwrap();
            assert!((20.0..80.0).contains(&t.rsi));
            assert!(t.support_level < t.current_price && t.current_price < t.resistance_level);
            let s = provider.sentiment(ticker).await.unwrap();
            assert_eq!(s.key_themes.len(), 3);
            assert!((-1.0..1.0).contains(&s.overall_sentiment));
            let r = provider.risk(ticker).await.unwrap();
            assert!(r.var_95 < 0.0);
            assert!((0.5..2.0).contains(&r.beta));
        }
    }

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        inner: MockDataProvider,
    }

    #[async_trait]
    impl DataProvider for CountingProvider {
        async fn financials(&self, ticker: &str) -> Result<Financials, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.financials(ticker).await
        }
        async fn benchmark(&self, ticker: &str, kind: &str) -> Result<Benchmark, ProviderError> {
            self.inner.benchmark(ticker, kind).await
        }
        async fn technicals(&self, ticker: &str) -> Result<TechnicalSnapshot, ProviderError> {
            self.inner.technicals(ticker).await
        }
        async fn sentiment(&self, ticker: &str) -> Result<SentimentSnapshot, ProviderError> {
            self.inner.sentiment(ticker).await
        }
        async fn risk(&self, _ticker: &str) -> Result<RiskProfile, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Unavailable("risk feed down".to_string()))
        }
    }

    #[tokio::test]
    async fn cached_provider_memoizes_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CachedProvider::new(
            CountingProvider {
                calls: calls.clone(),
                inner: MockDataProvider::new(),
            },
            100,
            Duration::from_secs(60),
        );

        let first = provider.financials("AAPL").await.unwrap();
        let second = provider.financials("AAPL").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cached_provider_does_not_cache_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CachedProvider::new(
            CountingProvider {
                calls: calls.clone(),
                inner: MockDataProvider::new(),
            },
            100,
            Duration::from_secs(60),
        );

        assert!(provider.risk("AAPL").await.is_err());
        assert!(provider.risk("AAPL").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
