use std::sync::Arc;

use advisor_models::{BackendReply, Conversation, OperationSpec};
use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::AgentError;

/// Turns instructions plus offered operations into either a final answer or a
/// request to run one operation. Mockable for testing.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(
        &self,
        instructions: &str,
        operations: &[OperationSpec],
        conversation: &Conversation,
    ) -> Result<BackendReply, AgentError>;
}

/// Limits how many `complete` calls run at once against the wrapped backend.
///
/// With `max_concurrency = 1` every call is serialized, which lets a
/// single-connection backend be shared by all workers.
pub struct PooledBackend {
    inner: Arc<dyn ReasoningBackend>,
    permits: Semaphore,
    max_concurrency: usize,
}

impl PooledBackend {
    pub fn new(inner: Arc<dyn ReasoningBackend>, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            inner,
            permits: Semaphore::new(max_concurrency),
            max_concurrency,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}

#[async_trait]
impl ReasoningBackend for PooledBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        instructions: &str,
        operations: &[OperationSpec],
        conversation: &Conversation,
    ) -> Result<BackendReply, AgentError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| AgentError::Backend(format!("backend pool closed: {e}")))?;
        debug!(
            backend = self.inner.name(),
            domain = %conversation.domain,
            available = self.permits.available_permits(),
            "Backend permit acquired"
        );
        self.inner
            .complete(instructions, operations, conversation)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_conversation, ScriptedBackend};
    use advisor_models::Domain;
    use std::time::Duration;

    async fn run_concurrently(pool: Arc<PooledBackend>, calls: usize) {
        let handles: Vec<_> = (0..calls)
            .map(|_| {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move {
                    let conversation = sample_conversation(Domain::Technical);
                    pool.complete("instructions", &[], &conversation).await
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
    }

    #[tokio::test]
    async fn single_permit_serializes_calls() {
        let scripted = Arc::new(ScriptedBackend::finals(4).with_delay(Duration::from_millis(20)));
        let pool = Arc::new(PooledBackend::new(scripted.clone(), 1));

        run_concurrently(pool, 4).await;

        assert_eq!(scripted.calls(), 4);
        assert_eq!(scripted.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn wider_pool_allows_overlap() {
        let scripted = Arc::new(ScriptedBackend::finals(4).with_delay(Duration::from_millis(20)));
        let pool = Arc::new(PooledBackend::new(scripted.clone(), 4));

        run_concurrently(pool, 4).await;

        assert_eq!(scripted.calls(), 4);
        assert!(scripted.max_in_flight() > 1);
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let pool = PooledBackend::new(Arc::new(ScriptedBackend::finals(0)), 0);
        assert_eq!(pool.max_concurrency(), 1);
        assert_eq!(pool.name(), "scripted");
    }
}
