//! Check-then-commit guard around mutating operations

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info_span, warn, Instrument, Span};

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::store::IdempotencyStore;

/// Runs an operation at most once per request identifier within the TTL
///
/// The sequence is check, then operation, then commit. A failed operation
/// leaves no marker, so the caller may retry with the same identifier. An
/// operation that succeeds but whose commit fails has still taken effect;
/// a retry will run it again.
#[derive(Clone)]
pub struct IdempotencyGuard {
    store: Arc<dyn IdempotencyStore>,
    ttl: Duration,
    span: Span,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn IdempotencyStore>, ttl: Duration, span: Span) -> Self {
        Self { store, ttl, span }
    }

    pub async fn guard<T, F, Fut>(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        op: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let span = info_span!(
            parent: &self.span,
            "idempotency_guard",
            request_id = ctx.request_id(),
            operation,
            backend = self.store.backend(),
        );

        self.check_run_commit(ctx, op).instrument(span).await
    }

    async fn check_run_commit<T, F, Fut>(&self, ctx: &RequestContext, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let key = ctx.request_id();

        let seen = ctx
            .within("idempotency.check", async {
                self.store
                    .exists(key)
                    .await
                    .map_err(|e| Error::store("idempotency.check", e))
            })
            .await?;

        if seen {
            debug!("Request already processed");
            return Err(Error::RequestAlreadyProcessed(key.to_string()));
        }

        let value = op().await?;

        let committed = ctx
            .within("idempotency.commit", async {
                self.store
                    .set(key, true, self.ttl)
                    .await
                    .map_err(|e| Error::store("idempotency.commit", e))
            })
            .await;

        if let Err(e) = committed {
            warn!("Operation applied but not committed: {}", e);
            return Err(e);
        }

        Ok(value)
    }
}
