//! Per-request context: the caller's request identifier and its deadline

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Error, Result};

/// Identity and deadline of one inbound request
///
/// Every store and relay call made on behalf of the request runs through
/// [`RequestContext::within`], so one deadline covers the whole
/// check → mutate → commit sequence.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    deadline: Instant,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            request_id: request_id.into(),
            deadline: Instant::now() + timeout,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Run `fut` under the request deadline
    ///
    /// The future is dropped when the deadline passes, so nothing after its
    /// current suspension point runs.
    pub async fn within<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout_at(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout { operation }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_within_passes_results_through() {
        let ctx = RequestContext::new("req", Duration::from_secs(5));
        assert_eq!(ctx.request_id(), "req");

        let ok: Result<u8> = ctx.within("op", async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: Result<u8> = ctx
            .within("op", async { Err(Error::BadRequest("nope".into())) })
            .await;
        assert!(matches!(err, Err(Error::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_within_times_out() {
        let ctx = RequestContext::new("req", Duration::from_millis(20));

        let result: Result<()> = ctx
            .within("slow.op", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        match result {
            Err(Error::Timeout { operation }) => assert_eq!(operation, "slow.op"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
