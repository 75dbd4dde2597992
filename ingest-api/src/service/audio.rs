//! Audio upload: validate, attach identity, relay

use std::sync::Arc;

use ingest_common::{uuid_utils, AudioMessage, RelayEnvelope};
use tracing::{error, info, info_span, Instrument, Span};
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::relay::{AudioRelay, RelayReceipt};

#[derive(Clone)]
pub struct AudioService {
    relay: Arc<dyn AudioRelay>,
    required_length: usize,
    span: Span,
}

impl AudioService {
    pub fn new(relay: Arc<dyn AudioRelay>, required_length: usize, span: Span) -> Self {
        Self {
            relay,
            required_length,
            span,
        }
    }

    pub fn required_length(&self) -> usize {
        self.required_length
    }

    pub fn relay_backend(&self) -> &'static str {
        self.relay.backend()
    }

    /// Forward one audio sample of a client to the relay
    ///
    /// Uploads are not idempotency-guarded: a replay is relayed again.
    pub async fn upload(
        &self,
        ctx: &RequestContext,
        client_id: &str,
        message: AudioMessage,
    ) -> Result<RelayReceipt> {
        let span = info_span!(
            parent: &self.span,
            "audio.upload",
            request_id = ctx.request_id(),
            client_id,
            relay = self.relay.backend(),
        );

        let client_id = parse_identifier(client_id)?;
        let request_id = parse_identifier(ctx.request_id())?;

        let actual = message.payload.len();
        if actual != self.required_length {
            return Err(Error::PayloadLengthMismatch {
                expected: self.required_length,
                actual,
            });
        }

        let envelope = RelayEnvelope::new(request_id, client_id, message)?;

        let sent = ctx
            .within("audio.send", async {
                self.relay
                    .send(&envelope)
                    .await
                    .map_err(|e| Error::relay("audio.send", e))
            })
            .instrument(span.clone())
            .await;

        match sent {
            Ok(receipt) => {
                info!(
                    parent: &span,
                    partition = receipt.partition,
                    offset = receipt.offset,
                    "Audio relayed"
                );
                Ok(receipt)
            }
            Err(e) => {
                error!(parent: &span, operation = "audio.send", "{}", e);
                Err(e)
            }
        }
    }
}

fn parse_identifier(raw: &str) -> Result<Uuid> {
    uuid_utils::parse(raw).map_err(|e| Error::InvalidIdentifier {
        raw: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::RecordingRelay;
    use ingest_common::time;
    use std::time::Duration;

    fn service(relay: Arc<RecordingRelay>) -> AudioService {
        AudioService::new(relay, 1000, Span::none())
    }

    fn ctx() -> (RequestContext, Uuid) {
        let request_id = Uuid::new_v4();
        (
            RequestContext::new(request_id.to_string(), Duration::from_secs(5)),
            request_id,
        )
    }

    fn message(len: usize) -> AudioMessage {
        AudioMessage {
            timestamp: time::from_unix_nanos(1_700_000_000_123_456_789),
            payload: vec![0x5a; len],
        }
    }

    #[tokio::test]
    async fn test_short_payload_is_rejected() {
        let relay = Arc::new(RecordingRelay::default());
        let (ctx, _) = ctx();

        let err = service(relay.clone())
            .upload(&ctx, &Uuid::new_v4().to_string(), message(999))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::PayloadLengthMismatch { expected: 1000, actual: 999 }
        ));
        assert!(relay.sent().is_empty());
    }

    #[tokio::test]
    async fn test_long_payload_is_rejected() {
        let relay = Arc::new(RecordingRelay::default());
        let (ctx, _) = ctx();

        let result = service(relay.clone())
            .upload(&ctx, &Uuid::new_v4().to_string(), message(1001))
            .await;

        assert!(matches!(result, Err(Error::PayloadLengthMismatch { actual: 1001, .. })));
        assert!(relay.sent().is_empty());
    }

    #[tokio::test]
    async fn test_valid_upload_is_relayed_with_identity() {
        let relay = Arc::new(RecordingRelay::default());
        let (ctx, request_id) = ctx();
        let client_id = Uuid::new_v4();

        let receipt = service(relay.clone())
            .upload(&ctx, &client_id.to_string(), message(1000))
            .await
            .unwrap();

        assert_eq!(receipt, RelayReceipt { partition: 0, offset: 0 });
        let sent = relay.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].request_id, request_id);
        assert_eq!(sent[0].client_id, client_id);
        assert_eq!(sent[0].timestamp, 1_700_000_000_123_456_789);
        assert_eq!(sent[0].payload.len(), 1000);
    }

    #[tokio::test]
    async fn test_malformed_client_id_is_rejected() {
        let relay = Arc::new(RecordingRelay::default());
        let (ctx, _) = ctx();

        let result = service(relay.clone())
            .upload(&ctx, "not-a-uuid", message(1000))
            .await;

        assert!(matches!(result, Err(Error::InvalidIdentifier { ref raw, .. }) if raw == "not-a-uuid"));
        assert!(relay.sent().is_empty());
    }

    #[tokio::test]
    async fn test_replayed_upload_is_relayed_again() {
        let relay = Arc::new(RecordingRelay::default());
        let service = service(relay.clone());
        let (ctx, _) = ctx();
        let client_id = Uuid::new_v4().to_string();

        service.upload(&ctx, &client_id, message(1000)).await.unwrap();
        let second = service.upload(&ctx, &client_id, message(1000)).await.unwrap();

        assert_eq!(second.offset, 1);
        assert_eq!(relay.sent().len(), 2);
    }
}
