//! Client registration and profile management

use std::future::Future;
use std::sync::Arc;

use ingest_common::{Client, ClientInfo};
use tracing::{debug, error, info, info_span, Instrument, Span};

use crate::context::RequestContext;
use crate::error::{Error, ErrorKind, Result};
use crate::service::IdempotencyGuard;
use crate::store::{ClientStore, StoreError};

/// CRUD over the client store
///
/// Mutations run through the idempotency guard when one is configured. The
/// service keeps no client data of its own.
#[derive(Clone)]
pub struct ClientService {
    store: Arc<dyn ClientStore>,
    guard: Option<IdempotencyGuard>,
    span: Span,
}

impl ClientService {
    pub fn new(store: Arc<dyn ClientStore>, guard: Option<IdempotencyGuard>, span: Span) -> Self {
        Self { store, guard, span }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Register a new client and return its store-assigned identifier
    pub async fn create(&self, ctx: &RequestContext, info: ClientInfo) -> Result<String> {
        info.validate()?;

        let id = self
            .mutate(ctx, "clients.create", true, || async {
                ctx.within("clients.create", async {
                    self.store
                        .create(&info)
                        .await
                        .map_err(|e| Error::store("clients.create", e))
                })
                .await
            })
            .await?;

        info!(parent: &self.span, request_id = ctx.request_id(), client_id = %id, "Client registered");
        Ok(id)
    }

    pub async fn get(&self, ctx: &RequestContext, id: &str) -> Result<Client> {
        let span = info_span!(parent: &self.span, "clients.get", request_id = ctx.request_id(), client_id = id);

        ctx.within("clients.get", async {
            self.store
                .get(id)
                .await
                .map_err(|e| not_found_or("clients.get", id, e))
        })
        .instrument(span.clone())
        .await
        .inspect_failure(&span)
    }

    /// Replace every mutable field of an existing client
    ///
    /// Guarded only when the store can update fields in place.
    pub async fn update(&self, ctx: &RequestContext, id: &str, info: ClientInfo) -> Result<()> {
        info.validate()?;
        let guarded = self.store.supports_structured_update();

        self.mutate(ctx, "clients.update", guarded, || async {
            ctx.within("clients.update", async {
                self.store
                    .update(id, &info)
                    .await
                    .map_err(|e| not_found_or("clients.update", id, e))
            })
            .await
        })
        .await?;

        info!(parent: &self.span, request_id = ctx.request_id(), client_id = id, "Client updated");
        Ok(())
    }

    pub async fn delete(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        self.mutate(ctx, "clients.delete", true, || async {
            ctx.within("clients.delete", async {
                self.store
                    .delete(id)
                    .await
                    .map_err(|e| not_found_or("clients.delete", id, e))
            })
            .await
        })
        .await?;

        info!(parent: &self.span, request_id = ctx.request_id(), client_id = id, "Client deleted");
        Ok(())
    }

    /// Run a store mutation, through the guard when `guarded` and one is configured
    async fn mutate<T, F, Fut>(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        guarded: bool,
        op: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let span = info_span!(parent: &self.span, "clients.mutate", request_id = ctx.request_id(), operation);

        let result = match self.guard.as_ref().filter(|_| guarded) {
            Some(guard) => guard.guard(ctx, operation, op).instrument(span.clone()).await,
            None => {
                debug!(parent: &span, "Running without idempotency guard");
                op().instrument(span.clone()).await
            }
        };

        result.inspect_failure(&span)
    }
}

fn not_found_or(operation: &'static str, id: &str, err: StoreError) -> Error {
    match err {
        StoreError::NotFound => Error::ClientNotFound(id.to_string()),
        other => Error::store(operation, other),
    }
}

/// Log infrastructure failures under the given span before they leave the service
trait InspectFailure {
    fn inspect_failure(self, span: &Span) -> Self;
}

impl<T> InspectFailure for Result<T> {
    fn inspect_failure(self, span: &Span) -> Self {
        if let Err(e) = &self {
            if e.kind() == ErrorKind::Infrastructure {
                error!(parent: span, operation = e.operation().unwrap_or("unknown"), "{}", e);
            }
        }
        self
    }
}
