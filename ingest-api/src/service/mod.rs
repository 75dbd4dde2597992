//! Core services sitting between the HTTP handlers and the collaborators

mod audio;
mod clients;
mod idempotency;

pub use audio::AudioService;
pub use clients::ClientService;
pub use idempotency::IdempotencyGuard;
