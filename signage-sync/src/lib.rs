//! signage-sync: wire format and chunked push/pull over the "schedule" channel.
//!
//! Transport-agnostic. Callers plug in anything implementing [`Transport`] and
//! feed incoming frames back through [`SyncClient::handle_incoming`].

pub mod error;
pub mod message;
pub mod sync;
pub mod wire;

pub use error::SyncError;
pub use message::{BranchQuery, IncomingMessage, OutgoingMessage, PushAction, PushPayload};
pub use sync::{serialize, ChunkStatus, PushChunk, PushSession, SyncClient, SyncEvent, Transport, DEFAULT_CHUNK_SIZE};
pub use wire::WireSlot;
