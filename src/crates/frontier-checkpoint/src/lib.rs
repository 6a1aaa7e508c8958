//! # frontier-checkpoint — durable state for the frontier execution core
//!
//! Checkpoint data model, the [`Store`] capability contract, and a
//! process-local reference implementation of it. `frontier-core` depends on
//! this crate for every durability-facing type; concrete production backends
//! (Postgres, object storage, whatever a deployment needs) live outside this
//! workspace and implement [`Store`] directly.
//!
//! ## Core concepts
//!
//! - [`Checkpoint`] — an atomic, durable snapshot of one run at one step,
//!   identified by a SHA-256 idempotency key (see [`idempotency`]).
//! - [`Store`] — the trait the engine calls to persist steps, commit
//!   checkpoints, and drain the observability outbox.
//! - [`InMemoryStore`] — a thread-safe, non-persistent reference backend
//!   used by this workspace's own tests.
//! - [`Event`] / [`Emitter`] — the observability event shape shared between
//!   the in-process emitter capability and the store's outbox.

pub mod checkpoint;
pub mod error;
pub mod event;
pub mod idempotency;
pub mod memory;
pub mod serializer;
pub mod store;

pub use checkpoint::{Checkpoint, FrontierEntry, RecordedIo};
pub use error::{CheckpointError, Result};
pub use event::{Event, EventKind};
pub use idempotency::{compute_idempotency_key, OrderedItem};
pub use memory::InMemoryStore;
pub use store::{Emitter, NoopEmitter, Store, TracingEmitter};
