// ============================================================================
// Event Sourcing Store - Generic Persistence Layer
// ============================================================================
//
// Backend-agnostic client contract, the ScyllaDB and in-memory backends, and
// the gateway that applies batching and retry policy on top of them.
//
// ============================================================================

pub mod client;
pub mod gateway;
pub mod memory;
pub mod scylladb;

pub use client::{AppendResult, Collections, Snapshot, StoreClient, StoredEvent, Tip};
pub use gateway::{BatchingPolicy, Connector, Gateway, Store, DEFAULT_MAX_ITEMS};
pub use memory::MemoryClient;
pub use scylladb::{ScyllaClient, ScyllaConnector};
