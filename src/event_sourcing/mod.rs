// ============================================================================
// Event Sourcing Infrastructure
// ============================================================================
//
// Generic, reusable event sourcing infrastructure.
// Domain-specific code is in src/domain/
//
// ============================================================================

pub mod cache;
pub mod core;
pub mod decider;
pub mod resolver;
pub mod store;

pub use cache::{Cache, CachingStrategy, SLIDING_WINDOW};
pub use core::*;
pub use decider::Decider;
pub use resolver::{AccessStrategy, Resolver, Stream};
pub use store::{BatchingPolicy, Collections, Gateway, Store};
