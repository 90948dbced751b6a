// ============================================================================
// Event Sourcing Core - Generic Infrastructure Abstractions
// ============================================================================
//
// Aggregate-agnostic building blocks: encoded events, codecs, stream
// identity and the function types a resolver is built from.
//
// ============================================================================

pub mod event;
pub mod stream;

pub use event::{Codec, EventData, EventUnion, JsonCodec};
pub use stream::{Compact, Fold, IsOrigin, StreamToken, SyncResult, Target};
