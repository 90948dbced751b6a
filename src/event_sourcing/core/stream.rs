use std::sync::Arc;

// ============================================================================
// Stream Identity & Versioning
// ============================================================================

/// State reconstruction: apply events, in order, to a state
pub type Fold<E, S> = Arc<dyn Fn(S, &[E]) -> S + Send + Sync>;

/// True for events that make everything before them irrelevant
pub type IsOrigin<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Produces a single event that, folded over the initial state, yields `S`
pub type Compact<E, S> = Arc<dyn Fn(&S) -> E + Send + Sync>;

/// Identifies the stream an aggregate instance lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// `{category}-{id}`
    AggregateId { category: String, id: String },
    /// Stream name used as-is
    StreamName(String),
}

impl Target {
    pub fn aggregate(category: impl Into<String>, id: impl ToString) -> Self {
        Target::AggregateId {
            category: category.into(),
            id: id.to_string(),
        }
    }

    pub fn stream_name(&self) -> String {
        match self {
            Target::AggregateId { category, id } => format!("{}-{}", category, id),
            Target::StreamName(name) => name.clone(),
        }
    }
}

/// Position of a loaded state within its stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamToken {
    /// Number of events in the stream when the state was produced
    pub version: i64,
    /// Encoded bytes the state was folded from
    pub bytes: u64,
}

impl StreamToken {
    pub fn new(version: i64, bytes: u64) -> Self {
        Self { version, bytes }
    }
}

/// Outcome of an optimistic append
#[derive(Debug, Clone, PartialEq)]
pub enum SyncResult<S> {
    /// Events were appended; token and state reflect them
    Written(StreamToken, S),
    /// Someone else appended first; carries a fresh load to decide against
    Conflict(StreamToken, S),
}
