use serde::{Deserialize, Serialize};

use crate::event_sourcing::core::EventUnion;
use super::value_objects::TodoItem;

// ============================================================================
// Todo Events - one stream per client
// ============================================================================

/// Todo Event - Union type for all todo list events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TodoEvent {
    Added(TodoItem),
    Updated(TodoItem),
    Deleted { id: i64 },
    /// Removes every item; ids keep counting from `next_id`
    Cleared { next_id: i64 },
    /// Whole list as of an append, written as the stream's snapshot
    Snapshotted { next_id: i64, items: Vec<TodoItem> },
}

impl EventUnion for TodoEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TodoEvent::Added(_) => "Added",
            TodoEvent::Updated(_) => "Updated",
            TodoEvent::Deleted { .. } => "Deleted",
            TodoEvent::Cleared { .. } => "Cleared",
            TodoEvent::Snapshotted { .. } => "Snapshotted",
        }
    }
}

impl TodoEvent {
    /// Events that fully determine the state on their own
    pub fn is_origin(&self) -> bool {
        matches!(self, TodoEvent::Cleared { .. } | TodoEvent::Snapshotted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::{Codec, JsonCodec};

    #[test]
    fn test_origin_events() {
        assert!(TodoEvent::Cleared { next_id: 3 }.is_origin());
        assert!(TodoEvent::Snapshotted { next_id: 0, items: vec![] }.is_origin());
        assert!(!TodoEvent::Deleted { id: 1 }.is_origin());
    }

    #[test]
    fn test_events_encode_with_case_name() {
        let codec = JsonCodec::<TodoEvent>::new();
        let encoded = codec.encode(&TodoEvent::Deleted { id: 4 }).unwrap();

        assert_eq!(encoded.event_type, "Deleted");
        assert_eq!(codec.try_decode(&encoded), Some(TodoEvent::Deleted { id: 4 }));
    }
}
