use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::marker::PhantomData;

use crate::error::Result;

// ============================================================================
// Encoded Events
// ============================================================================
//
// The store never sees domain types. A codec turns each event of a union
// into an `EventData` (type name + payload bytes) on the way in and back on
// the way out. Events the codec does not recognise are skipped on load, so
// old streams keep loading after a union drops a case.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub event_type: String,
    pub data: Vec<u8>,
}

impl EventData {
    pub fn new(event_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }

    /// Payload size, used to weigh cache entries
    pub fn size(&self) -> usize {
        self.event_type.len() + self.data.len()
    }
}

/// Union of all events of one aggregate type
pub trait EventUnion: Serialize + DeserializeOwned + Clone + Send + Sync {
    fn event_type(&self) -> &'static str;
}

/// Maps an event union to and from its stored representation
pub trait Codec<E>: Send + Sync {
    fn encode(&self, event: &E) -> Result<EventData>;

    /// `None` when the event type is not part of the union
    fn try_decode(&self, event: &EventData) -> Option<E>;
}

/// serde_json codec over a tagged event union
pub struct JsonCodec<E> {
    _phantom: PhantomData<fn() -> E>,
}

impl<E> JsonCodec<E> {
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<E> Default for JsonCodec<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EventUnion> Codec<E> for JsonCodec<E> {
    fn encode(&self, event: &E) -> Result<EventData> {
        Ok(EventData::new(event.event_type(), serde_json::to_vec(event)?))
    }

    fn try_decode(&self, event: &EventData) -> Option<E> {
        match serde_json::from_slice::<E>(&event.data) {
            Ok(decoded) if decoded.event_type() == event.event_type => Some(decoded),
            Ok(decoded) => {
                tracing::warn!(
                    stored_type = %event.event_type,
                    decoded_type = decoded.event_type(),
                    "Event type mismatch, skipping"
                );
                None
            }
            Err(e) => {
                tracing::debug!(event_type = %event.event_type, error = %e, "Skipping unknown event");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    #[serde(tag = "type", content = "data")]
    enum CounterEvent {
        Incremented { by: i64 },
        Reset,
    }

    impl EventUnion for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Incremented { .. } => "Incremented",
                CounterEvent::Reset => "Reset",
            }
        }
    }

    #[test]
    fn test_encode_uses_union_case_name() {
        let codec = JsonCodec::<CounterEvent>::new();
        let encoded = codec.encode(&CounterEvent::Incremented { by: 2 }).unwrap();

        assert_eq!(encoded.event_type, "Incremented");
        let json: serde_json::Value = serde_json::from_slice(&encoded.data).unwrap();
        assert_eq!(json["data"]["by"], 2);
    }

    #[test]
    fn test_decode_skips_unknown_types() {
        let codec = JsonCodec::<CounterEvent>::new();
        let unknown = EventData::new("Renamed", br#"{"type":"Renamed","data":{}}"#.to_vec());
        assert!(codec.try_decode(&unknown).is_none());

        let garbage = EventData::new("Reset", b"not json".to_vec());
        assert!(codec.try_decode(&garbage).is_none());
    }

    #[test]
    fn test_decode_rejects_mismatched_type_name() {
        let codec = JsonCodec::<CounterEvent>::new();
        let mut encoded = codec.encode(&CounterEvent::Reset).unwrap();
        encoded.event_type = "Incremented".to_string();
        assert!(codec.try_decode(&encoded).is_none());
    }

    #[test]
    fn test_event_size_counts_type_and_payload() {
        let data = EventData::new("Reset", vec![0; 10]);
        assert_eq!(data.size(), 15);
    }
}
