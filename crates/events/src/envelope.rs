use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::RecordId;

/// Envelope for a published change event.
///
/// Notes:
/// - `revision` is the record revision the mutation committed at; consumers
///   can use it to discard stale or duplicate deliveries per record.
/// - Ordering across different records is not guaranteed; per record the
///   revision is non-decreasing in publication order.
/// - `payload` is the domain-agnostic event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    record_id: RecordId,
    stream: String,

    /// Record revision at which the mutation committed.
    revision: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        record_id: RecordId,
        stream: impl Into<String>,
        revision: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            record_id,
            stream: stream.into(),
            revision,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn record_id(&self) -> RecordId {
        self.record_id
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_through_json() {
        let envelope = EventEnvelope::new(
            Uuid::now_v7(),
            RecordId::new(),
            "inventory.record",
            7,
            serde_json::json!({ "kind": "reserved", "qty": 3 }),
        );

        let json = serde_json::to_string(&envelope).unwrap();
        let back: EventEnvelope<serde_json::Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(envelope, back);
        assert_eq!(back.revision(), 7);
        assert_eq!(back.stream(), "inventory.record");
    }
}
