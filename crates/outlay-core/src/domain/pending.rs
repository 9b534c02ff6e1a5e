//! Pending queue entries
//!
//! A [`PendingEntry`] is a local write that has not yet been accepted by the
//! remote. The payload is opaque to the sync engine; persisted documents
//! carry it as base64 text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::RecordId;

/// A record waiting to be transmitted to the remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    /// Identifier of the queued record (unique within the queue)
    pub record_id: RecordId,
    /// Serialized record as produced by the write use case
    #[serde(with = "payload_base64")]
    pub payload: Vec<u8>,
    /// When the record was first queued
    pub enqueued_at: DateTime<Utc>,
}

impl PendingEntry {
    /// Creates an entry stamped with the current time
    pub fn new(record_id: RecordId, payload: Vec<u8>) -> Self {
        Self::with_timestamp(record_id, payload, Utc::now())
    }

    /// Creates an entry with an explicit enqueue time
    pub fn with_timestamp(record_id: RecordId, payload: Vec<u8>, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            record_id,
            payload,
            enqueued_at,
        }
    }
}

mod payload_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
