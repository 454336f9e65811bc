//! Record-to-payload encoding

use shared::Record;

use crate::types::{Batch, Payload};

/// Flatten one record into the object sent to the model
pub fn encode(record: &Record) -> Payload {
    Payload {
        id: record.id,
        content: format!("{} {} {} {}", record.title, record.period, record.author, record.body),
    }
}

/// Payloads for every member of a batch, in batch order
pub fn encode_batch(batch: &Batch, records: &[Record]) -> Vec<Payload> {
    batch.records(records).map(encode).collect()
}

/// Size of the compact JSON form of a payload, counted in characters
pub fn serialized_size(payload: &Payload) -> usize {
    serde_json::to_string(payload)
        .map(|json| json.chars().count())
        // a struct of an integer and a string always serializes; keep a sane estimate regardless
        .unwrap_or_else(|_| payload.content.chars().count())
}
