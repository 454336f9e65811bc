//! Greedy, order-preserving batch partitioning

use shared::Record;

use crate::core::encoder::{encode, serialized_size};
use crate::types::Batch;

/// Group records into batches bounded by a character budget and an item cap
///
/// A record whose own payload meets or exceeds `max_chars` is isolated in a
/// singleton batch. Records are never split, dropped or duplicated.
pub fn partition(records: &[Record], max_chars: usize, max_items: usize) -> Vec<Batch> {
    let max_items = max_items.max(1);
    let mut batches = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut current_chars = 0usize;

    for (idx, record) in records.iter().enumerate() {
        let size = serialized_size(&encode(record));

        if size >= max_chars {
            if !current.is_empty() {
                batches.push(Batch::new(std::mem::take(&mut current)));
                current_chars = 0;
            }
            batches.push(Batch::new(vec![idx]));
            continue;
        }

        let over_budget = !current.is_empty() && current_chars + size > max_chars;
        if over_budget || current.len() >= max_items {
            batches.push(Batch::new(std::mem::take(&mut current)));
            current_chars = 0;
        }

        current.push(idx);
        current_chars += size;
    }

    if !current.is_empty() {
        batches.push(Batch::new(current));
    }

    batches
}
