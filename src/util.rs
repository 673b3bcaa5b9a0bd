use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Source of request timestamps, swappable for deterministic tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default)]
pub struct UtcClock;

impl Clock for UtcClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mints job ids: time-ordered strings, unique for the process lifetime.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// UUIDv7-based generator. Ids within the same millisecond are forced
/// strictly increasing, so id order never contradicts submission order.
#[derive(Debug, Default)]
pub struct MonotonicIdGenerator {
    last: Mutex<u128>,
}

impl IdGenerator for MonotonicIdGenerator {
    fn next_id(&self) -> String {
        let mut last = self.last.lock().expect("id generator mutex poisoned");
        let candidate = Uuid::now_v7().as_u128();
        let next = if candidate > *last {
            candidate
        } else {
            *last + 1
        };
        *last = next;
        Uuid::from_u128(next).to_string()
    }
}

/// Split `items` into consecutive chunks of at most `size` elements,
/// preserving order. A zero size is treated as one.
pub fn batch<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut current = Vec::with_capacity(size.min(items.len()));
    for item in items {
        current.push(item);
        if current.len() == size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
