/// Id generation for tasks and columns.
///
/// Production ids are time-derived: millisecond timestamp in hex followed by
/// a short SHA-256 suffix mixing a process-wide counter with the nanosecond
/// clock. Tests inject `SequentialIds` to get predictable values.
use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};

pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Default, Clone, Copy)]
pub struct TimeIds;

impl IdGenerator for TimeIds {
    fn next_id(&self) -> String {
        let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let now = std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(seq.to_le_bytes());
        hasher.update(now.as_nanos().to_le_bytes());
        let hash = hasher.finalize();
        format!("{:x}-{}", now.as_millis(), hex::encode(&hash[..6]))
    }
}

/// Deterministic ids: `prefix-1`, `prefix-2`, ...
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_time_ids_unique() {
        let ids = TimeIds;
        let generated: HashSet<String> = (0..1000).map(|_| ids.next_id()).collect();
        assert_eq!(generated.len(), 1000);
    }

    #[test]
    fn test_time_id_format() {
        let id = TimeIds.next_id();
        let (millis, suffix) = id.split_once('-').unwrap();
        assert!(u128::from_str_radix(millis, 16).is_ok());
        assert_eq!(suffix.len(), 12);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialIds::new("task");
        assert_eq!(ids.next_id(), "task-1");
        assert_eq!(ids.next_id(), "task-2");
    }
}
