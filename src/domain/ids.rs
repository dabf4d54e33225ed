use chrono::Utc;
use uuid::Uuid;

/// Source of identifiers for balance rows, history entries and transactions.
///
/// Implementations must hand out globally unique values that sort roughly in
/// creation order when compared as strings.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// UUIDv7 identifiers: a millisecond timestamp prefix followed by random bits,
/// rendered in the lowercase hyphenated form.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeOrderedIds;

impl IdGenerator for TimeOrderedIds {
    fn next_id(&self) -> String {
        Uuid::now_v7().to_string()
    }
}

/// Millisecond wall clock used to stamp history entries.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let ids = TimeOrderedIds;
        let generated: HashSet<String> = (0..1000).map(|_| ids.next_id()).collect();
        assert_eq!(generated.len(), 1000);
    }

    #[test]
    fn test_ids_sort_in_creation_order() {
        let ids = TimeOrderedIds;
        let first = ids.next_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = ids.next_id();
        assert!(first < second);
    }
}
