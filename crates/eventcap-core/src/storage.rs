//! Record storage: a growable list, or a fixed ring with a write cursor.

use std::sync::Arc;

use crate::record::Record;

/// Upper bound on slots reserved up front; larger rings grow as they fill.
const PREALLOCATED_SLOTS: usize = 1024;

#[derive(Debug, Clone)]
pub(crate) enum Storage {
    Unbounded(Vec<Arc<Record>>),
    /// `cursor` is the next slot to write. While the ring is filling it equals
    /// `slots.len()`; once full it points at the oldest record.
    Ring {
        slots: Vec<Arc<Record>>,
        cursor: usize,
        capacity: usize,
    },
}

impl Storage {
    /// `limit == 0` is unbounded.
    pub(crate) fn new(limit: usize) -> Self {
        if limit == 0 {
            Self::Unbounded(Vec::new())
        } else {
            Self::Ring {
                slots: Vec::with_capacity(limit.min(PREALLOCATED_SLOTS)),
                cursor: 0,
                capacity: limit,
            }
        }
    }

    pub(crate) fn push(&mut self, record: Arc<Record>) {
        match self {
            Self::Unbounded(records) => records.push(record),
            Self::Ring {
                slots,
                cursor,
                capacity,
            } => {
                if slots.len() < *capacity {
                    slots.push(record);
                    *cursor = slots.len() % *capacity;
                } else {
                    slots[*cursor] = record;
                    *cursor = (*cursor + 1) % *capacity;
                }
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Unbounded(records) => records.len(),
            Self::Ring { slots, .. } => slots.len(),
        }
    }

    /// Records oldest to newest.
    pub(crate) fn chronological(&self) -> Vec<Arc<Record>> {
        match self {
            Self::Unbounded(records) => records.clone(),
            Self::Ring { slots, cursor, .. } => slots[*cursor..]
                .iter()
                .chain(&slots[..*cursor])
                .cloned()
                .collect(),
        }
    }

    /// Empties storage and rewinds the cursor, keeping the mode.
    pub(crate) fn clear(&mut self) {
        match self {
            Self::Unbounded(records) => records.clear(),
            Self::Ring { slots, cursor, .. } => {
                slots.clear();
                *cursor = 0;
            }
        }
    }

    /// Switches to a new limit, keeping the most recent records by insertion
    /// order. Returns how many records were dropped.
    pub(crate) fn resize(&mut self, limit: usize) -> usize {
        let records = self.chronological();
        let dropped = if limit == 0 {
            0
        } else {
            records.len().saturating_sub(limit)
        };

        *self = if limit == 0 {
            Self::Unbounded(records)
        } else {
            let slots: Vec<Arc<Record>> = records.into_iter().skip(dropped).collect();
            Self::Ring {
                cursor: slots.len() % limit,
                slots,
                capacity: limit,
            }
        };
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordHeader;
    use serde_json::Map;

    fn record(at: i64) -> Arc<Record> {
        Arc::new(Record {
            header: RecordHeader {
                at,
                source: "s".to_string(),
                level: "log".to_string(),
                event: None,
                trace: None,
                last_at: None,
                delta: None,
            },
            body: Arc::new(Map::new()),
        })
    }

    fn ats(storage: &Storage) -> Vec<i64> {
        storage.chronological().iter().map(|r| r.header.at).collect()
    }

    #[test]
    fn ring_overwrites_oldest() {
        let mut storage = Storage::new(3);
        for at in 1..=7 {
            storage.push(record(at));
        }
        assert_eq!(storage.len(), 3);
        assert_eq!(ats(&storage), vec![5, 6, 7]);
    }

    #[test]
    fn huge_ring_does_not_reserve_its_capacity() {
        let mut storage = Storage::new(usize::MAX);
        for at in 1..=3 {
            storage.push(record(at));
        }
        assert_eq!(ats(&storage), vec![1, 2, 3]);
        match &storage {
            Storage::Ring { slots, cursor, capacity } => {
                assert!(slots.capacity() <= PREALLOCATED_SLOTS);
                assert_eq!(*cursor, 3);
                assert_eq!(*capacity, usize::MAX);
            }
            Storage::Unbounded(_) => panic!("non-zero limit should be a ring"),
        }
    }

    #[test]
    fn ring_cursor_tracks_fill() {
        let mut storage = Storage::new(2);
        storage.push(record(1));
        assert!(matches!(storage, Storage::Ring { cursor: 1, .. }));
        storage.push(record(2));
        assert!(matches!(storage, Storage::Ring { cursor: 0, .. }));
        storage.push(record(3));
        assert!(matches!(storage, Storage::Ring { cursor: 1, .. }));
        assert_eq!(ats(&storage), vec![2, 3]);
    }

    #[test]
    fn shrink_keeps_most_recent() {
        let mut storage = Storage::new(4);
        for at in 1..=6 {
            storage.push(record(at));
        }
        assert_eq!(storage.resize(2), 2);
        assert_eq!(ats(&storage), vec![5, 6]);

        storage.push(record(7));
        assert_eq!(ats(&storage), vec![6, 7]);
    }

    #[test]
    fn grow_and_unbound_preserve_order() {
        let mut storage = Storage::new(2);
        for at in 1..=3 {
            storage.push(record(at));
        }
        assert_eq!(storage.resize(5), 0);
        storage.push(record(4));
        assert_eq!(ats(&storage), vec![2, 3, 4]);

        assert_eq!(storage.resize(0), 0);
        storage.push(record(5));
        assert_eq!(ats(&storage), vec![2, 3, 4, 5]);
        assert!(matches!(storage, Storage::Unbounded(_)));
    }

    #[test]
    fn unbounded_to_ring_truncates() {
        let mut storage = Storage::new(0);
        for at in 1..=5 {
            storage.push(record(at));
        }
        assert_eq!(storage.resize(3), 2);
        assert_eq!(ats(&storage), vec![3, 4, 5]);
        storage.push(record(6));
        assert_eq!(ats(&storage), vec![4, 5, 6]);
    }

    #[test]
    fn clear_rewinds() {
        let mut storage = Storage::new(2);
        for at in 1..=3 {
            storage.push(record(at));
        }
        storage.clear();
        assert_eq!(storage.len(), 0);
        storage.push(record(9));
        assert_eq!(ats(&storage), vec![9]);
    }
}
