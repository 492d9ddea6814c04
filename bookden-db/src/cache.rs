//! Bounded identity cache for book records.
//!
//! Keyed by the composite path key with a secondary id index. Insertion
//! order doubles as the eviction order; the store clears the whole cache
//! on flush, so precision of the eviction policy matters less than the
//! bound itself.

use std::collections::{HashMap, VecDeque};

use bookden_core::BookRecord;

pub(crate) struct RecordCache {
    capacity: usize,
    by_path: HashMap<String, BookRecord>,
    by_id: HashMap<i64, String>,
    order: VecDeque<String>,
}

impl RecordCache {
    pub fn new(capacity: usize) -> RecordCache {
        RecordCache {
            capacity,
            by_path: HashMap::new(),
            by_id: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, path_key: &str) -> Option<BookRecord> {
        self.by_path.get(path_key).cloned()
    }

    pub fn get_by_id(&self, id: i64) -> Option<BookRecord> {
        let path_key = self.by_id.get(&id)?;
        self.by_path.get(path_key).cloned()
    }

    pub fn put(&mut self, record: BookRecord) {
        let path_key = record.path_key();
        if let Some(id) = record.id {
            self.by_id.insert(id, path_key.clone());
        }
        if self.by_path.insert(path_key.clone(), record).is_none() {
            self.order.push_back(path_key);
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                if let Some(evicted) = self.by_path.remove(&oldest) {
                    if let Some(id) = evicted.id {
                        self.by_id.remove(&id);
                    }
                }
            }
        }
    }

    pub fn remove(&mut self, path_key: &str) {
        if let Some(removed) = self.by_path.remove(path_key) {
            if let Some(id) = removed.id {
                self.by_id.remove(&id);
            }
            self.order.retain(|k| k != path_key);
        }
    }

    pub fn clear(&mut self) {
        self.by_path.clear();
        self.by_id.clear();
        self.order.clear();
    }
}
