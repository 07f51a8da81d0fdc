use std::collections::HashMap;

use roster_core::{ConnectionId, PresenceRecord};

/// Who is online: one presence record per joined connection.
///
/// A plain data structure. It never broadcasts and is not synchronized; the
/// lifecycle handler owns it behind its lock.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    records: HashMap<ConnectionId, Entry>,
    next_seq: u64,
}

#[derive(Debug)]
struct Entry {
    seq: u64,
    record: PresenceRecord,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for `record.connection_id`. A replaced
    /// record keeps its position in the roster.
    pub fn upsert(&mut self, record: PresenceRecord) {
        if let Some(entry) = self.records.get_mut(&record.connection_id) {
            entry.record = record;
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.records.insert(record.connection_id.clone(), Entry { seq, record });
    }

    /// Remove the record for a connection, if any.
    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<PresenceRecord> {
        self.records.remove(connection_id).map(|e| e.record)
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<&PresenceRecord> {
        self.records.get(connection_id).map(|e| &e.record)
    }

    /// All records in first-join order.
    pub fn snapshot(&self) -> Vec<PresenceRecord> {
        let mut entries: Vec<&Entry> = self.records.values().collect();
        entries.sort_unstable_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.record.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
