use std::time::Duration;

use serde::Serialize;

use crate::constants::*;
use crate::types::Format;

/// One byte offset ↔ time association, recorded per pack header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub offset: u64,
    pub time: Duration,
}

/// Byte/time associations ordered by offset
#[derive(Debug, Default, Clone)]
pub struct SeekIndex {
    entries: Vec<IndexEntry>,
}

impl SeekIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /* pack headers revisited after a seek replace their old association */
    pub fn add_association(&mut self, offset: u64, time: Duration) {
        let entry = IndexEntry { offset, time };
        match self.entries.binary_search_by_key(&offset, |e| e.offset) {
            Ok(pos) => self.entries[pos] = entry,
            Err(pos) => self.entries.insert(pos, entry),
        }
    }

    /// Last association at or before `value`, expressed in `format`
    pub fn lookup_before(&self, format: Format, value: u64) -> Option<IndexEntry> {
        let key = |e: &IndexEntry| match format {
            Format::Bytes => e.offset,
            Format::Time => e.time.as_nanos() as u64,
            Format::Scr => ns_to_mpegtime(e.time.as_nanos() as u64),
        };
        // time is not guaranteed to be monotonic in offset order
        self.entries
            .iter()
            .filter(|e| key(e) <= value)
            .max_by_key(|e| (key(e), e.offset))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> SeekIndex {
        let mut idx = SeekIndex::new();
        idx.add_association(0, Duration::from_millis(0));
        idx.add_association(4096, Duration::from_millis(500));
        idx.add_association(2048, Duration::from_millis(250));
        idx
    }

    #[test]
    fn entries_stay_ordered() {
        let idx = index();
        let offsets: Vec<_> = idx.entries().iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![0, 2048, 4096]);
    }

    #[test]
    fn lookup_by_bytes_and_time() {
        let idx = index();
        assert_eq!(idx.lookup_before(Format::Bytes, 3000).unwrap().offset, 2048);
        assert_eq!(idx.lookup_before(Format::Bytes, 4096).unwrap().offset, 4096);
        let t = Duration::from_millis(499).as_nanos() as u64;
        assert_eq!(idx.lookup_before(Format::Time, t).unwrap().offset, 2048);
        assert_eq!(idx.lookup_before(Format::Scr, 90_000).unwrap().offset, 4096);
    }

    #[test]
    fn nothing_before_first_entry() {
        let mut idx = SeekIndex::new();
        idx.add_association(100, Duration::from_secs(1));
        assert!(idx.lookup_before(Format::Bytes, 99).is_none());
    }

    #[test]
    fn revisited_offset_is_replaced() {
        let mut idx = index();
        idx.add_association(2048, Duration::from_millis(260));
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.entries()[1].time, Duration::from_millis(260));
    }
}
