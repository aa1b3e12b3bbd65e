//! Bounded batch accumulator.
//!
//! Entries are buffered in source order until the configured capacity is
//! reached, at which point the full batch is handed back for delivery.
//! The tail loop flushes any residue explicitly at the end of a read pass.

use roamlog_core::LogEntry;

/// Accumulates [`LogEntry`] values into batches of at most `capacity`.
#[derive(Debug)]
pub struct Batcher {
    capacity: usize,
    buf: Vec<LogEntry>,
}

impl Batcher {
    /// Capacity below one is pinned to one.
    pub fn new(capacity: usize) -> Batcher {
        Batcher {
            capacity: capacity.max(1),
            buf: Vec::new(),
        }
    }

    /// Append one entry; returns the completed batch once `capacity` entries
    /// have accumulated.
    pub fn push(&mut self, entry: LogEntry) -> Option<Vec<LogEntry>> {
        self.buf.push(entry);
        if self.buf.len() >= self.capacity {
            return Some(std::mem::take(&mut self.buf));
        }
        None
    }

    /// Take whatever is buffered, if anything.
    pub fn drain(&mut self) -> Option<Vec<LogEntry>> {
        if self.buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use roamlog_core::MessageKind;

    fn entry(n: usize) -> LogEntry {
        LogEntry::new(
            Utc.with_ymd_and_hms(2024, 10, 14, 0, 0, n as u32 % 60).unwrap(),
            format!("host-{n}"),
            "radiusd",
            MessageKind::AccessAccept,
            format!("line {n}"),
        )
    }

    #[test]
    fn flushes_exactly_at_capacity() {
        let mut batcher = Batcher::new(3);
        assert!(batcher.push(entry(0)).is_none());
        assert!(batcher.push(entry(1)).is_none());
        let batch = batcher.push(entry(2)).expect("batch at capacity");
        assert_eq!(batch.len(), 3);
        assert!(batcher.is_empty());
    }

    #[test]
    fn preserves_source_order() {
        let mut batcher = Batcher::new(4);
        for n in 0..3 {
            assert!(batcher.push(entry(n)).is_none());
        }
        let batch = batcher.push(entry(3)).unwrap();
        let hosts: Vec<_> = batch.iter().map(|e| e.hostname.as_str()).collect();
        assert_eq!(hosts, ["host-0", "host-1", "host-2", "host-3"]);
    }

    #[test]
    fn drain_returns_residue_once() {
        let mut batcher = Batcher::new(10);
        batcher.push(entry(0));
        batcher.push(entry(1));
        let residue = batcher.drain().expect("two entries buffered");
        assert_eq!(residue.len(), 2);
        assert!(batcher.drain().is_none());
    }

    #[test]
    fn drain_on_empty_is_none() {
        let mut batcher = Batcher::new(10);
        assert!(batcher.drain().is_none());
    }

    #[test]
    fn zero_capacity_is_pinned_to_one() {
        let mut batcher = Batcher::new(0);
        assert!(batcher.push(entry(0)).is_some());
    }
}
