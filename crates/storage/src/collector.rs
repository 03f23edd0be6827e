//! In-memory batching in front of a storage backend

use hermes_core::MarketDataRecord;
use log::{debug, error, info};

use crate::backend::{SaveReport, StorageBackend};
use crate::error::{Result, StorageError};

/// Running totals for one collector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectorStats {
    pub added: u64,
    pub flushes: u64,
    pub written: u64,
    pub rejected: u64,
    pub failed_flushes: u64,
}

/// Buffers records and hands them to its backend in batches
///
/// The buffer is cleared only after the backend accepted the whole batch.
/// A failed flush keeps every record, so the next flush resends them.
pub struct BufferedCollector {
    name: String,
    backend: Box<dyn StorageBackend>,
    buffer: Vec<MarketDataRecord>,
    buffer_size: usize,
    stats: CollectorStats,
    closed: bool,
}

impl BufferedCollector {
    pub fn new(name: impl Into<String>, backend: Box<dyn StorageBackend>, buffer_size: usize) -> Result<Self> {
        if buffer_size == 0 {
            return Err(StorageError::InvalidBufferSize);
        }
        Ok(Self {
            name: name.into(),
            backend,
            buffer: Vec::with_capacity(buffer_size),
            buffer_size,
            stats: CollectorStats::default(),
            closed: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> &CollectorStats {
        &self.stats
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Buffer one record, flushing once the threshold is reached
    ///
    /// Returns the flush report when this call triggered a flush.
    pub fn add(&mut self, record: MarketDataRecord) -> Result<Option<SaveReport>> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        self.buffer.push(record);
        self.stats.added += 1;
        if self.buffer.len() >= self.buffer_size {
            return self.flush().map(Some);
        }
        Ok(None)
    }

    /// Write the whole buffer to the backend
    pub fn flush(&mut self) -> Result<SaveReport> {
        if self.buffer.is_empty() {
            return Ok(SaveReport::default());
        }

        match self.backend.save(&self.buffer) {
            Ok(report) => {
                debug!(
                    "[{}] flushed {} records ({} written, {} rejected)",
                    self.name,
                    self.buffer.len(),
                    report.written,
                    report.rejected.len()
                );
                self.buffer.clear();
                self.stats.flushes += 1;
                self.stats.written += report.written as u64;
                self.stats.rejected += report.rejected.len() as u64;
                Ok(report)
            }
            Err(e) => {
                self.stats.failed_flushes += 1;
                Err(e)
            }
        }
    }

    /// Write a batch straight through, bypassing the buffer
    pub fn save_direct(&mut self, records: &[MarketDataRecord]) -> Result<SaveReport> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        self.backend.save(records)
    }

    pub fn load(&mut self, table: &str, limit: Option<usize>) -> Result<Vec<MarketDataRecord>> {
        self.backend.load(table, limit)
    }

    pub fn list_tables(&mut self) -> Result<Vec<String>> {
        self.backend.list_tables()
    }

    /// Flush what is left, then close the backend
    ///
    /// Safe to call more than once. The backend is closed even if the final
    /// flush fails; the flush error is returned.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let flushed = self.flush();
        let closed = self.backend.close();
        info!(
            "[{}] collector closed: {} added, {} written in {} flushes",
            self.name, self.stats.added, self.stats.written, self.stats.flushes
        );
        flushed?;
        closed
    }
}

impl Drop for BufferedCollector {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("[{}] failed to close collector, {} records lost: {e}", self.name, self.buffer.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Counts saves and can be told to fail
    #[derive(Clone, Default)]
    struct Recorded {
        saves: Arc<AtomicUsize>,
        rows: Arc<AtomicUsize>,
        fail: Arc<AtomicBool>,
        closed: Arc<AtomicBool>,
    }

    struct RecordingBackend(Recorded);

    impl StorageBackend for RecordingBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Csv
        }

        fn save(&mut self, records: &[MarketDataRecord]) -> Result<SaveReport> {
            if self.0.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.0.saves.fetch_add(1, Ordering::SeqCst);
            self.0.rows.fetch_add(records.len(), Ordering::SeqCst);
            Ok(SaveReport {
                written: records.len(),
                partitions: 1,
                rejected: Vec::new(),
            })
        }

        fn load(&mut self, table: &str, _limit: Option<usize>) -> Result<Vec<MarketDataRecord>> {
            Err(StorageError::TableNotFound(table.to_string()))
        }

        fn list_tables(&mut self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn close(&mut self) -> Result<()> {
            self.0.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn collector(size: usize) -> (BufferedCollector, Recorded) {
        let recorded = Recorded::default();
        let collector = BufferedCollector::new("SHFE", Box::new(RecordingBackend(recorded.clone())), size).unwrap();
        (collector, recorded)
    }

    fn tick(i: i32) -> MarketDataRecord {
        MarketDataRecord::new("rb2601").with_last(3500.0, i)
    }

    #[test]
    fn test_exact_threshold_flushes_once() {
        let (mut collector, recorded) = collector(4);
        let reports: Vec<_> = (0..4).map(|i| collector.add(tick(i)).unwrap()).collect();

        assert_eq!(reports.iter().filter(|r| r.is_some()).count(), 1);
        assert!(reports[3].is_some());
        assert_eq!(recorded.saves.load(Ordering::SeqCst), 1);
        assert_eq!(collector.buffered(), 0);
    }

    #[test]
    fn test_below_threshold_does_not_flush() {
        let (mut collector, recorded) = collector(4);
        for i in 0..3 {
            assert!(collector.add(tick(i)).unwrap().is_none());
        }
        assert_eq!(recorded.saves.load(Ordering::SeqCst), 0);
        assert_eq!(collector.buffered(), 3);
    }

    #[test]
    fn test_failed_flush_keeps_buffer_for_retry() {
        let (mut collector, recorded) = collector(2);
        recorded.fail.store(true, Ordering::SeqCst);
        collector.add(tick(1)).unwrap();
        assert!(collector.add(tick(2)).is_err());
        assert_eq!(collector.buffered(), 2);
        assert_eq!(collector.stats().failed_flushes, 1);

        recorded.fail.store(false, Ordering::SeqCst);
        let report = collector.flush().unwrap();
        assert_eq!(report.written, 2);
        assert_eq!(recorded.rows.load(Ordering::SeqCst), 2);
        assert_eq!(collector.buffered(), 0);
    }

    #[test]
    fn test_empty_flush_skips_backend() {
        let (mut collector, recorded) = collector(2);
        assert_eq!(collector.flush().unwrap(), SaveReport::default());
        assert_eq!(recorded.saves.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_close_flushes_remaining_and_is_idempotent() {
        let (mut collector, recorded) = collector(10);
        collector.add(tick(1)).unwrap();
        collector.close().unwrap();
        collector.close().unwrap();

        assert_eq!(recorded.rows.load(Ordering::SeqCst), 1);
        assert!(recorded.closed.load(Ordering::SeqCst));
        assert!(matches!(collector.add(tick(2)), Err(StorageError::Closed)));
    }

    #[test]
    fn test_drop_flushes() {
        let (mut collector, recorded) = collector(10);
        collector.add(tick(1)).unwrap();
        drop(collector);
        assert_eq!(recorded.rows.load(Ordering::SeqCst), 1);
        assert!(recorded.closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_zero_buffer_size_rejected() {
        let result = BufferedCollector::new("DCE", Box::new(RecordingBackend(Recorded::default())), 0);
        assert!(matches!(result, Err(StorageError::InvalidBufferSize)));
    }
}
