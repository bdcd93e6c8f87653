//! Record batching for rowsink
//!
//! Records are accumulated in arrival order and handed to the committer as
//! whole batches. A batch closes when it reaches the configured record count
//! or byte budget; whatever remains at end of input is drained as a final
//! short batch.

use crate::types::Record;

/// A closed batch of records ready to commit
#[derive(Debug, Clone)]
pub struct Batch {
    /// Records in arrival order
    pub records: Vec<Record>,
    /// Estimated payload size in bytes
    pub total_bytes: usize,
    /// Zero-based batch sequence number within the job
    pub sequence: u64,
}

impl Batch {
    /// Number of records in the batch
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the batch is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Accumulates records into size-bounded batches.
///
/// `add` returns a closed batch exactly when the configured record count is
/// reached, so a caller that feeds `batch_size` records gets exactly one
/// batch back and `drain` returns nothing.
#[derive(Debug)]
pub struct Accumulator {
    max_records: usize,
    max_bytes: usize,
    records: Vec<Record>,
    total_bytes: usize,
    next_sequence: u64,
}

impl Accumulator {
    /// Create an accumulator with the given record and byte budgets
    pub fn new(max_records: usize, max_bytes: usize) -> Self {
        Self {
            max_records: max_records.max(1),
            max_bytes,
            records: Vec::with_capacity(max_records.max(1)),
            total_bytes: 0,
            next_sequence: 0,
        }
    }

    /// Number of buffered records not yet handed out
    #[inline]
    pub fn buffered(&self) -> usize {
        self.records.len()
    }

    /// Add a record, returning a closed batch if a budget is now reached.
    ///
    /// The byte budget is a soft limit: the record that crosses it is still
    /// included in the closing batch, never deferred, so ordering is
    /// preserved.
    pub fn add(&mut self, record: Record) -> Option<Batch> {
        self.total_bytes += record.estimated_size();
        self.records.push(record);

        if self.records.len() >= self.max_records || self.total_bytes >= self.max_bytes {
            self.close()
        } else {
            None
        }
    }

    /// Close and return the remainder batch, if any records are buffered
    pub fn drain(&mut self) -> Option<Batch> {
        self.close()
    }

    fn close(&mut self) -> Option<Batch> {
        if self.records.is_empty() {
            return None;
        }
        let records = std::mem::replace(&mut self.records, Vec::with_capacity(self.max_records));
        let total_bytes = std::mem::take(&mut self.total_bytes);
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        Some(Batch {
            records,
            total_bytes,
            sequence,
        })
    }
}
