use log::warn;
use tokio::sync::mpsc::UnboundedSender;

use crate::types::Sample;

/// Decouples the fixed-rate sampling loop from the bursty transport layer.
/// Samples accumulate in append order and leave as whole batches; a batch
/// is handed off when the buffer reaches capacity or on an explicit flush.
pub struct SessionBuffer {
    samples: Vec<Sample>,
    capacity: usize,
    batch_tx: UnboundedSender<Vec<Sample>>,
    appended: u64,
    flushed_batches: u64,
}

impl SessionBuffer {
    pub fn new(capacity: usize, batch_tx: UnboundedSender<Vec<Sample>>) -> Self {
        SessionBuffer {
            samples: Vec::with_capacity(capacity),
            capacity,
            batch_tx,
            appended: 0,
            flushed_batches: 0,
        }
    }

    /// Append one sample; flushes automatically at capacity.
    pub fn append(&mut self, sample: Sample) {
        self.samples.push(sample);
        self.appended += 1;
        if self.samples.len() >= self.capacity {
            self.flush();
        }
    }

    /// Hand the buffered batch to the transport in append order and clear.
    /// No-op when empty.
    pub fn flush(&mut self) {
        if self.samples.is_empty() {
            return;
        }
        let batch = std::mem::replace(&mut self.samples, Vec::with_capacity(self.capacity));
        let len = batch.len();
        if self.batch_tx.send(batch).is_err() {
            warn!("batch receiver gone, dropping {} samples", len);
            return;
        }
        self.flushed_batches += 1;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn appended(&self) -> u64 {
        self.appended
    }

    pub fn flushed_batches(&self) -> u64 {
        self.flushed_batches
    }
}
