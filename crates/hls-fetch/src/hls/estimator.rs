use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Read side of a stream's estimated total size, in bytes.
///
/// Cloneable and safe to poll from another task (e.g. a progress UI) while
/// the producer is running.
#[derive(Debug, Clone, Default)]
pub struct SizeProbe {
    estimate: Arc<AtomicU64>,
}

impl SizeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Best-effort estimate; 0 until the first segment has been observed.
    pub fn get(&self) -> u64 {
        self.estimate.load(Ordering::Relaxed)
    }

    fn set(&self, value: u64) {
        self.estimate.store(value, Ordering::Relaxed);
    }
}

/// Extrapolates the total transfer size from the segments seen so far.
///
/// Owned by exactly one production run.
#[derive(Debug)]
pub struct SizeEstimator {
    observed: u64,
    fetched: u64,
    total_segments: u64,
    probe: SizeProbe,
}

impl SizeEstimator {
    pub fn new(total_segments: usize, probe: SizeProbe) -> Self {
        Self {
            observed: 0,
            fetched: 0,
            total_segments: total_segments as u64,
            probe,
        }
    }

    /// Record one segment's declared length and refresh the extrapolation.
    pub fn observe(&mut self, segment_len: u64) {
        self.observed += 1;
        self.fetched += segment_len;
        let average = self.fetched / self.observed;
        self.probe.set(average.saturating_mul(self.total_segments));
    }

    /// Replace the extrapolation with the exact cumulative byte count.
    pub fn finalize(&mut self) {
        self.probe.set(self.fetched);
    }

    pub fn observed(&self) -> u64 {
        self.observed
    }

    pub fn fetched(&self) -> u64 {
        self.fetched
    }
}
