//! Throughput and error counters.
//!
//! - [`LivenessCounter`] counts supplies forwarded successfully; a stalled
//!   count is the operator's signal that the bridge is unhealthy.
//! - [`ErrorCounters`] counts dropped supplies and stream failures per kind.
//!
//! Both are cheap handles around shared atomics, injected wherever they are
//! written or read.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Monotonic count of successfully forwarded supplies.
#[derive(Debug, Clone, Default)]
pub struct LivenessCounter {
    count: Arc<AtomicU64>,
}

impl LivenessCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one forwarded supply and return the new total.
    pub fn increment(&self) -> u64 {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Current total.
    pub fn snapshot(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct Counts {
    decode: AtomicU64,
    encode: AtomicU64,
    publish: AtomicU64,
    stream: AtomicU64,
    other: AtomicU64,
    reconnects: AtomicU64,
}

/// Per-kind error counters.
#[derive(Debug, Clone, Default)]
pub struct ErrorCounters {
    counts: Arc<Counts>,
}

/// Point-in-time copy of [`ErrorCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSnapshot {
    /// Inbound supplies skipped because they could not be decoded.
    pub decode: u64,
    /// Outbound supplies dropped because they could not be encoded.
    pub encode: u64,
    /// Outbound supplies dropped because publishing failed.
    pub publish: u64,
    /// Subscribe streams that ended or failed.
    pub stream: u64,
    /// Anything else.
    pub other: u64,
    /// Connections re-established and rebound into a client.
    pub reconnects: u64,
}

impl ErrorSnapshot {
    /// Number of supplies dropped for any reason.
    pub fn dropped(&self) -> u64 {
        self.decode + self.encode + self.publish
    }
}

impl ErrorCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one error of the given kind.
    pub fn record(&self, kind: ErrorKind) {
        let counter = match kind {
            ErrorKind::Decode => &self.counts.decode,
            ErrorKind::Encode => &self.counts.encode,
            ErrorKind::Publish => &self.counts.publish,
            ErrorKind::Stream => &self.counts.stream,
            _ => &self.counts.other,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Count one successful rebind.
    pub fn record_reconnect(&self) {
        self.counts.reconnects.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ErrorSnapshot {
        ErrorSnapshot {
            decode: self.counts.decode.load(Ordering::SeqCst),
            encode: self.counts.encode.load(Ordering::SeqCst),
            publish: self.counts.publish.load(Ordering::SeqCst),
            stream: self.counts.stream.load(Ordering::SeqCst),
            other: self.counts.other.load(Ordering::SeqCst),
            reconnects: self.counts.reconnects.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_increments_by_one() {
        let counter = LivenessCounter::new();
        assert_eq!(counter.snapshot(), 0);
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(counter.snapshot(), 2);
    }

    #[test]
    fn test_clones_share_the_count() {
        let writer = LivenessCounter::new();
        let reader = writer.clone();
        writer.increment();
        assert_eq!(reader.snapshot(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        const TASKS: u64 = 16;
        const PER_TASK: u64 = 1_000;

        let counter = LivenessCounter::new();
        let mut handles = Vec::new();
        for _ in 0..TASKS {
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let mut last = 0;
                for _ in 0..PER_TASK {
                    let next = counter.increment();
                    assert!(next > last);
                    last = next;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(counter.snapshot(), TASKS * PER_TASK);
    }

    #[test]
    fn test_error_counters_by_kind() {
        let errors = ErrorCounters::new();
        errors.record(ErrorKind::Decode);
        errors.record(ErrorKind::Decode);
        errors.record(ErrorKind::Publish);
        errors.record(ErrorKind::Stream);
        errors.record(ErrorKind::Connection);
        errors.record_reconnect();

        let snapshot = errors.snapshot();
        assert_eq!(snapshot.decode, 2);
        assert_eq!(snapshot.encode, 0);
        assert_eq!(snapshot.publish, 1);
        assert_eq!(snapshot.stream, 1);
        assert_eq!(snapshot.other, 1);
        assert_eq!(snapshot.reconnects, 1);
        assert_eq!(snapshot.dropped(), 3);
    }
}
