// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-stream frame counters.
//!
//! Every stream carries four monotonic counters tracking the stages a frame
//! traverses:
//!
//! ```text
//! requested_write ≥ written_buffer ≥ sent_pending_buffer ≥ finished_read
//!      writer          writer           scheduler            reader
//!     entered         placed a        handed frame          consumed
//!   wait-for-write     frame          to the device          result
//! ```
//!
//! The table of counters is built once at registration and never reshaped,
//! so lookup needs no lock. Each counter has a single canonical writer (the
//! stage owning that transition), which is what makes plain atomic
//! increments sufficient.
//!
//! For output streams the same structure is reused with a shifted meaning:
//! `sent_pending_buffer` counts results the device owes and `finished_read`
//! counts results consumed; the two write-side counters stay zero.

use std::sync::atomic::{AtomicU32, Ordering};

/// The four per-stream stage counters.
#[derive(Debug, Default)]
pub struct StreamCounters {
    requested_write: AtomicU32,
    written_buffer: AtomicU32,
    sent_pending_buffer: AtomicU32,
    finished_read: AtomicU32,
}

impl StreamCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// A writer entered wait-for-write.
    pub fn note_requested(&self) {
        self.requested_write.fetch_add(1, Ordering::AcqRel);
    }

    /// A waiting writer gave up (abort, timeout, dead owner); its request
    /// is rolled back so the wait leaves no counter trace.
    pub fn retract_requested(&self) {
        let prev = self.requested_write.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "requested_write underflow");
    }

    /// A writer placed a frame in the queue.
    pub fn note_written(&self) {
        self.written_buffer.fetch_add(1, Ordering::AcqRel);
    }

    /// The scheduler handed one frame (or, on an output stream, the device
    /// now owes one result).
    pub fn note_sent(&self) {
        self.sent_pending_buffer.fetch_add(1, Ordering::AcqRel);
    }

    /// A reader fully consumed one result.
    pub fn note_finished(&self) {
        self.finished_read.fetch_add(1, Ordering::AcqRel);
    }

    /// Point-in-time copy of all four counters.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            requested_write: self.requested_write.load(Ordering::Acquire),
            written_buffer: self.written_buffer.load(Ordering::Acquire),
            sent_pending_buffer: self.sent_pending_buffer.load(Ordering::Acquire),
            finished_read: self.finished_read.load(Ordering::Acquire),
        }
    }
}

/// Plain-integer copy of [`StreamCounters`] for predicates and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CounterSnapshot {
    pub requested_write: u32,
    pub written_buffer: u32,
    pub sent_pending_buffer: u32,
    pub finished_read: u32,
}

impl CounterSnapshot {
    /// Frames queued by writers but not yet handed to the device.
    pub fn pending_frames(&self) -> u32 {
        self.written_buffer.saturating_sub(self.sent_pending_buffer)
    }

    /// Results the device owes that readers have not yet consumed.
    pub fn owed_results(&self) -> u32 {
        self.sent_pending_buffer.saturating_sub(self.finished_read)
    }

    /// Write requests not yet backed by a written frame.
    pub fn open_requests(&self) -> u32 {
        self.requested_write.saturating_sub(self.written_buffer)
    }

    /// The stage-ordering invariant. A violation indicates a
    /// counter-ordering bug and is treated as fatal by the core.
    pub fn is_ordered(&self) -> bool {
        self.finished_read <= self.sent_pending_buffer
            && self.sent_pending_buffer <= self.written_buffer
            && self.written_buffer <= self.requested_write
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_progression() {
        let c = StreamCounters::new();
        c.note_requested();
        c.note_written();
        c.note_sent();
        c.note_finished();

        let s = c.snapshot();
        assert_eq!(s.requested_write, 1);
        assert_eq!(s.written_buffer, 1);
        assert_eq!(s.sent_pending_buffer, 1);
        assert_eq!(s.finished_read, 1);
        assert!(s.is_ordered());
    }

    #[test]
    fn test_pending_and_owed() {
        let c = StreamCounters::new();
        for _ in 0..3 {
            c.note_requested();
            c.note_written();
        }
        c.note_sent();

        let s = c.snapshot();
        assert_eq!(s.pending_frames(), 2);
        assert_eq!(s.owed_results(), 1);
        assert_eq!(s.open_requests(), 0);
    }

    #[test]
    fn test_retract_request() {
        let c = StreamCounters::new();
        c.note_requested();
        c.note_requested();
        c.retract_requested();

        let s = c.snapshot();
        assert_eq!(s.requested_write, 1);
        assert_eq!(s.open_requests(), 1);
    }

    #[test]
    #[should_panic(expected = "requested_write underflow")]
    fn test_retract_without_request_panics() {
        StreamCounters::new().retract_requested();
    }

    #[test]
    fn test_ordering_violation_detected() {
        let s = CounterSnapshot {
            requested_write: 1,
            written_buffer: 2, // written without a request
            sent_pending_buffer: 0,
            finished_read: 0,
        };
        assert!(!s.is_ordered());
    }
}
