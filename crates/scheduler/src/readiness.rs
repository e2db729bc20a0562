// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Readiness predicates.
//!
//! Pure functions over counter snapshots and scheduling parameters — no
//! I/O, no locks, no side effects — deciding whether a network group is
//! eligible to run. Keeping them free of scheduler state makes every rule
//! unit-testable in isolation.

use crate::counters::CounterSnapshot;
use std::time::{Duration, Instant};

/// Everything the evaluator needs to know about one group.
pub(crate) struct ReadinessView {
    /// Input-stream counter snapshots in declared order.
    pub inputs: Vec<CounterSnapshot>,
    pub min_threshold: u32,
    /// `Duration::ZERO` means "wait indefinitely on the threshold".
    pub timeout: Duration,
    pub queued_since: Option<Instant>,
    pub degraded: bool,
    pub alive: bool,
}

/// Some input stream has at least one queued-but-undrained frame.
pub(crate) fn has_pending_input(inputs: &[CounterSnapshot]) -> bool {
    inputs.iter().any(|s| s.pending_frames() > 0)
}

/// Every input stream has at least one queued frame, so a full drain
/// round is possible.
pub(crate) fn all_inputs_pending(inputs: &[CounterSnapshot]) -> bool {
    inputs.iter().all(|s| s.pending_frames() > 0)
}

/// Some input stream has accumulated at least `min_threshold` pending
/// frames.
pub(crate) fn threshold_met(inputs: &[CounterSnapshot], min_threshold: u32) -> bool {
    inputs.iter().any(|s| s.pending_frames() >= min_threshold)
}

/// The switch timeout has elapsed since the first pending frame.
pub(crate) fn timeout_elapsed(
    timeout: Duration,
    queued_since: Option<Instant>,
    now: Instant,
) -> bool {
    if timeout.is_zero() {
        return false;
    }
    match queued_since {
        Some(since) => now.saturating_duration_since(since) >= timeout,
        None => false,
    }
}

/// Whether a group is eligible to run.
///
/// `competing` is true when another live, non-degraded group has pending
/// frames; `batch_in_flight` and `is_current` describe the active group's
/// state. The rules, in order:
///
/// 1. every input stream has a queued frame;
/// 2. the threshold is met on some input, **or** the switch timeout has
///    elapsed, **or** the timeout is zero and no other group competes (a
///    solitary group must still be activated promptly);
/// 3. the group is alive and not degraded;
/// 4. the active group has finished its current batch, or this group *is*
///    the active group.
pub(crate) fn is_group_ready(
    view: &ReadinessView,
    now: Instant,
    competing: bool,
    batch_in_flight: bool,
    is_current: bool,
) -> bool {
    if !view.alive || view.degraded {
        return false;
    }
    if !all_inputs_pending(&view.inputs) {
        return false;
    }

    let eligible = threshold_met(&view.inputs, view.min_threshold)
        || timeout_elapsed(view.timeout, view.queued_since, now)
        || (view.timeout.is_zero() && !competing);
    if !eligible {
        return false;
    }

    !batch_in_flight || is_current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(requested: u32, written: u32, sent: u32, finished: u32) -> CounterSnapshot {
        CounterSnapshot {
            requested_write: requested,
            written_buffer: written,
            sent_pending_buffer: sent,
            finished_read: finished,
        }
    }

    fn view(inputs: Vec<CounterSnapshot>, min_threshold: u32, timeout: Duration) -> ReadinessView {
        ReadinessView {
            inputs,
            min_threshold,
            timeout,
            queued_since: None,
            degraded: false,
            alive: true,
        }
    }

    #[test]
    fn test_needs_every_input_pending() {
        let v = view(vec![snap(2, 2, 0, 0), snap(1, 0, 0, 0)], 1, Duration::ZERO);
        // Second input has no written frame yet.
        assert!(!is_group_ready(&v, Instant::now(), false, false, false));

        let v = view(vec![snap(2, 2, 0, 0), snap(1, 1, 0, 0)], 1, Duration::ZERO);
        assert!(is_group_ready(&v, Instant::now(), false, false, false));
    }

    #[test]
    fn test_threshold_gate() {
        let v = view(vec![snap(2, 2, 0, 0)], 4, Duration::from_secs(1));
        // Two pending < threshold 4, timeout not elapsed.
        assert!(!is_group_ready(&v, Instant::now(), true, false, false));

        let v = view(vec![snap(4, 4, 0, 0)], 4, Duration::from_secs(1));
        assert!(is_group_ready(&v, Instant::now(), true, false, false));
    }

    #[test]
    fn test_timeout_releases_threshold() {
        let now = Instant::now();
        let mut v = view(vec![snap(2, 2, 0, 0)], 4, Duration::from_millis(50));
        v.queued_since = Some(now - Duration::from_millis(60));
        assert!(is_group_ready(&v, now, true, false, false));

        v.queued_since = Some(now - Duration::from_millis(10));
        assert!(!is_group_ready(&v, now, true, false, false));
    }

    #[test]
    fn test_zero_timeout_never_elapses() {
        let now = Instant::now();
        assert!(!timeout_elapsed(
            Duration::ZERO,
            Some(now - Duration::from_secs(100)),
            now
        ));
    }

    #[test]
    fn test_solitary_group_below_threshold() {
        // Timeout 0 + no competitor: one pending frame suffices even
        // below the threshold.
        let v = view(vec![snap(1, 1, 0, 0)], 4, Duration::ZERO);
        assert!(is_group_ready(&v, Instant::now(), false, false, false));
        // With a competitor the threshold stands.
        assert!(!is_group_ready(&v, Instant::now(), true, false, false));
    }

    #[test]
    fn test_degraded_and_dead_are_never_ready() {
        let mut v = view(vec![snap(5, 5, 0, 0)], 1, Duration::ZERO);
        v.degraded = true;
        assert!(!is_group_ready(&v, Instant::now(), false, false, false));

        let mut v = view(vec![snap(5, 5, 0, 0)], 1, Duration::ZERO);
        v.alive = false;
        assert!(!is_group_ready(&v, Instant::now(), false, false, false));
    }

    #[test]
    fn test_in_flight_batch_blocks_others_not_current() {
        let v = view(vec![snap(3, 3, 0, 0)], 1, Duration::ZERO);
        // Another group's batch is still in flight.
        assert!(!is_group_ready(&v, Instant::now(), false, true, false));
        // The active group itself may keep going.
        assert!(is_group_ready(&v, Instant::now(), false, true, true));
    }

    #[test]
    fn test_helper_predicates() {
        let inputs = vec![snap(3, 3, 1, 0), snap(2, 2, 2, 0)];
        assert!(has_pending_input(&inputs));
        assert!(!all_inputs_pending(&inputs));
        assert!(threshold_met(&inputs, 2));
        assert!(!threshold_met(&inputs, 3));
    }
}
