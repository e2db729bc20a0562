// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Network-group registration records.
//!
//! The scheduler references the owning configured network group through a
//! [`Weak`] pointer so it never extends the owner's lifetime (ownership
//! lives in the layer that loaded the network). A record whose owner has
//! been dropped becomes a tombstone: every operation on its handle fails
//! with *not-found*, and its handle is never reused.

use crate::counters::{CounterSnapshot, StreamCounters};
use crate::handle::NetworkGroupHandle;
use crate::readiness::ReadinessView;
use crate::timer::SwitchTimer;
use latency_meter::LatencyMeter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// The owner-side view of a loaded network group.
///
/// Implemented by whatever layer owns configured network groups (the HEF /
/// configuration layer in a full stack). The scheduler only needs a name
/// and the declared-order stream lists; both are read once at registration.
pub trait ConfiguredNetworkGroup: Send + Sync {
    /// Unique name of this network group.
    fn name(&self) -> &str;

    /// Input stream names in declared order.
    fn input_stream_names(&self) -> Vec<String>;

    /// Output stream names in declared order.
    fn output_stream_names(&self) -> Vec<String>;
}

/// A self-contained [`ConfiguredNetworkGroup`] with fixed stream lists.
///
/// # Example
/// ```
/// use scheduler::StaticNetworkGroup;
/// use std::sync::Arc;
///
/// let group = Arc::new(StaticNetworkGroup::new(
///     "resnet50",
///     ["input0"],
///     ["output0"],
/// ));
/// ```
#[derive(Debug, Clone)]
pub struct StaticNetworkGroup {
    name: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
}

impl StaticNetworkGroup {
    pub fn new<I, O>(name: impl Into<String>, inputs: I, outputs: O) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        Self {
            name: name.into(),
            inputs: inputs.into_iter().map(Into::into).collect(),
            outputs: outputs.into_iter().map(Into::into).collect(),
        }
    }
}

impl ConfiguredNetworkGroup for StaticNetworkGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_stream_names(&self) -> Vec<String> {
        self.inputs.clone()
    }

    fn output_stream_names(&self) -> Vec<String> {
        self.outputs.clone()
    }
}

// ── Per-stream state ───────────────────────────────────────────

/// One stream of a registered group: its counters and stop flag.
pub(crate) struct StreamState {
    pub name: String,
    pub counters: StreamCounters,
    /// Set by `disable_stream`; waiters on a stopped stream return aborted.
    stopped: AtomicBool,
}

impl StreamState {
    fn new(name: String) -> Self {
        Self {
            name,
            counters: StreamCounters::new(),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn set_stopped(&self, stopped: bool) {
        self.stopped.store(stopped, Ordering::Release);
    }
}

// ── Group record ───────────────────────────────────────────────

/// Scheduler-side record of one registered network group.
pub(crate) struct GroupRecord {
    pub handle: NetworkGroupHandle,
    pub name: String,
    pub owner: Weak<dyn ConfiguredNetworkGroup>,
    /// Upper bound on drain rounds per activation.
    pub max_batch_size: u32,
    /// Switch timeout; `Duration::ZERO` means "wait indefinitely on the
    /// threshold".
    pub timeout: Duration,
    /// Pending frames required before the group is threshold-ready.
    pub min_threshold: u32,
    /// When the first pending frame since the last activation was queued.
    pub first_queued_at: Option<Instant>,
    /// Set when device activation failed; writes fail until a stream of
    /// this group is re-enabled.
    pub degraded: bool,
    /// Drain rounds performed in the current activation's batch.
    pub rounds_in_batch: u32,
    pub inputs: Vec<StreamState>,
    pub outputs: Vec<StreamState>,
    pub meter: Option<Arc<LatencyMeter>>,
    /// Background switch timer; attached by the scheduler right after
    /// registration, armed and disarmed under the central lock.
    pub timer: Option<SwitchTimer>,
}

impl GroupRecord {
    pub fn new(
        handle: NetworkGroupHandle,
        name: String,
        owner: Weak<dyn ConfiguredNetworkGroup>,
        input_names: Vec<String>,
        output_names: Vec<String>,
        max_batch_size: u32,
        timeout: Duration,
        min_threshold: u32,
        meter: Option<Arc<LatencyMeter>>,
    ) -> Self {
        Self {
            handle,
            name,
            owner,
            max_batch_size,
            timeout,
            min_threshold,
            first_queued_at: None,
            degraded: false,
            rounds_in_batch: 0,
            inputs: input_names.into_iter().map(StreamState::new).collect(),
            outputs: output_names.into_iter().map(StreamState::new).collect(),
            meter,
            timer: None,
        }
    }

    /// Schedules (or reschedules) the group's switch-timeout wakeup.
    pub fn arm_switch_timer(&self, deadline: Instant) {
        if let Some(timer) = &self.timer {
            timer.arm(deadline);
        }
    }

    /// Cancels a pending switch-timeout wakeup.
    pub fn disarm_switch_timer(&self) {
        if let Some(timer) = &self.timer {
            timer.disarm();
        }
    }

    /// Whether the owning configured network group is still alive.
    pub fn is_alive(&self) -> bool {
        self.owner.strong_count() > 0
    }

    pub fn input(&self, stream: &str) -> Option<&StreamState> {
        self.inputs.iter().find(|s| s.name == stream)
    }

    pub fn output(&self, stream: &str) -> Option<&StreamState> {
        self.outputs.iter().find(|s| s.name == stream)
    }

    /// Index of an output stream; doubles as its latency-meter channel.
    pub fn output_index(&self, stream: &str) -> Option<usize> {
        self.outputs.iter().position(|s| s.name == stream)
    }

    /// Some input stream has a queued-but-undrained frame.
    pub fn has_pending_input(&self) -> bool {
        self.inputs
            .iter()
            .any(|s| s.counters.snapshot().pending_frames() > 0)
    }

    /// Every input stream has at least one queued frame (one drain round
    /// is possible).
    pub fn all_inputs_pending(&self) -> bool {
        self.inputs
            .iter()
            .all(|s| s.counters.snapshot().pending_frames() > 0)
    }

    /// Every output has been fully consumed — nothing is owed to readers.
    pub fn outputs_settled(&self) -> bool {
        self.outputs
            .iter()
            .all(|s| s.counters.snapshot().owed_results() == 0)
    }

    /// Some input stream is disabled, so no further drain round can
    /// complete.
    pub fn any_input_stopped(&self) -> bool {
        self.inputs.iter().any(|s| s.is_stopped())
    }

    /// Smallest `requested_write` among enabled input streams, used by the
    /// writer balance gate. Disabled siblings are excluded so they cannot
    /// wedge the gate.
    pub fn min_requested_write(&self) -> u32 {
        self.inputs
            .iter()
            .filter(|s| !s.is_stopped())
            .map(|s| s.counters.snapshot().requested_write)
            .min()
            .unwrap_or(0)
    }

    pub fn input_snapshots(&self) -> Vec<CounterSnapshot> {
        self.inputs.iter().map(|s| s.counters.snapshot()).collect()
    }

    /// View consumed by the readiness evaluator.
    pub fn readiness_view(&self) -> ReadinessView {
        ReadinessView {
            inputs: self.input_snapshots(),
            min_threshold: self.min_threshold,
            timeout: self.timeout,
            queued_since: self.first_queued_at,
            degraded: self.degraded,
            alive: self.is_alive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(inputs: &[&str], outputs: &[&str]) -> (Arc<StaticNetworkGroup>, GroupRecord) {
        let owner = Arc::new(StaticNetworkGroup::new(
            "g",
            inputs.iter().copied(),
            outputs.iter().copied(),
        ));
        let weak: Weak<dyn ConfiguredNetworkGroup> = Arc::downgrade(&owner) as Weak<dyn ConfiguredNetworkGroup>;
        let rec = GroupRecord::new(
            NetworkGroupHandle::from_index(0),
            "g".into(),
            weak,
            owner.input_stream_names(),
            owner.output_stream_names(),
            4,
            Duration::ZERO,
            1,
            None,
        );
        (owner, rec)
    }

    #[test]
    fn test_stream_lookup() {
        let (_owner, rec) = record(&["in0", "in1"], &["out0"]);
        assert!(rec.input("in1").is_some());
        assert!(rec.input("out0").is_none());
        assert_eq!(rec.output_index("out0"), Some(0));
        assert_eq!(rec.output_index("in0"), None);
    }

    #[test]
    fn test_owner_drop_makes_dead() {
        let (owner, rec) = record(&["in0"], &["out0"]);
        assert!(rec.is_alive());
        drop(owner);
        assert!(!rec.is_alive());
    }

    #[test]
    fn test_pending_predicates() {
        let (_owner, rec) = record(&["in0", "in1"], &["out0"]);
        assert!(!rec.has_pending_input());
        assert!(!rec.all_inputs_pending());

        rec.inputs[0].counters.note_requested();
        rec.inputs[0].counters.note_written();
        assert!(rec.has_pending_input());
        assert!(!rec.all_inputs_pending());

        rec.inputs[1].counters.note_requested();
        rec.inputs[1].counters.note_written();
        assert!(rec.all_inputs_pending());
    }

    #[test]
    fn test_min_requested_skips_stopped() {
        let (_owner, rec) = record(&["in0", "in1"], &["out0"]);
        rec.inputs[0].counters.note_requested();
        rec.inputs[0].counters.note_requested();
        assert_eq!(rec.min_requested_write(), 0);

        // Disabling the laggard removes it from the balance gate.
        rec.inputs[1].set_stopped(true);
        assert_eq!(rec.min_requested_write(), 2);
    }

    #[test]
    fn test_outputs_settled() {
        let (_owner, rec) = record(&["in0"], &["out0"]);
        assert!(rec.outputs_settled());
        rec.outputs[0].counters.note_sent();
        assert!(!rec.outputs_settled());
        rec.outputs[0].counters.note_finished();
        assert!(rec.outputs_settled());
    }
}
