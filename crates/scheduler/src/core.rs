// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The waiter core: one mutex, one condition variable.
//!
//! Every public operation follows the same shape — acquire the central
//! lock, mutate counters, broadcast, release. Every blocking wait sits on
//! the condition variable behind a predicate that is re-checked on each
//! wake. Writer threads, reader threads, timer threads, and idle-guard
//! threads all converge here; the only I/O under the lock is the device's
//! activate/deactivate/drain calls, which are the serialization point and
//! required to be microseconds-scale.
//!
//! ```text
//! producers                         consumers
//!   wait_for_write ──► write ──►      wait_for_read ──► read ──►
//!   signal_write_finish               signal_read_finish
//!         │                                 │
//!         ▼                                 ▼
//!   [scheduling step]: readiness → policy → switch protocol → drain
//! ```
//!
//! The scheduling step runs on whichever thread mutated state: a producer
//! finishing a write, a reader completing a batch, a timer firing, a
//! parameter change, or an idle guard being released.

use crate::activation::ActivationController;
use crate::config::SchedulerConfig;
use crate::device::DeviceControl;
use crate::error::SchedulerError;
use crate::group::{ConfiguredNetworkGroup, GroupRecord, StreamState};
use crate::handle::NetworkGroupHandle;
use crate::idle::IdleGuard;
use crate::policy::{SchedulerPolicy, SchedulingAlgorithm};
use crate::readiness;
use crate::snapshot::{GroupSnapshot, SchedulerSnapshot, StreamSnapshot};
use crate::timer::SwitchTimer;
use latency_meter::LatencyMeter;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

// ── Shared state ───────────────────────────────────────────────

pub(crate) struct SchedulerState {
    pub(crate) groups: Vec<GroupRecord>,
    pub(crate) activation: ActivationController,
    policy: Box<dyn SchedulerPolicy>,
}

pub(crate) struct SchedulerInner {
    state: Mutex<SchedulerState>,
    pub(crate) cv: Condvar,
    config: SchedulerConfig,
    /// Monotonic epoch for latency-meter timestamps.
    epoch: Instant,
}

// ── Scheduler ──────────────────────────────────────────────────

/// Time-multiplexes one inference accelerator between registered network
/// groups.
///
/// # Example
/// ```
/// use scheduler::{
///     ConfiguredNetworkGroup, NoopDevice, Scheduler, SchedulerConfig, SchedulingAlgorithm,
///     StaticNetworkGroup,
/// };
/// use std::sync::{Arc, Weak};
///
/// let scheduler = Scheduler::new(
///     SchedulingAlgorithm::RoundRobin,
///     SchedulerConfig::default(),
///     Box::new(NoopDevice),
/// );
///
/// let group = Arc::new(StaticNetworkGroup::new("net", ["in0"], ["out0"]));
/// let handle = scheduler
///     .register_network_group(Arc::downgrade(&group) as Weak<dyn ConfiguredNetworkGroup>, 4)
///     .unwrap();
///
/// scheduler.wait_for_write(handle, "in0", None).unwrap();
/// scheduler.signal_write_finish(handle, "in0").unwrap();
/// scheduler.wait_for_read(handle, "out0", None).unwrap();
/// scheduler.signal_read_finish(handle, "out0").unwrap();
/// ```
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    /// Creates a scheduler around the given device.
    pub fn new(
        algorithm: SchedulingAlgorithm,
        config: SchedulerConfig,
        device: Box<dyn DeviceControl>,
    ) -> Self {
        let policy = algorithm.create_policy();
        tracing::info!(policy = policy.name(), "scheduler created");
        Self {
            inner: Arc::new(SchedulerInner {
                state: Mutex::new(SchedulerState {
                    groups: Vec::new(),
                    activation: ActivationController::new(device),
                    policy,
                }),
                cv: Condvar::new(),
                config,
                epoch: Instant::now(),
            }),
        }
    }

    /// Registers a configured network group and returns its handle.
    ///
    /// The scheduler keeps only a weak reference to the owner; handles of
    /// dropped owners become tombstones and every later operation on them
    /// fails with *not-found*. Stream names and their declared order are
    /// read once, here.
    pub fn register_network_group(
        &self,
        owner: Weak<dyn ConfiguredNetworkGroup>,
        max_batch_size: u32,
    ) -> Result<NetworkGroupHandle, SchedulerError> {
        if max_batch_size == 0 {
            return Err(SchedulerError::InvalidArgument(
                "max_batch_size must be at least 1".into(),
            ));
        }
        let strong = owner.upgrade().ok_or_else(|| {
            SchedulerError::InvalidArgument("owner dropped before registration".into())
        })?;
        let name = strong.name().to_string();
        let inputs = strong.input_stream_names();
        let outputs = strong.output_stream_names();
        drop(strong);

        if inputs.is_empty() || outputs.is_empty() {
            return Err(SchedulerError::InvalidArgument(format!(
                "network group '{name}' must declare at least one input and one output stream"
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for stream in inputs.iter().chain(outputs.iter()) {
            if !seen.insert(stream.as_str()) {
                return Err(SchedulerError::InvalidArgument(format!(
                    "duplicate stream name '{stream}' in network group '{name}'"
                )));
            }
        }

        let meter = if self.inner.config.measure_latency {
            let channels = 0..outputs.len() as u32;
            let meter = LatencyMeter::new(channels, self.inner.config.latency_window)
                .map_err(|e| SchedulerError::InvalidArgument(e.to_string()))?;
            Some(Arc::new(meter))
        } else {
            None
        };

        let handle = {
            let mut state = self.inner.lock_state();
            if state.groups.iter().any(|g| g.name == name) {
                return Err(SchedulerError::InvalidArgument(format!(
                    "network group '{name}' is already registered"
                )));
            }
            let index = state.groups.len();
            let handle = NetworkGroupHandle::from_index(index);
            state.groups.push(GroupRecord::new(
                handle,
                name.clone(),
                owner,
                inputs,
                outputs,
                max_batch_size,
                self.inner.config.default_timeout(),
                self.inner.config.default_min_threshold,
                meter,
            ));

            // One background timer per group, waking the core when the
            // switch timeout elapses. It holds the inner state weakly so
            // a timer can never keep a dropped scheduler alive.
            let weak = Arc::downgrade(&self.inner);
            state.groups[index].timer = Some(SwitchTimer::spawn(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.on_timer_fire(handle);
                }
            }));
            handle
        };

        tracing::info!(group = %handle, name = %name, max_batch_size, "registered network group");
        Ok(handle)
    }

    /// Blocks until the producer may write one frame into `stream`.
    ///
    /// A writer on a group that is neither current nor next is held back
    /// while it is more than one frame ahead of the group's slowest input
    /// stream, so no stream races ahead and starves its siblings.
    ///
    /// Returns *aborted* if the stream is (or becomes) disabled,
    /// *activation-failed* on a degraded group, *timeout* past the given
    /// deadline, and *not-found* once the owner is dropped. On every
    /// failure the write request is rolled back.
    pub fn wait_for_write(
        &self,
        handle: NetworkGroupHandle,
        stream: &str,
        deadline: Option<Duration>,
    ) -> Result<(), SchedulerError> {
        let deadline = deadline.map(|d| Instant::now() + d);
        let mut state = self.inner.lock_state();
        let idx = live_index(&state, handle)?;

        {
            let rec = &state.groups[idx];
            if rec.degraded {
                return Err(degraded_error(handle));
            }
            let input = rec
                .input(stream)
                .ok_or_else(|| stream_not_found(handle, stream))?;
            if input.is_stopped() {
                return Err(aborted(handle, stream));
            }
            input.counters.note_requested();
        }
        // Sibling balance gates read the request counts.
        self.inner.cv.notify_all();

        loop {
            let rec = &state.groups[idx];
            if !rec.is_alive() {
                if let Some(input) = rec.input(stream) {
                    input.counters.retract_requested();
                }
                self.inner.cv.notify_all();
                return Err(SchedulerError::NotFound { handle });
            }
            let input = match rec.input(stream) {
                Some(s) => s,
                None => return Err(stream_not_found(handle, stream)),
            };
            if input.is_stopped() {
                input.counters.retract_requested();
                self.inner.cv.notify_all();
                return Err(aborted(handle, stream));
            }
            if rec.degraded {
                input.counters.retract_requested();
                self.inner.cv.notify_all();
                return Err(degraded_error(handle));
            }

            let privileged = state.activation.current() == handle
                || state.activation.next() == handle;
            let balanced =
                input.counters.snapshot().requested_write <= rec.min_requested_write() + 1;
            if privileged || balanced {
                return Ok(());
            }

            if let Some(dl) = deadline {
                if Instant::now() >= dl {
                    input.counters.retract_requested();
                    self.inner.cv.notify_all();
                    return Err(SchedulerError::Timeout);
                }
            }
            state = self.inner.wait_until(state, deadline);
        }
    }

    /// Records that the producer placed one frame in `stream`'s queue and
    /// runs the scheduling step.
    ///
    /// The first frame since the last activation stamps the group's
    /// queued-since timestamp and arms its switch timer. A device
    /// activation failure triggered by this call is returned here and
    /// degrades the group.
    pub fn signal_write_finish(
        &self,
        handle: NetworkGroupHandle,
        stream: &str,
    ) -> Result<(), SchedulerError> {
        let mut state = self.inner.lock_state();
        let idx = live_index(&state, handle)?;
        {
            let rec = &mut state.groups[idx];
            if rec.degraded {
                return Err(degraded_error(handle));
            }
            let input = rec
                .input(stream)
                .ok_or_else(|| stream_not_found(handle, stream))?;
            let snap = input.counters.snapshot();
            assert!(
                snap.written_buffer < snap.requested_write,
                "write finished on '{stream}' without a matching wait_for_write"
            );
            input.counters.note_written();

            if rec.first_queued_at.is_none() {
                let now = Instant::now();
                rec.first_queued_at = Some(now);
                if !rec.timeout.is_zero() {
                    rec.arm_switch_timer(now + rec.timeout);
                }
            }
        }
        // Producer writes are the one operation that surfaces a failed
        // activation; every other trigger of the scheduling step only
        // degrades the group.
        let step = self.inner.scheduling_step(&mut state);
        self.inner.cv.notify_all();
        step
    }

    /// Blocks until one result is available on the output `stream`.
    ///
    /// Returns *aborted* if the stream is disabled, or if an input stream
    /// of the group is disabled and nothing already owed can satisfy the
    /// read (no further drain round can complete). Counters are not
    /// touched by this call.
    pub fn wait_for_read(
        &self,
        handle: NetworkGroupHandle,
        stream: &str,
        deadline: Option<Duration>,
    ) -> Result<(), SchedulerError> {
        let deadline = deadline.map(|d| Instant::now() + d);
        let mut state = self.inner.lock_state();
        let idx = live_index(&state, handle)?;
        state.groups[idx]
            .output(stream)
            .ok_or_else(|| stream_not_found(handle, stream))?;

        loop {
            let rec = &state.groups[idx];
            if !rec.is_alive() {
                return Err(SchedulerError::NotFound { handle });
            }
            let output = match rec.output(stream) {
                Some(s) => s,
                None => return Err(stream_not_found(handle, stream)),
            };
            if output.is_stopped() {
                return Err(aborted(handle, stream));
            }
            if output.counters.snapshot().owed_results() > 0 {
                return Ok(());
            }
            if rec.any_input_stopped() {
                return Err(aborted(handle, stream));
            }

            if let Some(dl) = deadline {
                if Instant::now() >= dl {
                    return Err(SchedulerError::Timeout);
                }
            }
            state = self.inner.wait_until(state, deadline);
        }
    }

    /// Records that the consumer fully read one result from `stream`.
    ///
    /// Posts the end sample to the group's latency meter. When this
    /// settles every output of the active group's batch, the batch is
    /// complete and the scheduling step runs (typically performing the
    /// pending switch). A failed activation of the incoming group is not
    /// this reader's error — the read has already been recorded — so it
    /// only degrades that group.
    pub fn signal_read_finish(
        &self,
        handle: NetworkGroupHandle,
        stream: &str,
    ) -> Result<(), SchedulerError> {
        let mut state = self.inner.lock_state();
        let idx = live_index(&state, handle)?;

        let completed = {
            let rec = &state.groups[idx];
            let output_index = rec
                .output_index(stream)
                .ok_or_else(|| stream_not_found(handle, stream))?;
            let output = &rec.outputs[output_index];
            let snap = output.counters.snapshot();
            assert!(
                snap.finished_read < snap.sent_pending_buffer,
                "read finished on '{stream}' with no result owed"
            );
            output.counters.note_finished();

            if let Some(meter) = &rec.meter {
                let posted = meter.add_end_sample(output_index as u32, self.inner.epoch.elapsed());
                debug_assert!(posted.is_ok(), "output index is always a registered channel");
            }

            state.activation.current() == handle
                && state.activation.batch_in_flight()
                && rec.outputs_settled()
        };

        if completed {
            state.groups[idx].rounds_in_batch = 0;
            state.activation.set_batch_in_flight(false);
            tracing::debug!(group = %handle, "batch complete");
            self.inner.scheduling_step_quiet(&mut state);
        }
        self.inner.cv.notify_all();
        Ok(())
    }

    /// Re-enables a stream. Clears the group's degraded flag, letting
    /// writes retry activation. Enabling an enabled stream of a healthy
    /// group is a no-op.
    pub fn enable_stream(
        &self,
        handle: NetworkGroupHandle,
        stream: &str,
    ) -> Result<(), SchedulerError> {
        let mut state = self.inner.lock_state();
        let idx = live_index(&state, handle)?;

        let was_stopped = {
            let rec = &state.groups[idx];
            let s = rec
                .input(stream)
                .or_else(|| rec.output(stream))
                .ok_or_else(|| stream_not_found(handle, stream))?;
            if s.is_stopped() {
                s.set_stopped(false);
                true
            } else {
                false
            }
        };
        if !was_stopped && !state.groups[idx].degraded {
            return Ok(());
        }

        state.groups[idx].degraded = false;
        tracing::debug!(group = %handle, stream, "stream enabled");
        self.inner.scheduling_step_quiet(&mut state);
        self.inner.cv.notify_all();
        Ok(())
    }

    /// Disables a stream: currently-waiting writers and readers on it
    /// return *aborted*. Disabling a disabled stream is a no-op.
    pub fn disable_stream(
        &self,
        handle: NetworkGroupHandle,
        stream: &str,
    ) -> Result<(), SchedulerError> {
        let state = self.inner.lock_state();
        let idx = live_index(&state, handle)?;
        let rec = &state.groups[idx];
        let s = rec
            .input(stream)
            .or_else(|| rec.output(stream))
            .ok_or_else(|| stream_not_found(handle, stream))?;
        if !s.is_stopped() {
            s.set_stopped(true);
            tracing::debug!(group = %handle, stream, "stream disabled");
            self.inner.cv.notify_all();
        }
        Ok(())
    }

    /// Sets the group's switch timeout. `Duration::ZERO` means "wait
    /// indefinitely on the threshold". `network_name` must be the group's
    /// name or empty.
    pub fn set_timeout(
        &self,
        handle: NetworkGroupHandle,
        timeout: Duration,
        network_name: &str,
    ) -> Result<(), SchedulerError> {
        let mut state = self.inner.lock_state();
        let idx = live_index(&state, handle)?;
        {
            let rec = &mut state.groups[idx];
            validate_network_name(rec, network_name)?;
            rec.timeout = timeout;
            match rec.first_queued_at {
                Some(first) if !timeout.is_zero() => rec.arm_switch_timer(first + timeout),
                Some(_) => rec.disarm_switch_timer(),
                None => {}
            }
            tracing::debug!(
                group = %handle,
                timeout_ms = timeout.as_millis() as u64,
                "switch timeout updated"
            );
        }
        self.inner.scheduling_step_quiet(&mut state);
        self.inner.cv.notify_all();
        Ok(())
    }

    /// Sets the group's minimum pending-frame threshold (≥ 1).
    /// `network_name` must be the group's name or empty. Mid-batch changes
    /// apply at the next scheduling decision.
    pub fn set_threshold(
        &self,
        handle: NetworkGroupHandle,
        threshold: u32,
        network_name: &str,
    ) -> Result<(), SchedulerError> {
        if threshold == 0 {
            return Err(SchedulerError::InvalidArgument(
                "threshold must be at least 1".into(),
            ));
        }
        let mut state = self.inner.lock_state();
        let idx = live_index(&state, handle)?;
        {
            let rec = &mut state.groups[idx];
            validate_network_name(rec, network_name)?;
            rec.min_threshold = threshold;
            tracing::debug!(group = %handle, threshold, "threshold updated");
        }
        self.inner.scheduling_step_quiet(&mut state);
        self.inner.cv.notify_all();
        Ok(())
    }

    /// Mean inference latency of the group, from the frames drained so
    /// far. Passing `clear` resets the running mean.
    pub fn measured_latency(
        &self,
        handle: NetworkGroupHandle,
        clear: bool,
    ) -> Result<Duration, SchedulerError> {
        let meter = {
            let state = self.inner.lock_state();
            let idx = live_index(&state, handle)?;
            state.groups[idx]
                .meter
                .clone()
                .ok_or(SchedulerError::NotAvailable { handle })?
        };
        meter
            .get_latency(clear)
            .map_err(|_| SchedulerError::NotAvailable { handle })
    }

    /// Forces the scheduler idle for the guard's lifetime: the current
    /// batch completes, the active group is deactivated, and no activation
    /// happens until the guard is dropped. Used around device
    /// reconfiguration.
    pub fn create_idle_guard(&self) -> Result<IdleGuard, SchedulerError> {
        IdleGuard::acquire(Arc::clone(&self.inner))
    }

    /// Point-in-time copy of the activation state and all counters.
    pub fn snapshot(&self) -> SchedulerSnapshot {
        let state = self.inner.lock_state();
        SchedulerSnapshot {
            current: state.activation.current(),
            next: state.activation.next(),
            is_switching: state.activation.is_switching(),
            batch_in_flight: state.activation.batch_in_flight(),
            forced_idle: state.activation.forced_idle(),
            switch_count: state.activation.switch_count(),
            groups: state
                .groups
                .iter()
                .map(|g| GroupSnapshot {
                    handle: g.handle,
                    name: g.name.clone(),
                    alive: g.is_alive(),
                    degraded: g.degraded,
                    inputs: g.inputs.iter().map(stream_snapshot).collect(),
                    outputs: g.outputs.iter().map(stream_snapshot).collect(),
                })
                .collect(),
        }
    }

    /// Name of the active scheduling policy.
    pub fn policy_name(&self) -> String {
        self.inner.lock_state().policy.name().to_string()
    }

}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("Scheduler")
            .field("groups", &state.groups.len())
            .field("current", &state.activation.current())
            .field("switch_count", &state.activation.switch_count())
            .finish()
    }
}

// ── Inner: locking, scheduling step, drain ─────────────────────

impl SchedulerInner {
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn wait<'a>(
        &'a self,
        guard: MutexGuard<'a, SchedulerState>,
    ) -> MutexGuard<'a, SchedulerState> {
        self.cv
            .wait(guard)
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Waits on the condition variable, bounded by the optional absolute
    /// deadline. Expiry is detected by the caller re-checking the clock.
    pub(crate) fn wait_until<'a>(
        &'a self,
        guard: MutexGuard<'a, SchedulerState>,
        deadline: Option<Instant>,
    ) -> MutexGuard<'a, SchedulerState> {
        match deadline {
            None => self.wait(guard),
            Some(dl) => {
                let now = Instant::now();
                if now >= dl {
                    return guard;
                }
                self.cv
                    .wait_timeout(guard, dl - now)
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .0
            }
        }
    }

    fn on_timer_fire(&self, handle: NetworkGroupHandle) {
        let mut state = self.lock_state();
        tracing::debug!(group = %handle, "switch timeout elapsed");
        self.scheduling_step_quiet(&mut state);
        self.cv.notify_all();
    }

    /// Runs the scheduling step for callers that only trigger it
    /// incidentally. A failed activation in here has already degraded
    /// the target group and been logged; it belongs to the next producer
    /// write on that group, not to this caller.
    pub(crate) fn scheduling_step_quiet(&self, state: &mut SchedulerState) {
        if let Err(err) = self.scheduling_step(state) {
            tracing::warn!(error = %err, "deferred scheduling step failed");
        }
    }

    /// The scheduling step. Snapshots readiness, consults the policy,
    /// runs the switch protocol when the batch boundary allows it, then
    /// drains the active group's queues into the device.
    pub(crate) fn scheduling_step(
        &self,
        state: &mut SchedulerState,
    ) -> Result<(), SchedulerError> {
        let now = Instant::now();
        let current = state.activation.current();
        let batch_in_flight = state.activation.batch_in_flight();

        let pending: Vec<bool> = state
            .groups
            .iter()
            .map(|g| g.is_alive() && !g.degraded && g.has_pending_input())
            .collect();
        let ready: Vec<bool> = state
            .groups
            .iter()
            .enumerate()
            .map(|(i, g)| {
                let competing = pending.iter().enumerate().any(|(j, &p)| j != i && p);
                readiness::is_group_ready(
                    &g.readiness_view(),
                    now,
                    competing,
                    batch_in_flight,
                    current.index() == Some(i),
                )
            })
            .collect();

        // A committed switch keeps its target while that target stays
        // ready; re-polling the policy here would spin the rotation
        // cursor past groups that never got their turn.
        let stored_next = state.activation.next();
        let use_stored = state.activation.is_switching()
            && stored_next != current
            && stored_next
                .index()
                .is_some_and(|i| ready.get(i).copied().unwrap_or(false));

        let next = if use_stored {
            stored_next
        } else {
            if state.activation.is_switching() {
                // The committed target fell unready; decide afresh.
                state.activation.set_switching(false);
            }
            match state.policy.choose_next(&ready) {
                Some(h) => h,
                None => return Ok(()),
            }
        };
        state.activation.set_next(next);

        if next == current {
            // Already active: top up the in-flight batch or start a
            // fresh one.
            state.activation.set_switching(false);
            if state.activation.forced_idle() {
                return Ok(());
            }
            return self.drain_active(state);
        }

        state.activation.set_switching(true);
        if state.activation.batch_in_flight() || state.activation.forced_idle() {
            // Switches happen only at batch boundaries; the batch
            // completion (or guard release) re-enters this step.
            return Ok(());
        }

        if current.is_valid() {
            state.activation.deactivate()?;
        }
        if let Err(err) = state.activation.activate(next) {
            if let Some(i) = next.index() {
                let rec = &mut state.groups[i];
                rec.degraded = true;
                rec.disarm_switch_timer();
            }
            state.activation.set_next(NetworkGroupHandle::INVALID);
            state.activation.set_switching(false);
            return Err(err);
        }

        let Some(idx) = next.index() else {
            return Ok(());
        };
        {
            // Timeout measurement restarts fairly for the incoming group.
            let rec = &mut state.groups[idx];
            rec.rounds_in_batch = 0;
            if rec.has_pending_input() {
                rec.first_queued_at = Some(now);
                if !rec.timeout.is_zero() {
                    rec.arm_switch_timer(now + rec.timeout);
                }
            } else {
                rec.first_queued_at = None;
                rec.disarm_switch_timer();
            }
        }
        self.drain_active(state)
    }

    /// Drains queued frames of the active group into the device.
    ///
    /// Rounds are served in declared stream order, one frame per input
    /// stream per round, until the batch is full or an input runs dry.
    /// Every round posts one start sample and owes one result on each
    /// output stream.
    fn drain_active(&self, state: &mut SchedulerState) -> Result<(), SchedulerError> {
        let handle = state.activation.current();
        let Some(idx) = handle.index() else {
            return Ok(());
        };

        let SchedulerState {
            groups, activation, ..
        } = state;
        let rec = &mut groups[idx];

        let mut rounds = 0u32;
        while rec.rounds_in_batch < rec.max_batch_size
            && rec.all_inputs_pending()
            && !rec.any_input_stopped()
        {
            for i in 0..rec.inputs.len() {
                if let Err(err) = activation.drain_one(handle, &rec.inputs[i].name) {
                    rec.degraded = true;
                    rec.disarm_switch_timer();
                    return Err(err);
                }
                rec.inputs[i].counters.note_sent();
            }
            for output in &rec.outputs {
                output.counters.note_sent();
            }
            if let Some(meter) = &rec.meter {
                meter.add_start_sample(self.epoch.elapsed());
            }
            rec.rounds_in_batch += 1;
            rounds += 1;
        }

        if rounds > 0 {
            activation.set_batch_in_flight(true);
            tracing::debug!(group = %handle, rounds, batch = rec.rounds_in_batch, "drained");
        }
        if !rec.has_pending_input() {
            rec.first_queued_at = None;
            rec.disarm_switch_timer();
        }
        Ok(())
    }
}

// ── Free helpers ───────────────────────────────────────────────

/// Resolves a handle to its dense index, failing with *not-found* for
/// unknown handles and tombstones (dropped owners).
fn live_index(state: &SchedulerState, handle: NetworkGroupHandle) -> Result<usize, SchedulerError> {
    let idx = handle
        .index()
        .filter(|&i| i < state.groups.len())
        .ok_or(SchedulerError::NotFound { handle })?;
    if !state.groups[idx].is_alive() {
        return Err(SchedulerError::NotFound { handle });
    }
    Ok(idx)
}

fn validate_network_name(rec: &GroupRecord, network_name: &str) -> Result<(), SchedulerError> {
    if network_name.is_empty() || network_name == rec.name {
        Ok(())
    } else {
        Err(SchedulerError::InvalidArgument(format!(
            "unknown network name '{network_name}' for group '{}'",
            rec.name
        )))
    }
}

fn stream_not_found(handle: NetworkGroupHandle, stream: &str) -> SchedulerError {
    SchedulerError::StreamNotFound {
        handle,
        stream: stream.to_string(),
    }
}

fn aborted(handle: NetworkGroupHandle, stream: &str) -> SchedulerError {
    SchedulerError::Aborted {
        handle,
        stream: stream.to_string(),
    }
}

fn degraded_error(handle: NetworkGroupHandle) -> SchedulerError {
    SchedulerError::ActivationFailed {
        handle,
        reason: "previous device activation failed; re-enable a stream to retry".into(),
    }
}

fn stream_snapshot(s: &StreamState) -> StreamSnapshot {
    StreamSnapshot {
        name: s.name.clone(),
        stopped: s.is_stopped(),
        counters: s.counters.snapshot(),
    }
}
