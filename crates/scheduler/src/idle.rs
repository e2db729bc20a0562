// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The idle guard.
//!
//! An [`IdleGuard`] is a scoped acquisition of the scheduler's forced-idle
//! flag. While one is held the scheduler is quiescent — the in-flight
//! batch has completed, nothing is active on the device, and every
//! activation attempt blocks — which makes device reconfiguration safe.
//! The flag is released on all exit paths by the `Drop` impl.

use crate::core::SchedulerInner;
use crate::error::SchedulerError;
use std::sync::Arc;

/// Holds the scheduler quiescent until dropped.
///
/// Obtained from [`Scheduler::create_idle_guard`]; acquisition blocks
/// until any other guard is released, the current batch completes, and
/// the active group is deactivated.
///
/// [`Scheduler::create_idle_guard`]: crate::Scheduler::create_idle_guard
pub struct IdleGuard {
    inner: Arc<SchedulerInner>,
}

impl IdleGuard {
    pub(crate) fn acquire(inner: Arc<SchedulerInner>) -> Result<Self, SchedulerError> {
        {
            let mut state = inner.lock_state();

            // The forced-idle flag is exclusive: one guard at a time.
            while state.activation.forced_idle() {
                state = inner.wait(state);
            }
            state.activation.set_forced_idle(true);
            inner.cv.notify_all();

            // Quiesce: the in-flight batch finishes on its own (readers
            // keep consuming), then the active group is released.
            loop {
                if state.activation.batch_in_flight() {
                    state = inner.wait(state);
                    continue;
                }
                if state.activation.current().is_valid() {
                    if let Err(err) = state.activation.deactivate() {
                        state.activation.set_forced_idle(false);
                        inner.cv.notify_all();
                        return Err(err);
                    }
                    inner.cv.notify_all();
                    continue;
                }
                break;
            }
            tracing::info!("scheduler quiesced, idle guard held");
        }

        Ok(Self { inner })
    }
}

impl Drop for IdleGuard {
    fn drop(&mut self) {
        let mut state = self.inner.lock_state();
        state.activation.set_forced_idle(false);
        // Pending work may re-activate immediately; a failed activation
        // here degrades the group and surfaces on its next write.
        self.inner.scheduling_step_quiet(&mut state);
        self.inner.cv.notify_all();
        tracing::info!("idle guard released");
    }
}

impl std::fmt::Debug for IdleGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleGuard").finish()
    }
}
