// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Read-only monitoring snapshots.
//!
//! A [`SchedulerSnapshot`] is a point-in-time copy of the activation state
//! and every group's per-stream counters, taken under the scheduler lock.
//! It exists for logs, tests, and external monitors; nothing in the
//! scheduling path reads it back.

use crate::counters::CounterSnapshot;
use crate::handle::NetworkGroupHandle;

/// One stream's state at snapshot time.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StreamSnapshot {
    pub name: String,
    pub stopped: bool,
    pub counters: CounterSnapshot,
}

/// One registered group's state at snapshot time.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GroupSnapshot {
    pub handle: NetworkGroupHandle,
    pub name: String,
    pub alive: bool,
    pub degraded: bool,
    pub inputs: Vec<StreamSnapshot>,
    pub outputs: Vec<StreamSnapshot>,
}

/// Scheduler-global state at snapshot time.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchedulerSnapshot {
    pub current: NetworkGroupHandle,
    pub next: NetworkGroupHandle,
    pub is_switching: bool,
    pub batch_in_flight: bool,
    pub forced_idle: bool,
    pub switch_count: u64,
    pub groups: Vec<GroupSnapshot>,
}

impl SchedulerSnapshot {
    /// Returns a one-line human-readable summary.
    pub fn summary(&self) -> String {
        let queued: u32 = self
            .groups
            .iter()
            .flat_map(|g| g.inputs.iter())
            .map(|s| s.counters.pending_frames())
            .sum();
        let owed: u32 = self
            .groups
            .iter()
            .flat_map(|g| g.outputs.iter())
            .map(|s| s.counters.owed_results())
            .sum();

        format!(
            "Scheduler: {} groups, current {}, {} switches, {} frames queued, \
             {} results owed{}{}",
            self.groups.len(),
            self.current,
            self.switch_count,
            queued,
            owed,
            if self.batch_in_flight { ", batch in flight" } else { "" },
            if self.forced_idle { ", forced idle" } else { "" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(name: &str, written: u32, sent: u32, finished: u32) -> StreamSnapshot {
        StreamSnapshot {
            name: name.into(),
            stopped: false,
            counters: CounterSnapshot {
                requested_write: written,
                written_buffer: written,
                sent_pending_buffer: sent,
                finished_read: finished,
            },
        }
    }

    #[test]
    fn test_summary_counts() {
        let snap = SchedulerSnapshot {
            current: NetworkGroupHandle::from_index(0),
            next: NetworkGroupHandle::from_index(0),
            is_switching: false,
            batch_in_flight: true,
            forced_idle: false,
            switch_count: 3,
            groups: vec![GroupSnapshot {
                handle: NetworkGroupHandle::from_index(0),
                name: "g0".into(),
                alive: true,
                degraded: false,
                inputs: vec![stream("in0", 5, 3, 0)],
                outputs: vec![stream("out0", 0, 3, 1)],
            }],
        };

        let s = snap.summary();
        assert!(s.contains("1 groups"));
        assert!(s.contains("ng#0"));
        assert!(s.contains("3 switches"));
        assert!(s.contains("2 frames queued"));
        assert!(s.contains("2 results owed"));
        assert!(s.contains("batch in flight"));
    }
}
