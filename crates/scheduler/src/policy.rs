// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Scheduling policies.
//!
//! A policy answers one question: given which groups are ready, which runs
//! next? Policies are purely algorithmic — no I/O or clock access — making
//! them trivially unit-testable. Only round-robin is implemented; the
//! trait leaves room for alternatives (priority, deadline-driven, ...).

use crate::handle::NetworkGroupHandle;

/// Picks the next network group among the ready ones.
pub trait SchedulerPolicy: Send {
    /// Human-readable name of this policy.
    fn name(&self) -> &str;

    /// `ready[i]` tells whether the group with dense handle `i` is ready.
    /// Returns the chosen handle, or `None` when nothing is ready.
    fn choose_next(&mut self, ready: &[bool]) -> Option<NetworkGroupHandle>;
}

/// The scheduling algorithm selected at scheduler construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SchedulingAlgorithm {
    /// Strict rotation over registered groups, independent of queue depth.
    RoundRobin,
}

impl SchedulingAlgorithm {
    /// Creates the policy implementing this algorithm.
    pub fn create_policy(self) -> Box<dyn SchedulerPolicy> {
        match self {
            SchedulingAlgorithm::RoundRobin => Box::new(RoundRobinPolicy::new()),
        }
    }
}

/// Round-robin with a rotation cursor.
///
/// Each decision walks the registered handles starting *after* the cursor,
/// wrapping around, and returns the first ready one; the cursor advances
/// to the chosen handle. Strict rotation order prevents a low-threshold
/// group from being starved by a high-threshold one.
#[derive(Debug, Default)]
pub struct RoundRobinPolicy {
    cursor: usize,
}

impl RoundRobinPolicy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SchedulerPolicy for RoundRobinPolicy {
    fn name(&self) -> &str {
        "round-robin"
    }

    fn choose_next(&mut self, ready: &[bool]) -> Option<NetworkGroupHandle> {
        let n = ready.len();
        if n == 0 {
            return None;
        }

        // The walk covers all n handles, so the cursor position itself is
        // visited last.
        for step in 1..=n {
            let index = (self.cursor + step) % n;
            if ready[index] {
                self.cursor = index;
                return Some(NetworkGroupHandle::from_index(index));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chosen(policy: &mut RoundRobinPolicy, ready: &[bool]) -> Option<usize> {
        policy.choose_next(ready).and_then(|h| h.index())
    }

    #[test]
    fn test_empty_set() {
        let mut p = RoundRobinPolicy::new();
        assert_eq!(p.choose_next(&[]), None);
        assert_eq!(p.choose_next(&[false, false]), None);
    }

    #[test]
    fn test_rotation_over_all_ready() {
        let mut p = RoundRobinPolicy::new();
        let ready = [true, true, true];
        assert_eq!(chosen(&mut p, &ready), Some(1));
        assert_eq!(chosen(&mut p, &ready), Some(2));
        assert_eq!(chosen(&mut p, &ready), Some(0));
        assert_eq!(chosen(&mut p, &ready), Some(1));
    }

    #[test]
    fn test_skips_unready() {
        let mut p = RoundRobinPolicy::new();
        assert_eq!(chosen(&mut p, &[false, true, false]), Some(1));
        // Cursor is now 1; group 1 stays ready but 2 and 0 do not.
        assert_eq!(chosen(&mut p, &[false, true, false]), Some(1));
    }

    #[test]
    fn test_solo_group_repicked() {
        let mut p = RoundRobinPolicy::new();
        assert_eq!(chosen(&mut p, &[true]), Some(0));
        assert_eq!(chosen(&mut p, &[true]), Some(0));
    }

    #[test]
    fn test_fairness_window() {
        // Two continuously ready groups alternate strictly: over 2k
        // decisions each is chosen exactly k times.
        let mut p = RoundRobinPolicy::new();
        let mut counts = [0usize; 2];
        for _ in 0..20 {
            let i = chosen(&mut p, &[true, true]).unwrap();
            counts[i] += 1;
        }
        assert_eq!(counts, [10, 10]);
    }

    #[test]
    fn test_algorithm_factory() {
        let policy = SchedulingAlgorithm::RoundRobin.create_policy();
        assert_eq!(policy.name(), "round-robin");
    }
}
