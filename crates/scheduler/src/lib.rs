// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # scheduler
//!
//! Time-multiplexes a single hardware inference accelerator between
//! configured network groups. Producer and consumer threads push input
//! frames and pull results through per-stream gates; exactly one group is
//! active on the device at any moment. Switching is expensive, so work is
//! batched and switches amortized while honoring per-group fairness,
//! threshold, and timeout contracts.
//!
//! # Key Components
//!
//! - [`Scheduler`] — the waiter core: one mutex, one condition variable,
//!   and the producer/consumer gates (`wait_for_write`,
//!   `signal_write_finish`, `wait_for_read`, `signal_read_finish`).
//! - [`ConfiguredNetworkGroup`] — owner-side trait; the scheduler holds
//!   registered groups weakly and treats dropped owners as *not-found*.
//! - [`DeviceControl`] — the driver seam (`activate` / `deactivate` /
//!   `drain_one`); the device is a single exclusive resource.
//! - [`SchedulerPolicy`] / [`SchedulingAlgorithm`] — pluggable pick of
//!   the next group; round-robin is provided.
//! - [`IdleGuard`] — scoped quiescence for safe device reconfiguration.
//! - [`SchedulerConfig`] — per-group defaults, loadable from TOML.
//! - [`SchedulerSnapshot`] — read-only monitoring surface.
//!
//! # Scheduling Model
//!
//! ```text
//!            register
//!   [None] ─────────► [Idle]
//!                       │  chosen as next, switch protocol ok
//!                       ▼
//!                   [Activating]
//!                       │  activate() success
//!                       ▼
//!                   [Active, draining]
//!                       │  batch drained, all outputs consumed
//!                       ▼
//!                   [Active, quiescent]
//!                       │  policy picks another
//!                       ▼
//!                   [Deactivating] ──► [Idle]
//! ```
//!
//! A group is *ready* once every input stream has a queued frame and
//! either some stream reached its pending-frame threshold, its switch
//! timeout elapsed, or it is the only group with work. Ready groups are
//! picked in strict rotation order; switches happen only at batch
//! boundaries, with no preemption of an in-flight batch.
//!
//! Latency is measured per group by the companion `latency-meter` crate:
//! the drain path posts start samples, the read path posts per-channel
//! end samples, and [`Scheduler::measured_latency`] reads the running
//! mean.

mod activation;
mod config;
mod core;
mod counters;
mod device;
mod error;
mod group;
mod handle;
mod idle;
mod policy;
mod readiness;
mod snapshot;
mod timer;

pub use crate::core::Scheduler;
pub use config::SchedulerConfig;
pub use counters::{CounterSnapshot, StreamCounters};
pub use device::{DeviceControl, DeviceError, NoopDevice};
pub use error::SchedulerError;
pub use group::{ConfiguredNetworkGroup, StaticNetworkGroup};
pub use handle::NetworkGroupHandle;
pub use idle::IdleGuard;
pub use policy::{RoundRobinPolicy, SchedulerPolicy, SchedulingAlgorithm};
pub use snapshot::{GroupSnapshot, SchedulerSnapshot, StreamSnapshot};
