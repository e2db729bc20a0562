// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # latency-meter
//!
//! Measures the average end-to-end latency of an inference datastream:
//! the time between a frame entering the device and the *slowest* output
//! channel emitting its corresponding result.
//!
//! # Key Components
//!
//! - [`LatencyMeter`] — fuses per-frame start timestamps with per-channel
//!   end timestamps into a running mean.
//! - [`TimestampRing`] — the fixed-capacity FIFO backing each timestamp
//!   sequence; the oldest entry is evicted on overflow.
//! - [`MeterError`] — construction and query failures.
//!
//! # Correlation Model
//!
//! ```text
//! add_start_sample(t)        ──►  [start ring]
//! add_end_sample(ch, t)      ──►  [end ring for ch]
//!
//! whenever the start ring and every channel ring are non-empty:
//!     latency = max(front of each channel ring) − front of start ring
//! ```
//!
//! One inference is finished when its slowest output channel has produced
//! a result, so the sample latency is taken against the maximum of the
//! channel fronts. Callers must feed samples in frame order per channel.
//!
//! # Example
//! ```
//! use latency_meter::LatencyMeter;
//! use std::time::Duration;
//!
//! let meter = LatencyMeter::new([0, 1], 8).unwrap();
//! meter.add_start_sample(Duration::from_nanos(100));
//! meter.add_end_sample(0, Duration::from_nanos(150)).unwrap();
//! meter.add_end_sample(1, Duration::from_nanos(170)).unwrap();
//!
//! // One fused sample: 170 − 100 = 70 ns.
//! assert_eq!(meter.get_latency(false).unwrap(), Duration::from_nanos(70));
//! ```

mod error;
mod meter;
mod ring;

pub use error::MeterError;
pub use meter::LatencyMeter;
pub use ring::TimestampRing;
