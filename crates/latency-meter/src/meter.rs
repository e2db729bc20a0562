// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The latency meter: start/end timestamp correlation.
//!
//! One meter instance serves one network group. The set of output channels
//! is fixed at construction; only the timestamp rings and the accumulators
//! mutate afterwards, all behind a single mutex.
//!
//! # Thread Safety
//! `add_start_sample` is expected from exactly one thread, and each
//! channel's `add_end_sample` from exactly one thread per channel — the
//! per-stream FIFO ordering of the scheduler guarantees this. `get_latency`
//! may be called from any thread. All three serialize on the internal lock
//! for the correlation step, so the expectation is about sample *order*,
//! not memory safety.

use crate::{MeterError, TimestampRing};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

struct MeterInner {
    /// Start timestamps, one per frame entering the device.
    starts: TimestampRing,
    /// End timestamps keyed by output channel index. Keys are fixed at
    /// construction; only the rings mutate.
    ends: BTreeMap<u32, TimestampRing>,
    latency_sum: Duration,
    latency_count: u64,
}

/// Running-mean latency of one network group's inference stream.
///
/// # Example
/// ```
/// use latency_meter::LatencyMeter;
/// use std::time::Duration;
///
/// let meter = LatencyMeter::new([3], 16).unwrap();
/// meter.add_start_sample(Duration::from_nanos(1_000));
/// meter.add_end_sample(3, Duration::from_nanos(1_500)).unwrap();
/// assert_eq!(meter.get_latency(false).unwrap(), Duration::from_nanos(500));
/// ```
pub struct LatencyMeter {
    inner: Mutex<MeterInner>,
}

impl LatencyMeter {
    /// Creates a meter for the given output channels with a per-sequence
    /// timestamp window of `capacity` entries.
    ///
    /// Fails with [`MeterError::NoChannels`] on an empty channel set and
    /// [`MeterError::ZeroWindow`] on a zero capacity. Duplicate channel
    /// indices collapse to one channel.
    pub fn new(
        output_channels: impl IntoIterator<Item = u32>,
        capacity: usize,
    ) -> Result<Self, MeterError> {
        if capacity == 0 {
            return Err(MeterError::ZeroWindow);
        }

        let ends: BTreeMap<u32, TimestampRing> = output_channels
            .into_iter()
            .map(|ch| (ch, TimestampRing::with_capacity(capacity)))
            .collect();
        if ends.is_empty() {
            return Err(MeterError::NoChannels);
        }

        Ok(Self {
            inner: Mutex::new(MeterInner {
                starts: TimestampRing::with_capacity(capacity),
                ends,
                latency_sum: Duration::ZERO,
                latency_count: 0,
            }),
        })
    }

    /// Records the start timestamp of one frame entering the device.
    pub fn add_start_sample(&self, timestamp: Duration) {
        let mut inner = lock(&self.inner);
        inner.starts.push_back(timestamp);
        update(&mut inner);
    }

    /// Records the end timestamp of one result on the given output channel.
    ///
    /// One inference sample is fused once *every* channel has an end
    /// timestamp for the frame.
    pub fn add_end_sample(&self, channel: u32, timestamp: Duration) -> Result<(), MeterError> {
        let mut inner = lock(&self.inner);
        inner
            .ends
            .get_mut(&channel)
            .ok_or(MeterError::UnknownChannel { channel })?
            .push_back(timestamp);
        update(&mut inner);
        Ok(())
    }

    /// Returns the mean latency over all fused samples.
    ///
    /// Fails with [`MeterError::NotAvailable`] if no sample has been fused.
    /// Passing `clear = true` resets the accumulators atomically with the
    /// returned value.
    pub fn get_latency(&self, clear: bool) -> Result<Duration, MeterError> {
        let mut inner = lock(&self.inner);

        if inner.latency_count == 0 {
            return Err(MeterError::NotAvailable);
        }

        let nanos = inner.latency_sum.as_nanos() / u128::from(inner.latency_count);
        let latency = Duration::from_nanos(nanos as u64);

        if clear {
            inner.latency_sum = Duration::ZERO;
            inner.latency_count = 0;
        }

        Ok(latency)
    }

    /// Returns the number of fused samples since construction (or the last
    /// clearing query).
    pub fn sample_count(&self) -> u64 {
        lock(&self.inner).latency_count
    }
}

/// Fuses as many samples as the rings allow: while the start ring and every
/// channel ring are non-empty, one sample's latency is the maximum channel
/// front minus the start front.
fn update(inner: &mut MeterInner) {
    loop {
        let Some(start) = inner.starts.front() else {
            return; // wait for a start sample
        };

        let mut end = Duration::ZERO;
        for ring in inner.ends.values() {
            match ring.front() {
                Some(t) => end = end.max(t),
                None => return, // wait for all channel samples
            }
        }

        inner.latency_sum += end.saturating_sub(start);
        inner.latency_count += 1;

        inner.starts.pop_front();
        for ring in inner.ends.values_mut() {
            ring.pop_front();
        }
    }
}

fn lock(mutex: &Mutex<MeterInner>) -> std::sync::MutexGuard<'_, MeterInner> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl std::fmt::Debug for LatencyMeter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("LatencyMeter")
            .field("channels", &inner.ends.keys().collect::<Vec<_>>())
            .field("latency_count", &inner.latency_count)
            .field("latency_sum", &inner.latency_sum)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(n: u64) -> Duration {
        Duration::from_nanos(n)
    }

    #[test]
    fn test_no_samples_not_available() {
        let meter = LatencyMeter::new([0], 4).unwrap();
        assert!(matches!(
            meter.get_latency(false),
            Err(MeterError::NotAvailable)
        ));
    }

    #[test]
    fn test_single_channel_single_sample() {
        let meter = LatencyMeter::new([0], 4).unwrap();
        meter.add_start_sample(ns(100));
        meter.add_end_sample(0, ns(160)).unwrap();
        assert_eq!(meter.get_latency(false).unwrap(), ns(60));
        assert_eq!(meter.sample_count(), 1);
    }

    #[test]
    fn test_slowest_channel_wins() {
        let meter = LatencyMeter::new([7, 9], 8).unwrap();
        meter.add_start_sample(ns(100));
        meter.add_end_sample(7, ns(150)).unwrap();
        // Not fused yet — channel 9 is still owed.
        assert!(meter.get_latency(false).is_err());
        meter.add_end_sample(9, ns(170)).unwrap();
        assert_eq!(meter.get_latency(false).unwrap(), ns(70));
    }

    #[test]
    fn test_three_frame_correlation() {
        // Mirrors a two-output group over three frames.
        let meter = LatencyMeter::new([7, 9], 8).unwrap();
        for t in [100, 200, 300] {
            meter.add_start_sample(ns(t));
        }
        for t in [150, 280, 360] {
            meter.add_end_sample(7, ns(t)).unwrap();
        }
        for t in [170, 260, 400] {
            meter.add_end_sample(9, ns(t)).unwrap();
        }

        // (170−100) + (280−200) + (400−300) = 250 over 3 samples.
        assert_eq!(meter.sample_count(), 3);
        assert_eq!(meter.get_latency(false).unwrap(), ns(83));
    }

    #[test]
    fn test_interleaved_feed_order() {
        // Ends may arrive before their start on another channel's thread.
        let meter = LatencyMeter::new([0, 1], 8).unwrap();
        meter.add_end_sample(0, ns(50)).unwrap();
        meter.add_end_sample(1, ns(60)).unwrap();
        assert!(meter.get_latency(false).is_err());

        meter.add_start_sample(ns(10));
        assert_eq!(meter.get_latency(false).unwrap(), ns(50));
    }

    #[test]
    fn test_clear_resets_accumulators() {
        let meter = LatencyMeter::new([0], 4).unwrap();
        meter.add_start_sample(ns(0));
        meter.add_end_sample(0, ns(40)).unwrap();

        assert_eq!(meter.get_latency(true).unwrap(), ns(40));
        assert!(matches!(
            meter.get_latency(false),
            Err(MeterError::NotAvailable)
        ));

        // Accumulation continues cleanly after a clear.
        meter.add_start_sample(ns(100));
        meter.add_end_sample(0, ns(120)).unwrap();
        assert_eq!(meter.get_latency(false).unwrap(), ns(20));
    }

    #[test]
    fn test_unknown_channel() {
        let meter = LatencyMeter::new([1, 2], 4).unwrap();
        assert!(matches!(
            meter.add_end_sample(5, ns(10)),
            Err(MeterError::UnknownChannel { channel: 5 })
        ));
    }

    #[test]
    fn test_constructor_validation() {
        assert!(matches!(
            LatencyMeter::new(std::iter::empty(), 4),
            Err(MeterError::NoChannels)
        ));
        assert!(matches!(
            LatencyMeter::new([0], 0),
            Err(MeterError::ZeroWindow)
        ));
    }

    #[test]
    fn test_mean_rounds_down() {
        let meter = LatencyMeter::new([0], 4).unwrap();
        meter.add_start_sample(ns(0));
        meter.add_end_sample(0, ns(3)).unwrap();
        meter.add_start_sample(ns(10));
        meter.add_end_sample(0, ns(14)).unwrap();
        // (3 + 4) / 2 = 3 (integer nanoseconds).
        assert_eq!(meter.get_latency(false).unwrap(), ns(3));
    }
}
