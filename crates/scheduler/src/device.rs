// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The device seam.
//!
//! The scheduler treats the accelerator as a single exclusive resource
//! reached only through [`DeviceControl`]. The driver layer supplies the
//! implementation; the contract is that `activate`, `deactivate`, and
//! `drain_one` are synchronous, mutually exclusive, and fast (microseconds
//! scale) — they run under the scheduler's central lock and are its only
//! I/O there.

use crate::handle::NetworkGroupHandle;

/// Errors reported by the driver layer.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The device refused to program the network group.
    #[error("device rejected activation: {0}")]
    ActivationRejected(String),

    /// Handing one frame to the device's input ring failed.
    #[error("device transfer failed on stream '{stream}': {detail}")]
    TransferFailed { stream: String, detail: String },

    /// The device is in a state where no control call can be accepted.
    #[error("device is busy")]
    Busy,
}

/// Control surface the driver layer must provide.
///
/// Exactly one group is programmed at a time: `activate` requires the
/// device to be idle, `deactivate` returns it to idle, and the two must
/// alternate. `drain_one` returns once the device has accepted one frame
/// of the given input stream into its DMA ring.
pub trait DeviceControl: Send {
    /// Programs the device to run the given network group.
    fn activate(&mut self, handle: NetworkGroupHandle) -> Result<(), DeviceError>;

    /// Returns the device to idle.
    fn deactivate(&mut self) -> Result<(), DeviceError>;

    /// Hands one frame of `input_stream` to the active group.
    fn drain_one(
        &mut self,
        handle: NetworkGroupHandle,
        input_stream: &str,
    ) -> Result<(), DeviceError>;
}

/// A device that accepts every call and does nothing.
///
/// Useful for wiring tests and for exercising the scheduler without
/// hardware.
#[derive(Debug, Default)]
pub struct NoopDevice;

impl DeviceControl for NoopDevice {
    fn activate(&mut self, _handle: NetworkGroupHandle) -> Result<(), DeviceError> {
        Ok(())
    }

    fn deactivate(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn drain_one(
        &mut self,
        _handle: NetworkGroupHandle,
        _input_stream: &str,
    ) -> Result<(), DeviceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_device_accepts_everything() {
        let mut dev = NoopDevice;
        let h = NetworkGroupHandle::from_index(0);
        assert!(dev.activate(h).is_ok());
        assert!(dev.drain_one(h, "input0").is_ok());
        assert!(dev.deactivate().is_ok());
    }
}
