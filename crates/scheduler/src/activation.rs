// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The activation controller.
//!
//! Owns the device handle and the scheduler-global activation state, and
//! serializes every device-visible transition. All calls happen inside the
//! waiter core's critical section; the activate/deactivate device calls
//! are the scheduler's serialization point and must be fast.

use crate::device::DeviceControl;
use crate::error::SchedulerError;
use crate::handle::NetworkGroupHandle;

pub(crate) struct ActivationController {
    device: Box<dyn DeviceControl>,
    /// The active group, or `INVALID` when the device is idle.
    current: NetworkGroupHandle,
    /// The scheduled-but-not-yet-activated successor; may equal `current`.
    next: NetworkGroupHandle,
    /// True from the moment a switch is decided until the successor is
    /// activated.
    is_switching: bool,
    /// True while a drained batch still owes results to readers.
    batch_in_flight: bool,
    /// Set by the idle guard; blocks any activation while held.
    forced_idle: bool,
    /// Number of successful activations since construction.
    switch_count: u64,
}

impl ActivationController {
    pub fn new(device: Box<dyn DeviceControl>) -> Self {
        Self {
            device,
            current: NetworkGroupHandle::INVALID,
            next: NetworkGroupHandle::INVALID,
            is_switching: false,
            batch_in_flight: false,
            forced_idle: false,
            switch_count: 0,
        }
    }

    pub fn current(&self) -> NetworkGroupHandle {
        self.current
    }

    pub fn next(&self) -> NetworkGroupHandle {
        self.next
    }

    pub fn set_next(&mut self, next: NetworkGroupHandle) {
        self.next = next;
    }

    pub fn is_switching(&self) -> bool {
        self.is_switching
    }

    pub fn set_switching(&mut self, switching: bool) {
        self.is_switching = switching;
    }

    pub fn batch_in_flight(&self) -> bool {
        self.batch_in_flight
    }

    pub fn set_batch_in_flight(&mut self, in_flight: bool) {
        self.batch_in_flight = in_flight;
    }

    pub fn forced_idle(&self) -> bool {
        self.forced_idle
    }

    pub fn set_forced_idle(&mut self, forced: bool) {
        self.forced_idle = forced;
    }

    pub fn switch_count(&self) -> u64 {
        self.switch_count
    }

    /// Programs the device to run `handle`.
    ///
    /// The device must be idle. On failure `current` stays `INVALID` and
    /// the caller is expected to degrade the group.
    pub fn activate(&mut self, handle: NetworkGroupHandle) -> Result<(), SchedulerError> {
        assert!(
            !self.current.is_valid(),
            "activate called while {} is active",
            self.current
        );

        match self.device.activate(handle) {
            Ok(()) => {
                self.current = handle;
                self.is_switching = false;
                self.switch_count += 1;
                tracing::info!(group = %handle, switches = self.switch_count, "activated");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(group = %handle, error = %err, "device refused activation");
                Err(SchedulerError::ActivationFailed {
                    handle,
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Releases the active group back to idle. Must separate any two
    /// distinct activations.
    pub fn deactivate(&mut self) -> Result<(), SchedulerError> {
        if !self.current.is_valid() {
            return Ok(());
        }
        let outgoing = self.current;
        self.device.deactivate()?;
        self.current = NetworkGroupHandle::INVALID;
        tracing::info!(group = %outgoing, "deactivated");
        Ok(())
    }

    /// Hands one frame of the active group's input stream to the device.
    pub fn drain_one(
        &mut self,
        handle: NetworkGroupHandle,
        input_stream: &str,
    ) -> Result<(), SchedulerError> {
        debug_assert_eq!(handle, self.current, "drain for a non-active group");
        self.device.drain_one(handle, input_stream)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceError, NoopDevice};

    struct RefusingDevice;

    impl DeviceControl for RefusingDevice {
        fn activate(&mut self, _h: NetworkGroupHandle) -> Result<(), DeviceError> {
            Err(DeviceError::ActivationRejected("power budget".into()))
        }
        fn deactivate(&mut self) -> Result<(), DeviceError> {
            Ok(())
        }
        fn drain_one(&mut self, _h: NetworkGroupHandle, _s: &str) -> Result<(), DeviceError> {
            Ok(())
        }
    }

    #[test]
    fn test_activate_deactivate_cycle() {
        let mut ctrl = ActivationController::new(Box::new(NoopDevice));
        let h = NetworkGroupHandle::from_index(0);

        assert!(!ctrl.current().is_valid());
        ctrl.activate(h).unwrap();
        assert_eq!(ctrl.current(), h);
        assert_eq!(ctrl.switch_count(), 1);

        ctrl.deactivate().unwrap();
        assert!(!ctrl.current().is_valid());
    }

    #[test]
    fn test_failed_activation_leaves_idle() {
        let mut ctrl = ActivationController::new(Box::new(RefusingDevice));
        let h = NetworkGroupHandle::from_index(2);

        let err = ctrl.activate(h).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::ActivationFailed { handle, .. } if handle == h
        ));
        assert!(!ctrl.current().is_valid());
        assert_eq!(ctrl.switch_count(), 0);
    }

    #[test]
    fn test_deactivate_when_idle_is_noop() {
        let mut ctrl = ActivationController::new(Box::new(NoopDevice));
        ctrl.deactivate().unwrap();
        assert!(!ctrl.current().is_valid());
    }

    #[test]
    #[should_panic(expected = "activate called while")]
    fn test_double_activate_panics() {
        let mut ctrl = ActivationController::new(Box::new(NoopDevice));
        ctrl.activate(NetworkGroupHandle::from_index(0)).unwrap();
        let _ = ctrl.activate(NetworkGroupHandle::from_index(1));
    }
}
