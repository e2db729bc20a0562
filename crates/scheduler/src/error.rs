// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the network-group scheduler.

use crate::device::DeviceError;
use crate::handle::NetworkGroupHandle;

/// Errors surfaced by scheduler operations.
///
/// Producer/consumer errors are returned synchronously to the caller; there
/// is no asynchronous error channel. An [`ActivationFailed`] is additionally
/// recorded on the group and poisons subsequent writes until a stream of the
/// group is re-enabled.
///
/// [`ActivationFailed`]: SchedulerError::ActivationFailed
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The handle was never registered or its owning configured network
    /// group has been dropped.
    #[error("network group {handle} not found (unregistered or owner dropped)")]
    NotFound { handle: NetworkGroupHandle },

    /// The named stream is not part of the network group.
    #[error("stream '{stream}' is not part of network group {handle}")]
    StreamNotFound {
        handle: NetworkGroupHandle,
        stream: String,
    },

    /// A bad parameter: zero threshold, zero batch size, a group with no
    /// streams, or an unknown network name.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A blocking wait exceeded its caller-supplied deadline.
    #[error("wait deadline expired")]
    Timeout,

    /// The stream was disabled while the caller was waiting on it.
    #[error("operation aborted: stream '{stream}' of {handle} is disabled")]
    Aborted {
        handle: NetworkGroupHandle,
        stream: String,
    },

    /// The device refused to activate the group; the group is degraded
    /// until one of its streams is re-enabled.
    #[error("activation failed for network group {handle}: {reason}")]
    ActivationFailed {
        handle: NetworkGroupHandle,
        reason: String,
    },

    /// A device call outside the activation path failed.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// The latency meter has no fused sample, or latency measurement is
    /// disabled for this group.
    #[error("no latency measurement available for {handle}")]
    NotAvailable { handle: NetworkGroupHandle },
}
