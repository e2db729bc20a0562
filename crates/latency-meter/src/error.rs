// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for latency measurement.

/// Errors that can occur while constructing or querying a latency meter.
#[derive(Debug, thiserror::Error)]
pub enum MeterError {
    /// An end sample was posted for a channel that was not in the
    /// constructor-supplied set.
    #[error("output channel {channel} is not registered with this meter")]
    UnknownChannel { channel: u32 },

    /// `get_latency` was called before any sample pair was fused.
    #[error("no latency measurement available yet")]
    NotAvailable,

    /// The meter was constructed with an empty output-channel set.
    #[error("latency meter requires at least one output channel")]
    NoChannels,

    /// The meter was constructed with a zero-capacity timestamp window.
    #[error("timestamp window capacity must be at least 1")]
    ZeroWindow,
}
