// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Archive client configuration - single source of truth for defaults.
//!
//! All control-channel defaults and the client semantic version live here.
//! **Never hardcode them at use sites.**

use std::fmt;
use std::time::Duration;

use crate::error::ErrorHandler;

/// Client protocol major version.
pub const CLIENT_MAJOR_VERSION: u8 = 0;

/// Client protocol minor version.
pub const CLIENT_MINOR_VERSION: u8 = 2;

/// Client protocol patch version.
pub const CLIENT_PATCH_VERSION: u8 = 1;

/// Compose a semantic version the way the connect request carries it.
#[must_use]
pub const fn semantic_version(major: u8, minor: u8, patch: u8) -> i32 {
    ((major as i32) << 16) | ((minor as i32) << 8) | (patch as i32)
}

/// Semantic version sent in every connect request.
pub const CLIENT_SEMANTIC_VERSION: i32 =
    semantic_version(CLIENT_MAJOR_VERSION, CLIENT_MINOR_VERSION, CLIENT_PATCH_VERSION);

/// Timeout when waiting on a message to be sent or received.
pub const MESSAGE_TIMEOUT_DEFAULT: Duration = Duration::from_secs(5);

/// Channel for sending control messages to an archive.
pub const CONTROL_REQUEST_CHANNEL_DEFAULT: &str = "aeron:udp?endpoint=localhost:8010";

/// Stream id for sending control messages to an archive.
pub const CONTROL_REQUEST_STREAM_ID_DEFAULT: i32 = 10;

/// Channel for receiving control responses from an archive.
pub const CONTROL_RESPONSE_CHANNEL_DEFAULT: &str = "aeron:udp?endpoint=localhost:8020";

/// Stream id for receiving control responses from an archive.
pub const CONTROL_RESPONSE_STREAM_ID_DEFAULT: i32 = 20;

/// Channel for receiving progress events of recordings from an archive.
/// Dynamic multi-destination-cast so subscribers can come and go.
pub const RECORDING_EVENTS_CHANNEL_DEFAULT: &str =
    "aeron:udp?control-mode=dynamic|control=localhost:8030";

/// Stream id for receiving progress events of recordings from an archive.
pub const RECORDING_EVENTS_STREAM_ID_DEFAULT: i32 = 30;

/// Control streams use sparse term buffer files by default.
pub const CONTROL_TERM_BUFFER_SPARSE_DEFAULT: bool = true;

/// Low term length for control channels reflects expected low bandwidth.
pub const CONTROL_TERM_BUFFER_LENGTH_DEFAULT: i32 = 64 * 1024;

/// MTU for the control streams.
pub const CONTROL_MTU_LENGTH_DEFAULT: i32 = 1408;

/// Configuration for one control session to an archive.
///
/// Built in the builder style:
///
/// ```
/// use std::time::Duration;
/// use strata_archive::ArchiveConfig;
///
/// let config = ArchiveConfig::new()
///     .message_timeout(Duration::from_secs(10))
///     .control_request_channel("aeron:udp?endpoint=archive-host:8010");
/// assert_eq!(config.message_timeout, Duration::from_secs(10));
/// ```
#[derive(Clone)]
pub struct ArchiveConfig {
    /// Timeout for sending a request or awaiting its response.
    pub message_timeout: Duration,

    /// Channel for control requests.
    pub control_request_channel: String,

    /// Stream id for control requests.
    pub control_request_stream_id: i32,

    /// Channel for control responses.
    pub control_response_channel: String,

    /// Stream id for control responses.
    pub control_response_stream_id: i32,

    /// Channel for recording progress events.
    pub recording_events_channel: String,

    /// Stream id for recording progress events.
    pub recording_events_stream_id: i32,

    /// Whether control term buffers are sparse files.
    pub control_term_buffer_sparse: bool,

    /// Term buffer length for the control streams.
    pub control_term_buffer_length: i32,

    /// MTU for the control streams.
    pub control_mtu_length: i32,

    /// Handler for errors the archive reports outside the awaited
    /// request/response window. `None` drops them.
    pub error_handler: Option<ErrorHandler>,
}

impl ArchiveConfig {
    /// Create a config with the module defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            message_timeout: MESSAGE_TIMEOUT_DEFAULT,
            control_request_channel: CONTROL_REQUEST_CHANNEL_DEFAULT.to_string(),
            control_request_stream_id: CONTROL_REQUEST_STREAM_ID_DEFAULT,
            control_response_channel: CONTROL_RESPONSE_CHANNEL_DEFAULT.to_string(),
            control_response_stream_id: CONTROL_RESPONSE_STREAM_ID_DEFAULT,
            recording_events_channel: RECORDING_EVENTS_CHANNEL_DEFAULT.to_string(),
            recording_events_stream_id: RECORDING_EVENTS_STREAM_ID_DEFAULT,
            control_term_buffer_sparse: CONTROL_TERM_BUFFER_SPARSE_DEFAULT,
            control_term_buffer_length: CONTROL_TERM_BUFFER_LENGTH_DEFAULT,
            control_mtu_length: CONTROL_MTU_LENGTH_DEFAULT,
            error_handler: None,
        }
    }

    /// Set the timeout for sending a request or awaiting its response.
    #[must_use]
    pub fn message_timeout(mut self, timeout: Duration) -> Self {
        self.message_timeout = timeout;
        self
    }

    /// Set the control request channel.
    #[must_use]
    pub fn control_request_channel(mut self, channel: impl Into<String>) -> Self {
        self.control_request_channel = channel.into();
        self
    }

    /// Set the control request stream id.
    #[must_use]
    pub fn control_request_stream_id(mut self, stream_id: i32) -> Self {
        self.control_request_stream_id = stream_id;
        self
    }

    /// Set the control response channel.
    #[must_use]
    pub fn control_response_channel(mut self, channel: impl Into<String>) -> Self {
        self.control_response_channel = channel.into();
        self
    }

    /// Set the control response stream id.
    #[must_use]
    pub fn control_response_stream_id(mut self, stream_id: i32) -> Self {
        self.control_response_stream_id = stream_id;
        self
    }

    /// Set the recording events channel.
    #[must_use]
    pub fn recording_events_channel(mut self, channel: impl Into<String>) -> Self {
        self.recording_events_channel = channel.into();
        self
    }

    /// Set the recording events stream id.
    #[must_use]
    pub fn recording_events_stream_id(mut self, stream_id: i32) -> Self {
        self.recording_events_stream_id = stream_id;
        self
    }

    /// Set whether control term buffers are sparse.
    #[must_use]
    pub fn control_term_buffer_sparse(mut self, sparse: bool) -> Self {
        self.control_term_buffer_sparse = sparse;
        self
    }

    /// Set the control term buffer length.
    #[must_use]
    pub fn control_term_buffer_length(mut self, length: i32) -> Self {
        self.control_term_buffer_length = length;
        self
    }

    /// Set the control MTU.
    #[must_use]
    pub fn control_mtu_length(mut self, mtu: i32) -> Self {
        self.control_mtu_length = mtu;
        self
    }

    /// Set the asynchronous error handler.
    #[must_use]
    pub fn error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ArchiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveConfig")
            .field("message_timeout", &self.message_timeout)
            .field("control_request_channel", &self.control_request_channel)
            .field("control_request_stream_id", &self.control_request_stream_id)
            .field("control_response_channel", &self.control_response_channel)
            .field("control_response_stream_id", &self.control_response_stream_id)
            .field("recording_events_channel", &self.recording_events_channel)
            .field("recording_events_stream_id", &self.recording_events_stream_id)
            .field("control_term_buffer_sparse", &self.control_term_buffer_sparse)
            .field("control_term_buffer_length", &self.control_term_buffer_length)
            .field("control_mtu_length", &self.control_mtu_length)
            .field("error_handler", &self.error_handler.as_ref().map(|_| "<handler>"))
            .finish()
    }
}
