// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Control protocol constants - single source of truth for wire ids.
//!
//! Every message on the control channels is framed with an 8-byte header
//! carrying the block length, template id, schema id and version. The
//! schema id is one constant for the whole protocol; a mismatch on any
//! inbound frame is fatal. **Never hardcode these ids at use sites.**

pub mod codec;

/// Schema id shared by every control message.
pub const SCHEMA_ID: u16 = 101;

/// Schema version encoded in every header.
pub const SCHEMA_VERSION: u16 = 4;

/// Encoded length of the message header.
pub const MESSAGE_HEADER_LENGTH: usize = 8;

/// Template ids of the request/response/event message set.
pub mod template {
    pub const CONTROL_RESPONSE: u16 = 1;
    pub const CONNECT_REQUEST: u16 = 2;
    pub const CLOSE_SESSION_REQUEST: u16 = 3;
    pub const START_RECORDING_REQUEST: u16 = 4;
    pub const STOP_RECORDING_REQUEST: u16 = 5;
    pub const REPLAY_REQUEST: u16 = 6;
    pub const STOP_REPLAY_REQUEST: u16 = 7;
    pub const LIST_RECORDINGS_REQUEST: u16 = 8;
    pub const LIST_RECORDINGS_FOR_URI_REQUEST: u16 = 9;
    pub const LIST_RECORDING_REQUEST: u16 = 10;
    pub const EXTEND_RECORDING_REQUEST: u16 = 11;
    pub const RECORDING_POSITION_REQUEST: u16 = 12;
    pub const TRUNCATE_RECORDING_REQUEST: u16 = 13;
    pub const STOP_RECORDING_SUBSCRIPTION_REQUEST: u16 = 14;
    pub const STOP_POSITION_REQUEST: u16 = 15;
    pub const FIND_LAST_MATCHING_RECORDING_REQUEST: u16 = 16;
    pub const LIST_RECORDING_SUBSCRIPTIONS_REQUEST: u16 = 17;
    pub const BOUNDED_REPLAY_REQUEST: u16 = 18;
    pub const STOP_ALL_REPLAYS_REQUEST: u16 = 19;
    pub const RECORDING_DESCRIPTOR: u16 = 22;
    pub const RECORDING_SUBSCRIPTION_DESCRIPTOR: u16 = 23;
    pub const RECORDING_STARTED: u16 = 101;
    pub const RECORDING_PROGRESS: u16 = 102;
    pub const RECORDING_STOPPED: u16 = 103;
}

/// Code carried by a control response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlResponseCode {
    /// Request succeeded; `relevant_id` carries the result.
    Ok,
    /// Request failed; `relevant_id` carries an archive error code.
    Error,
    /// A recording listing ran past the last known recording.
    RecordingUnknown,
    /// A subscription listing ran past the last known subscription.
    SubscriptionUnknown,
    /// Code not set or not understood.
    NullVal,
}

impl ControlResponseCode {
    /// Decode from the wire value; unknown values map to `NullVal`.
    #[must_use]
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => ControlResponseCode::Ok,
            1 => ControlResponseCode::Error,
            2 => ControlResponseCode::RecordingUnknown,
            3 => ControlResponseCode::SubscriptionUnknown,
            _ => ControlResponseCode::NullVal,
        }
    }

    /// Wire value for the code.
    #[must_use]
    pub fn as_i32(&self) -> i32 {
        match self {
            ControlResponseCode::Ok => 0,
            ControlResponseCode::Error => 1,
            ControlResponseCode::RecordingUnknown => 2,
            ControlResponseCode::SubscriptionUnknown => 3,
            ControlResponseCode::NullVal => -1,
        }
    }
}

/// Where the archive should record a stream from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLocation {
    /// Record from the local media driver.
    Local,
    /// Record from the remote source across the network.
    Remote,
}

impl SourceLocation {
    /// Decode from the wire value.
    #[must_use]
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(SourceLocation::Local),
            1 => Some(SourceLocation::Remote),
            _ => None,
        }
    }

    /// Wire value for the location.
    #[must_use]
    pub fn as_i32(&self) -> i32 {
        match self {
            SourceLocation::Local => 0,
            SourceLocation::Remote => 1,
        }
    }
}
