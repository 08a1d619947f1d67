// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Archive client errors.

use std::sync::Arc;

use thiserror::Error;

use crate::protocol::codec::CodecError;
use crate::protocol::ControlResponseCode;

/// Detail code carried by an error-coded control response.
///
/// Transported as the `relevant_id` of the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveErrorCode {
    Generic,
    ActiveListing,
    ActiveRecording,
    ActiveSubscription,
    UnknownSubscription,
    UnknownRecording,
    UnknownReplay,
    MaxReplays,
    MaxRecordings,
    InvalidExtension,
}

impl ArchiveErrorCode {
    /// Decode from a response `relevant_id`. Unknown values map to
    /// `Generic` so a newer archive cannot wedge an older client.
    #[must_use]
    pub fn from_relevant_id(relevant_id: i64) -> Self {
        match relevant_id {
            1 => ArchiveErrorCode::ActiveListing,
            2 => ArchiveErrorCode::ActiveRecording,
            3 => ArchiveErrorCode::ActiveSubscription,
            4 => ArchiveErrorCode::UnknownSubscription,
            5 => ArchiveErrorCode::UnknownRecording,
            6 => ArchiveErrorCode::UnknownReplay,
            7 => ArchiveErrorCode::MaxReplays,
            8 => ArchiveErrorCode::MaxRecordings,
            9 => ArchiveErrorCode::InvalidExtension,
            _ => ArchiveErrorCode::Generic,
        }
    }

    /// Wire value for the code.
    #[must_use]
    pub fn as_relevant_id(&self) -> i64 {
        match self {
            ArchiveErrorCode::Generic => 0,
            ArchiveErrorCode::ActiveListing => 1,
            ArchiveErrorCode::ActiveRecording => 2,
            ArchiveErrorCode::ActiveSubscription => 3,
            ArchiveErrorCode::UnknownSubscription => 4,
            ArchiveErrorCode::UnknownRecording => 5,
            ArchiveErrorCode::UnknownReplay => 6,
            ArchiveErrorCode::MaxReplays => 7,
            ArchiveErrorCode::MaxRecordings => 8,
            ArchiveErrorCode::InvalidExtension => 9,
        }
    }
}

/// Errors surfaced by the archive client.
#[derive(Debug, Clone, Error)]
pub enum ArchiveError {
    /// The archive answered with an error-coded control response.
    #[error("archive error: {message} (code {code:?})")]
    Response {
        code: ArchiveErrorCode,
        message: String,
    },

    /// A deadline expired while awaiting a response or descriptors.
    #[error("timed out {0}")]
    Timeout(String),

    /// The control-request publication has no connected subscriber.
    #[error("connection to the archive is no longer available")]
    NotConnected,

    /// The control-request publication has been closed.
    #[error("connection to the archive has been closed")]
    PublicationClosed,

    /// The control-request publication reached its maximum position.
    #[error("offer failed due to max position being reached")]
    MaxPositionExceeded,

    /// The control-response subscription lost its connection mid-wait.
    #[error("subscription to archive is not connected")]
    ResponseChannelDisconnected,

    /// A matching correlation id answered with a code that is neither OK
    /// nor an error.
    #[error("unexpected response code: {0:?}")]
    UnexpectedResponseCode(ControlResponseCode),

    /// A request could not be offered within the retry budget.
    #[error("failed to send {0} request")]
    SendFailed(&'static str),

    /// A precondition on the caller's arguments does not hold.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Wire-format violation (schema mismatch, truncated frame, scratch
    /// buffer overflow).
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A channel URI could not be parsed.
    #[error(transparent)]
    ChannelUri(#[from] strata_transport::ChannelUriError),
}

/// Shared result alias for the crate.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Handler for errors the archive reports outside the awaited
/// request/response window.
pub type ErrorHandler = Arc<dyn Fn(&ArchiveError) + Send + Sync>;
