// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire codec for the control protocol.
//!
//! Fixed little-endian framing, one message per transport fragment:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-------------------------------+-------------------------------+
//! |          blockLength          |          templateId           |
//! +-------------------------------+-------------------------------+
//! |           schemaId            |            version            |
//! +-------------------------------+-------------------------------+
//! |                     fixed block (blockLength)                 |
//! |                              ...                              |
//! +---------------------------------------------------------------+
//! |  var field: u32 length, UTF-8 bytes (repeated per var field)  |
//! +---------------------------------------------------------------+
//! ```
//!
//! Inbound frames decode into the tagged [`ControlMessage`] /
//! [`RequestMessage`] sums; there is one decode branch per known template
//! id and unknown templates are preserved as [`ControlMessage::Unknown`]
//! so pollers can skip them. Decoders honor the header's `blockLength` so
//! frames from a peer with a longer fixed block still parse.

use thiserror::Error;

use super::{template, ControlResponseCode, SourceLocation, MESSAGE_HEADER_LENGTH, SCHEMA_ID, SCHEMA_VERSION};

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while encoding or decoding control messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The encode target cannot hold the message.
    #[error("buffer too small: need {needed} bytes, have {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    /// The inbound frame ends before a field it must carry.
    #[error("frame truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// The inbound frame belongs to a different protocol.
    #[error("expected schema id {expected}, actual {actual}")]
    SchemaMismatch { expected: u16, actual: u16 },

    /// A variable-length field is not valid UTF-8.
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    /// An enum field carries a value outside its domain.
    #[error("invalid value {value} for {field}")]
    InvalidFieldValue { field: &'static str, value: i64 },
}

// Fixed-block lengths per template. Encode and decode must agree; the
// header carries the encoder's value so newer peers can extend blocks.
const CONNECT_BLOCK_LENGTH: u16 = 16;
const CLOSE_SESSION_BLOCK_LENGTH: u16 = 8;
const START_RECORDING_BLOCK_LENGTH: u16 = 24;
const STOP_RECORDING_BLOCK_LENGTH: u16 = 20;
const STOP_RECORDING_SUBSCRIPTION_BLOCK_LENGTH: u16 = 24;
const REPLAY_BLOCK_LENGTH: u16 = 44;
const BOUNDED_REPLAY_BLOCK_LENGTH: u16 = 48;
const STOP_REPLAY_BLOCK_LENGTH: u16 = 24;
const STOP_ALL_REPLAYS_BLOCK_LENGTH: u16 = 24;
const LIST_RECORDINGS_BLOCK_LENGTH: u16 = 28;
const LIST_RECORDINGS_FOR_URI_BLOCK_LENGTH: u16 = 32;
const LIST_RECORDING_BLOCK_LENGTH: u16 = 24;
const LIST_RECORDING_SUBSCRIPTIONS_BLOCK_LENGTH: u16 = 32;
const EXTEND_RECORDING_BLOCK_LENGTH: u16 = 32;
const RECORDING_POSITION_BLOCK_LENGTH: u16 = 24;
const STOP_POSITION_BLOCK_LENGTH: u16 = 24;
const TRUNCATE_RECORDING_BLOCK_LENGTH: u16 = 32;
const FIND_LAST_MATCHING_RECORDING_BLOCK_LENGTH: u16 = 32;
const CONTROL_RESPONSE_BLOCK_LENGTH: u16 = 28;
const RECORDING_DESCRIPTOR_BLOCK_LENGTH: u16 = 80;
const RECORDING_SUBSCRIPTION_DESCRIPTOR_BLOCK_LENGTH: u16 = 28;
const RECORDING_STARTED_BLOCK_LENGTH: u16 = 24;
const RECORDING_PROGRESS_BLOCK_LENGTH: u16 = 24;
const RECORDING_STOPPED_BLOCK_LENGTH: u16 = 24;

/// Frame header present on every control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub block_length: u16,
    pub template_id: u16,
    pub schema_id: u16,
    pub version: u16,
}

impl MessageHeader {
    /// Decode a header, verifying nothing but frame length.
    pub fn decode(frame: &[u8]) -> CodecResult<Self> {
        if frame.len() < MESSAGE_HEADER_LENGTH {
            return Err(CodecError::Truncated {
                needed: MESSAGE_HEADER_LENGTH,
                available: frame.len(),
            });
        }
        Ok(Self {
            block_length: u16::from_le_bytes([frame[0], frame[1]]),
            template_id: u16::from_le_bytes([frame[2], frame[3]]),
            schema_id: u16::from_le_bytes([frame[4], frame[5]]),
            version: u16::from_le_bytes([frame[6], frame[7]]),
        })
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

struct FrameWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> FrameWriter<'a> {
    fn start(buf: &'a mut [u8], template_id: u16, block_length: u16) -> CodecResult<Self> {
        let mut writer = Self { buf, pos: 0 };
        writer.put_u16(block_length)?;
        writer.put_u16(template_id)?;
        writer.put_u16(SCHEMA_ID)?;
        writer.put_u16(SCHEMA_VERSION)?;
        Ok(writer)
    }

    fn reserve(&mut self, len: usize) -> CodecResult<&mut [u8]> {
        let end = self.pos + len;
        if end > self.buf.len() {
            return Err(CodecError::BufferTooSmall {
                needed: end,
                capacity: self.buf.len(),
            });
        }
        let slice = &mut self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn put_u16(&mut self, value: u16) -> CodecResult<()> {
        self.reserve(2)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn put_i32(&mut self, value: i32) -> CodecResult<()> {
        self.reserve(4)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn put_i64(&mut self, value: i64) -> CodecResult<()> {
        self.reserve(8)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn put_var_str(&mut self, value: &str) -> CodecResult<()> {
        let bytes = value.as_bytes();
        self.reserve(4)?
            .copy_from_slice(&(bytes.len() as u32).to_le_bytes());
        self.reserve(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    fn finish(self) -> usize {
        self.pos
    }
}

/// Encode a connect request. The only request without a control session id.
pub fn encode_connect_request(
    buf: &mut [u8],
    correlation_id: i64,
    response_stream_id: i32,
    version: i32,
    response_channel: &str,
) -> CodecResult<usize> {
    let mut w = FrameWriter::start(buf, template::CONNECT_REQUEST, CONNECT_BLOCK_LENGTH)?;
    w.put_i64(correlation_id)?;
    w.put_i32(response_stream_id)?;
    w.put_i32(version)?;
    w.put_var_str(response_channel)?;
    Ok(w.finish())
}

/// Encode a close-session request.
pub fn encode_close_session_request(buf: &mut [u8], control_session_id: i64) -> CodecResult<usize> {
    let mut w = FrameWriter::start(buf, template::CLOSE_SESSION_REQUEST, CLOSE_SESSION_BLOCK_LENGTH)?;
    w.put_i64(control_session_id)?;
    Ok(w.finish())
}

/// Encode a start-recording request.
pub fn encode_start_recording_request(
    buf: &mut [u8],
    control_session_id: i64,
    correlation_id: i64,
    stream_id: i32,
    source_location: SourceLocation,
    channel: &str,
) -> CodecResult<usize> {
    let mut w = FrameWriter::start(buf, template::START_RECORDING_REQUEST, START_RECORDING_BLOCK_LENGTH)?;
    w.put_i64(control_session_id)?;
    w.put_i64(correlation_id)?;
    w.put_i32(stream_id)?;
    w.put_i32(source_location.as_i32())?;
    w.put_var_str(channel)?;
    Ok(w.finish())
}

/// Encode a stop-recording request for a channel/stream pairing.
pub fn encode_stop_recording_request(
    buf: &mut [u8],
    control_session_id: i64,
    correlation_id: i64,
    stream_id: i32,
    channel: &str,
) -> CodecResult<usize> {
    let mut w = FrameWriter::start(buf, template::STOP_RECORDING_REQUEST, STOP_RECORDING_BLOCK_LENGTH)?;
    w.put_i64(control_session_id)?;
    w.put_i64(correlation_id)?;
    w.put_i32(stream_id)?;
    w.put_var_str(channel)?;
    Ok(w.finish())
}

/// Encode a stop-recording request for a subscription id.
pub fn encode_stop_recording_subscription_request(
    buf: &mut [u8],
    control_session_id: i64,
    correlation_id: i64,
    subscription_id: i64,
) -> CodecResult<usize> {
    let mut w = FrameWriter::start(
        buf,
        template::STOP_RECORDING_SUBSCRIPTION_REQUEST,
        STOP_RECORDING_SUBSCRIPTION_BLOCK_LENGTH,
    )?;
    w.put_i64(control_session_id)?;
    w.put_i64(correlation_id)?;
    w.put_i64(subscription_id)?;
    Ok(w.finish())
}

/// Encode a replay request.
#[allow(clippy::too_many_arguments)]
pub fn encode_replay_request(
    buf: &mut [u8],
    control_session_id: i64,
    correlation_id: i64,
    recording_id: i64,
    position: i64,
    length: i64,
    replay_stream_id: i32,
    replay_channel: &str,
) -> CodecResult<usize> {
    let mut w = FrameWriter::start(buf, template::REPLAY_REQUEST, REPLAY_BLOCK_LENGTH)?;
    w.put_i64(control_session_id)?;
    w.put_i64(correlation_id)?;
    w.put_i64(recording_id)?;
    w.put_i64(position)?;
    w.put_i64(length)?;
    w.put_i32(replay_stream_id)?;
    w.put_var_str(replay_channel)?;
    Ok(w.finish())
}

/// Encode a bounded replay request; the limit counter bounds the replay.
#[allow(clippy::too_many_arguments)]
pub fn encode_bounded_replay_request(
    buf: &mut [u8],
    control_session_id: i64,
    correlation_id: i64,
    recording_id: i64,
    position: i64,
    length: i64,
    limit_counter_id: i32,
    replay_stream_id: i32,
    replay_channel: &str,
) -> CodecResult<usize> {
    let mut w = FrameWriter::start(buf, template::BOUNDED_REPLAY_REQUEST, BOUNDED_REPLAY_BLOCK_LENGTH)?;
    w.put_i64(control_session_id)?;
    w.put_i64(correlation_id)?;
    w.put_i64(recording_id)?;
    w.put_i64(position)?;
    w.put_i64(length)?;
    w.put_i32(limit_counter_id)?;
    w.put_i32(replay_stream_id)?;
    w.put_var_str(replay_channel)?;
    Ok(w.finish())
}

/// Encode a stop-replay request.
pub fn encode_stop_replay_request(
    buf: &mut [u8],
    control_session_id: i64,
    correlation_id: i64,
    replay_session_id: i64,
) -> CodecResult<usize> {
    let mut w = FrameWriter::start(buf, template::STOP_REPLAY_REQUEST, STOP_REPLAY_BLOCK_LENGTH)?;
    w.put_i64(control_session_id)?;
    w.put_i64(correlation_id)?;
    w.put_i64(replay_session_id)?;
    Ok(w.finish())
}

/// Encode a stop-all-replays request. A null recording id matches all.
pub fn encode_stop_all_replays_request(
    buf: &mut [u8],
    control_session_id: i64,
    correlation_id: i64,
    recording_id: i64,
) -> CodecResult<usize> {
    let mut w = FrameWriter::start(buf, template::STOP_ALL_REPLAYS_REQUEST, STOP_ALL_REPLAYS_BLOCK_LENGTH)?;
    w.put_i64(control_session_id)?;
    w.put_i64(correlation_id)?;
    w.put_i64(recording_id)?;
    Ok(w.finish())
}

/// Encode a list-recordings request.
pub fn encode_list_recordings_request(
    buf: &mut [u8],
    control_session_id: i64,
    correlation_id: i64,
    from_recording_id: i64,
    record_count: i32,
) -> CodecResult<usize> {
    let mut w = FrameWriter::start(buf, template::LIST_RECORDINGS_REQUEST, LIST_RECORDINGS_BLOCK_LENGTH)?;
    w.put_i64(control_session_id)?;
    w.put_i64(correlation_id)?;
    w.put_i64(from_recording_id)?;
    w.put_i32(record_count)?;
    Ok(w.finish())
}

/// Encode a list-recordings-for-uri request.
#[allow(clippy::too_many_arguments)]
pub fn encode_list_recordings_for_uri_request(
    buf: &mut [u8],
    control_session_id: i64,
    correlation_id: i64,
    from_recording_id: i64,
    record_count: i32,
    stream_id: i32,
    channel_fragment: &str,
) -> CodecResult<usize> {
    let mut w = FrameWriter::start(
        buf,
        template::LIST_RECORDINGS_FOR_URI_REQUEST,
        LIST_RECORDINGS_FOR_URI_BLOCK_LENGTH,
    )?;
    w.put_i64(control_session_id)?;
    w.put_i64(correlation_id)?;
    w.put_i64(from_recording_id)?;
    w.put_i32(record_count)?;
    w.put_i32(stream_id)?;
    w.put_var_str(channel_fragment)?;
    Ok(w.finish())
}

/// Encode a list-recording request for a single recording id.
pub fn encode_list_recording_request(
    buf: &mut [u8],
    control_session_id: i64,
    correlation_id: i64,
    recording_id: i64,
) -> CodecResult<usize> {
    let mut w = FrameWriter::start(buf, template::LIST_RECORDING_REQUEST, LIST_RECORDING_BLOCK_LENGTH)?;
    w.put_i64(control_session_id)?;
    w.put_i64(correlation_id)?;
    w.put_i64(recording_id)?;
    Ok(w.finish())
}

/// Encode a list-recording-subscriptions request.
#[allow(clippy::too_many_arguments)]
pub fn encode_list_recording_subscriptions_request(
    buf: &mut [u8],
    control_session_id: i64,
    correlation_id: i64,
    pseudo_index: i32,
    subscription_count: i32,
    apply_stream_id: bool,
    stream_id: i32,
    channel_fragment: &str,
) -> CodecResult<usize> {
    let mut w = FrameWriter::start(
        buf,
        template::LIST_RECORDING_SUBSCRIPTIONS_REQUEST,
        LIST_RECORDING_SUBSCRIPTIONS_BLOCK_LENGTH,
    )?;
    w.put_i64(control_session_id)?;
    w.put_i64(correlation_id)?;
    w.put_i32(pseudo_index)?;
    w.put_i32(subscription_count)?;
    w.put_i32(i32::from(apply_stream_id))?;
    w.put_i32(stream_id)?;
    w.put_var_str(channel_fragment)?;
    Ok(w.finish())
}

/// Encode an extend-recording request.
#[allow(clippy::too_many_arguments)]
pub fn encode_extend_recording_request(
    buf: &mut [u8],
    control_session_id: i64,
    correlation_id: i64,
    recording_id: i64,
    stream_id: i32,
    source_location: SourceLocation,
    channel: &str,
) -> CodecResult<usize> {
    let mut w = FrameWriter::start(buf, template::EXTEND_RECORDING_REQUEST, EXTEND_RECORDING_BLOCK_LENGTH)?;
    w.put_i64(control_session_id)?;
    w.put_i64(correlation_id)?;
    w.put_i64(recording_id)?;
    w.put_i32(stream_id)?;
    w.put_i32(source_location.as_i32())?;
    w.put_var_str(channel)?;
    Ok(w.finish())
}

/// Encode a recording-position request.
pub fn encode_recording_position_request(
    buf: &mut [u8],
    control_session_id: i64,
    correlation_id: i64,
    recording_id: i64,
) -> CodecResult<usize> {
    let mut w = FrameWriter::start(buf, template::RECORDING_POSITION_REQUEST, RECORDING_POSITION_BLOCK_LENGTH)?;
    w.put_i64(control_session_id)?;
    w.put_i64(correlation_id)?;
    w.put_i64(recording_id)?;
    Ok(w.finish())
}

/// Encode a stop-position request.
pub fn encode_stop_position_request(
    buf: &mut [u8],
    control_session_id: i64,
    correlation_id: i64,
    recording_id: i64,
) -> CodecResult<usize> {
    let mut w = FrameWriter::start(buf, template::STOP_POSITION_REQUEST, STOP_POSITION_BLOCK_LENGTH)?;
    w.put_i64(control_session_id)?;
    w.put_i64(correlation_id)?;
    w.put_i64(recording_id)?;
    Ok(w.finish())
}

/// Encode a truncate-recording request.
pub fn encode_truncate_recording_request(
    buf: &mut [u8],
    control_session_id: i64,
    correlation_id: i64,
    recording_id: i64,
    position: i64,
) -> CodecResult<usize> {
    let mut w = FrameWriter::start(buf, template::TRUNCATE_RECORDING_REQUEST, TRUNCATE_RECORDING_BLOCK_LENGTH)?;
    w.put_i64(control_session_id)?;
    w.put_i64(correlation_id)?;
    w.put_i64(recording_id)?;
    w.put_i64(position)?;
    Ok(w.finish())
}

/// Encode a find-last-matching-recording request.
#[allow(clippy::too_many_arguments)]
pub fn encode_find_last_matching_recording_request(
    buf: &mut [u8],
    control_session_id: i64,
    correlation_id: i64,
    min_recording_id: i64,
    session_id: i32,
    stream_id: i32,
    channel_fragment: &str,
) -> CodecResult<usize> {
    let mut w = FrameWriter::start(
        buf,
        template::FIND_LAST_MATCHING_RECORDING_REQUEST,
        FIND_LAST_MATCHING_RECORDING_BLOCK_LENGTH,
    )?;
    w.put_i64(control_session_id)?;
    w.put_i64(correlation_id)?;
    w.put_i64(min_recording_id)?;
    w.put_i32(session_id)?;
    w.put_i32(stream_id)?;
    w.put_var_str(channel_fragment)?;
    Ok(w.finish())
}

/// Encode a control response.
pub fn encode_control_response(
    buf: &mut [u8],
    control_session_id: i64,
    correlation_id: i64,
    relevant_id: i64,
    code: ControlResponseCode,
    error_message: &str,
) -> CodecResult<usize> {
    let mut w = FrameWriter::start(buf, template::CONTROL_RESPONSE, CONTROL_RESPONSE_BLOCK_LENGTH)?;
    w.put_i64(control_session_id)?;
    w.put_i64(correlation_id)?;
    w.put_i64(relevant_id)?;
    w.put_i32(code.as_i32())?;
    w.put_var_str(error_message)?;
    Ok(w.finish())
}

/// Encode a recording descriptor.
pub fn encode_recording_descriptor(buf: &mut [u8], descriptor: &RecordingDescriptor) -> CodecResult<usize> {
    let mut w = FrameWriter::start(buf, template::RECORDING_DESCRIPTOR, RECORDING_DESCRIPTOR_BLOCK_LENGTH)?;
    w.put_i64(descriptor.control_session_id)?;
    w.put_i64(descriptor.correlation_id)?;
    w.put_i64(descriptor.recording_id)?;
    w.put_i64(descriptor.start_timestamp)?;
    w.put_i64(descriptor.stop_timestamp)?;
    w.put_i64(descriptor.start_position)?;
    w.put_i64(descriptor.stop_position)?;
    w.put_i32(descriptor.initial_term_id)?;
    w.put_i32(descriptor.segment_file_length)?;
    w.put_i32(descriptor.term_buffer_length)?;
    w.put_i32(descriptor.mtu_length)?;
    w.put_i32(descriptor.session_id)?;
    w.put_i32(descriptor.stream_id)?;
    w.put_var_str(&descriptor.stripped_channel)?;
    w.put_var_str(&descriptor.original_channel)?;
    w.put_var_str(&descriptor.source_identity)?;
    Ok(w.finish())
}

/// Encode a recording-subscription descriptor.
pub fn encode_recording_subscription_descriptor(
    buf: &mut [u8],
    descriptor: &RecordingSubscriptionDescriptor,
) -> CodecResult<usize> {
    let mut w = FrameWriter::start(
        buf,
        template::RECORDING_SUBSCRIPTION_DESCRIPTOR,
        RECORDING_SUBSCRIPTION_DESCRIPTOR_BLOCK_LENGTH,
    )?;
    w.put_i64(descriptor.control_session_id)?;
    w.put_i64(descriptor.correlation_id)?;
    w.put_i64(descriptor.subscription_id)?;
    w.put_i32(descriptor.stream_id)?;
    w.put_var_str(&descriptor.stripped_channel)?;
    Ok(w.finish())
}

/// Encode a recording-started event.
pub fn encode_recording_started(buf: &mut [u8], event: &RecordingStarted) -> CodecResult<usize> {
    let mut w = FrameWriter::start(buf, template::RECORDING_STARTED, RECORDING_STARTED_BLOCK_LENGTH)?;
    w.put_i64(event.recording_id)?;
    w.put_i64(event.start_position)?;
    w.put_i32(event.session_id)?;
    w.put_i32(event.stream_id)?;
    w.put_var_str(&event.channel)?;
    w.put_var_str(&event.source_identity)?;
    Ok(w.finish())
}

/// Encode a recording-progress event.
pub fn encode_recording_progress(buf: &mut [u8], event: &RecordingProgress) -> CodecResult<usize> {
    let mut w = FrameWriter::start(buf, template::RECORDING_PROGRESS, RECORDING_PROGRESS_BLOCK_LENGTH)?;
    w.put_i64(event.recording_id)?;
    w.put_i64(event.start_position)?;
    w.put_i64(event.position)?;
    Ok(w.finish())
}

/// Encode a recording-stopped event.
pub fn encode_recording_stopped(buf: &mut [u8], event: &RecordingStopped) -> CodecResult<usize> {
    let mut w = FrameWriter::start(buf, template::RECORDING_STOPPED, RECORDING_STOPPED_BLOCK_LENGTH)?;
    w.put_i64(event.recording_id)?;
    w.put_i64(event.start_position)?;
    w.put_i64(event.stop_position)?;
    Ok(w.finish())
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self.pos + len;
        if end > self.buf.len() {
            return Err(CodecError::Truncated {
                needed: end,
                available: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn i32(&mut self) -> CodecResult<i32> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn i64(&mut self) -> CodecResult<i64> {
        let bytes = self.take(8)?;
        Ok(i64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    /// Jump to the end of the fixed block before reading var fields, so
    /// frames with a longer block than ours still parse.
    fn skip_to(&mut self, offset: usize) -> CodecResult<()> {
        if offset > self.buf.len() {
            return Err(CodecError::Truncated {
                needed: offset,
                available: self.buf.len(),
            });
        }
        self.pos = self.pos.max(offset);
        Ok(())
    }

    fn var_str(&mut self, field: &'static str) -> CodecResult<String> {
        let len_bytes = self.take(4)?;
        let len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8 { field })
    }
}

/// A decoded control response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlResponse {
    pub control_session_id: i64,
    pub correlation_id: i64,
    pub relevant_id: i64,
    pub code: ControlResponseCode,
    pub error_message: String,
}

/// One record of a recording listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingDescriptor {
    pub control_session_id: i64,
    pub correlation_id: i64,
    pub recording_id: i64,
    pub start_timestamp: i64,
    pub stop_timestamp: i64,
    pub start_position: i64,
    pub stop_position: i64,
    pub initial_term_id: i32,
    pub segment_file_length: i32,
    pub term_buffer_length: i32,
    pub mtu_length: i32,
    pub session_id: i32,
    pub stream_id: i32,
    pub stripped_channel: String,
    pub original_channel: String,
    pub source_identity: String,
}

/// One record of a recording-subscription listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSubscriptionDescriptor {
    pub control_session_id: i64,
    pub correlation_id: i64,
    pub subscription_id: i64,
    pub stream_id: i32,
    pub stripped_channel: String,
}

/// Event: a recording has started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingStarted {
    pub recording_id: i64,
    pub start_position: i64,
    pub session_id: i32,
    pub stream_id: i32,
    pub channel: String,
    pub source_identity: String,
}

/// Event: progress of an active recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingProgress {
    pub recording_id: i64,
    pub start_position: i64,
    pub position: i64,
}

/// Event: a recording has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingStopped {
    pub recording_id: i64,
    pub start_position: i64,
    pub stop_position: i64,
}

/// Tagged sum of the inbound message set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    Response(ControlResponse),
    RecordingDescriptor(RecordingDescriptor),
    RecordingSubscriptionDescriptor(RecordingSubscriptionDescriptor),
    RecordingStarted(RecordingStarted),
    RecordingProgress(RecordingProgress),
    RecordingStopped(RecordingStopped),
    /// A template this client does not know. Skipped by pollers.
    Unknown { template_id: u16 },
}

impl ControlMessage {
    /// Template id the frame carried.
    #[must_use]
    pub fn template_id(&self) -> u16 {
        match self {
            ControlMessage::Response(_) => template::CONTROL_RESPONSE,
            ControlMessage::RecordingDescriptor(_) => template::RECORDING_DESCRIPTOR,
            ControlMessage::RecordingSubscriptionDescriptor(_) => {
                template::RECORDING_SUBSCRIPTION_DESCRIPTOR
            }
            ControlMessage::RecordingStarted(_) => template::RECORDING_STARTED,
            ControlMessage::RecordingProgress(_) => template::RECORDING_PROGRESS,
            ControlMessage::RecordingStopped(_) => template::RECORDING_STOPPED,
            ControlMessage::Unknown { template_id } => *template_id,
        }
    }
}

/// Decode one inbound frame into the tagged message sum.
///
/// The schema id is verified here; every poller treats a mismatch as fatal.
pub fn decode_control_message(frame: &[u8]) -> CodecResult<ControlMessage> {
    let header = MessageHeader::decode(frame)?;
    if header.schema_id != SCHEMA_ID {
        return Err(CodecError::SchemaMismatch {
            expected: SCHEMA_ID,
            actual: header.schema_id,
        });
    }

    let body = &frame[MESSAGE_HEADER_LENGTH..];
    let block = header.block_length as usize;
    let mut r = FrameReader::new(body);

    match header.template_id {
        template::CONTROL_RESPONSE => {
            let control_session_id = r.i64()?;
            let correlation_id = r.i64()?;
            let relevant_id = r.i64()?;
            let code = ControlResponseCode::from_i32(r.i32()?);
            r.skip_to(block)?;
            let error_message = r.var_str("error message")?;
            Ok(ControlMessage::Response(ControlResponse {
                control_session_id,
                correlation_id,
                relevant_id,
                code,
                error_message,
            }))
        }
        template::RECORDING_DESCRIPTOR => {
            let control_session_id = r.i64()?;
            let correlation_id = r.i64()?;
            let recording_id = r.i64()?;
            let start_timestamp = r.i64()?;
            let stop_timestamp = r.i64()?;
            let start_position = r.i64()?;
            let stop_position = r.i64()?;
            let initial_term_id = r.i32()?;
            let segment_file_length = r.i32()?;
            let term_buffer_length = r.i32()?;
            let mtu_length = r.i32()?;
            let session_id = r.i32()?;
            let stream_id = r.i32()?;
            r.skip_to(block)?;
            let stripped_channel = r.var_str("stripped channel")?;
            let original_channel = r.var_str("original channel")?;
            let source_identity = r.var_str("source identity")?;
            Ok(ControlMessage::RecordingDescriptor(RecordingDescriptor {
                control_session_id,
                correlation_id,
                recording_id,
                start_timestamp,
                stop_timestamp,
                start_position,
                stop_position,
                initial_term_id,
                segment_file_length,
                term_buffer_length,
                mtu_length,
                session_id,
                stream_id,
                stripped_channel,
                original_channel,
                source_identity,
            }))
        }
        template::RECORDING_SUBSCRIPTION_DESCRIPTOR => {
            let control_session_id = r.i64()?;
            let correlation_id = r.i64()?;
            let subscription_id = r.i64()?;
            let stream_id = r.i32()?;
            r.skip_to(block)?;
            let stripped_channel = r.var_str("stripped channel")?;
            Ok(ControlMessage::RecordingSubscriptionDescriptor(
                RecordingSubscriptionDescriptor {
                    control_session_id,
                    correlation_id,
                    subscription_id,
                    stream_id,
                    stripped_channel,
                },
            ))
        }
        template::RECORDING_STARTED => {
            let recording_id = r.i64()?;
            let start_position = r.i64()?;
            let session_id = r.i32()?;
            let stream_id = r.i32()?;
            r.skip_to(block)?;
            let channel = r.var_str("channel")?;
            let source_identity = r.var_str("source identity")?;
            Ok(ControlMessage::RecordingStarted(RecordingStarted {
                recording_id,
                start_position,
                session_id,
                stream_id,
                channel,
                source_identity,
            }))
        }
        template::RECORDING_PROGRESS => {
            let recording_id = r.i64()?;
            let start_position = r.i64()?;
            let position = r.i64()?;
            Ok(ControlMessage::RecordingProgress(RecordingProgress {
                recording_id,
                start_position,
                position,
            }))
        }
        template::RECORDING_STOPPED => {
            let recording_id = r.i64()?;
            let start_position = r.i64()?;
            let stop_position = r.i64()?;
            Ok(ControlMessage::RecordingStopped(RecordingStopped {
                recording_id,
                start_position,
                stop_position,
            }))
        }
        template_id => Ok(ControlMessage::Unknown { template_id }),
    }
}

/// Tagged sum of the request message set, for the receiving side of the
/// control-request channel (test doubles, tooling).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestMessage {
    Connect {
        correlation_id: i64,
        response_stream_id: i32,
        version: i32,
        response_channel: String,
    },
    CloseSession {
        control_session_id: i64,
    },
    StartRecording {
        control_session_id: i64,
        correlation_id: i64,
        stream_id: i32,
        source_location: SourceLocation,
        channel: String,
    },
    StopRecording {
        control_session_id: i64,
        correlation_id: i64,
        stream_id: i32,
        channel: String,
    },
    StopRecordingSubscription {
        control_session_id: i64,
        correlation_id: i64,
        subscription_id: i64,
    },
    Replay {
        control_session_id: i64,
        correlation_id: i64,
        recording_id: i64,
        position: i64,
        length: i64,
        replay_stream_id: i32,
        replay_channel: String,
    },
    BoundedReplay {
        control_session_id: i64,
        correlation_id: i64,
        recording_id: i64,
        position: i64,
        length: i64,
        limit_counter_id: i32,
        replay_stream_id: i32,
        replay_channel: String,
    },
    StopReplay {
        control_session_id: i64,
        correlation_id: i64,
        replay_session_id: i64,
    },
    StopAllReplays {
        control_session_id: i64,
        correlation_id: i64,
        recording_id: i64,
    },
    ListRecordings {
        control_session_id: i64,
        correlation_id: i64,
        from_recording_id: i64,
        record_count: i32,
    },
    ListRecordingsForUri {
        control_session_id: i64,
        correlation_id: i64,
        from_recording_id: i64,
        record_count: i32,
        stream_id: i32,
        channel_fragment: String,
    },
    ListRecording {
        control_session_id: i64,
        correlation_id: i64,
        recording_id: i64,
    },
    ListRecordingSubscriptions {
        control_session_id: i64,
        correlation_id: i64,
        pseudo_index: i32,
        subscription_count: i32,
        apply_stream_id: bool,
        stream_id: i32,
        channel_fragment: String,
    },
    ExtendRecording {
        control_session_id: i64,
        correlation_id: i64,
        recording_id: i64,
        stream_id: i32,
        source_location: SourceLocation,
        channel: String,
    },
    RecordingPosition {
        control_session_id: i64,
        correlation_id: i64,
        recording_id: i64,
    },
    StopPosition {
        control_session_id: i64,
        correlation_id: i64,
        recording_id: i64,
    },
    TruncateRecording {
        control_session_id: i64,
        correlation_id: i64,
        recording_id: i64,
        position: i64,
    },
    FindLastMatchingRecording {
        control_session_id: i64,
        correlation_id: i64,
        min_recording_id: i64,
        session_id: i32,
        stream_id: i32,
        channel_fragment: String,
    },
    /// A template this decoder does not know.
    Unknown {
        template_id: u16,
    },
}

impl RequestMessage {
    /// Correlation id of the request, if the template carries one.
    #[must_use]
    pub fn correlation_id(&self) -> Option<i64> {
        match self {
            RequestMessage::Connect { correlation_id, .. }
            | RequestMessage::StartRecording { correlation_id, .. }
            | RequestMessage::StopRecording { correlation_id, .. }
            | RequestMessage::StopRecordingSubscription { correlation_id, .. }
            | RequestMessage::Replay { correlation_id, .. }
            | RequestMessage::BoundedReplay { correlation_id, .. }
            | RequestMessage::StopReplay { correlation_id, .. }
            | RequestMessage::StopAllReplays { correlation_id, .. }
            | RequestMessage::ListRecordings { correlation_id, .. }
            | RequestMessage::ListRecordingsForUri { correlation_id, .. }
            | RequestMessage::ListRecording { correlation_id, .. }
            | RequestMessage::ListRecordingSubscriptions { correlation_id, .. }
            | RequestMessage::ExtendRecording { correlation_id, .. }
            | RequestMessage::RecordingPosition { correlation_id, .. }
            | RequestMessage::StopPosition { correlation_id, .. }
            | RequestMessage::TruncateRecording { correlation_id, .. }
            | RequestMessage::FindLastMatchingRecording { correlation_id, .. } => {
                Some(*correlation_id)
            }
            RequestMessage::CloseSession { .. } | RequestMessage::Unknown { .. } => None,
        }
    }
}

fn source_location(value: i32) -> CodecResult<SourceLocation> {
    SourceLocation::from_i32(value).ok_or(CodecError::InvalidFieldValue {
        field: "source location",
        value: i64::from(value),
    })
}

/// Decode one frame from the control-request channel.
pub fn decode_request(frame: &[u8]) -> CodecResult<RequestMessage> {
    let header = MessageHeader::decode(frame)?;
    if header.schema_id != SCHEMA_ID {
        return Err(CodecError::SchemaMismatch {
            expected: SCHEMA_ID,
            actual: header.schema_id,
        });
    }

    let body = &frame[MESSAGE_HEADER_LENGTH..];
    let block = header.block_length as usize;
    let mut r = FrameReader::new(body);

    match header.template_id {
        template::CONNECT_REQUEST => {
            let correlation_id = r.i64()?;
            let response_stream_id = r.i32()?;
            let version = r.i32()?;
            r.skip_to(block)?;
            let response_channel = r.var_str("response channel")?;
            Ok(RequestMessage::Connect {
                correlation_id,
                response_stream_id,
                version,
                response_channel,
            })
        }
        template::CLOSE_SESSION_REQUEST => Ok(RequestMessage::CloseSession {
            control_session_id: r.i64()?,
        }),
        template::START_RECORDING_REQUEST => {
            let control_session_id = r.i64()?;
            let correlation_id = r.i64()?;
            let stream_id = r.i32()?;
            let location = source_location(r.i32()?)?;
            r.skip_to(block)?;
            let channel = r.var_str("channel")?;
            Ok(RequestMessage::StartRecording {
                control_session_id,
                correlation_id,
                stream_id,
                source_location: location,
                channel,
            })
        }
        template::STOP_RECORDING_REQUEST => {
            let control_session_id = r.i64()?;
            let correlation_id = r.i64()?;
            let stream_id = r.i32()?;
            r.skip_to(block)?;
            let channel = r.var_str("channel")?;
            Ok(RequestMessage::StopRecording {
                control_session_id,
                correlation_id,
                stream_id,
                channel,
            })
        }
        template::STOP_RECORDING_SUBSCRIPTION_REQUEST => Ok(RequestMessage::StopRecordingSubscription {
            control_session_id: r.i64()?,
            correlation_id: r.i64()?,
            subscription_id: r.i64()?,
        }),
        template::REPLAY_REQUEST => {
            let control_session_id = r.i64()?;
            let correlation_id = r.i64()?;
            let recording_id = r.i64()?;
            let position = r.i64()?;
            let length = r.i64()?;
            let replay_stream_id = r.i32()?;
            r.skip_to(block)?;
            let replay_channel = r.var_str("replay channel")?;
            Ok(RequestMessage::Replay {
                control_session_id,
                correlation_id,
                recording_id,
                position,
                length,
                replay_stream_id,
                replay_channel,
            })
        }
        template::BOUNDED_REPLAY_REQUEST => {
            let control_session_id = r.i64()?;
            let correlation_id = r.i64()?;
            let recording_id = r.i64()?;
            let position = r.i64()?;
            let length = r.i64()?;
            let limit_counter_id = r.i32()?;
            let replay_stream_id = r.i32()?;
            r.skip_to(block)?;
            let replay_channel = r.var_str("replay channel")?;
            Ok(RequestMessage::BoundedReplay {
                control_session_id,
                correlation_id,
                recording_id,
                position,
                length,
                limit_counter_id,
                replay_stream_id,
                replay_channel,
            })
        }
        template::STOP_REPLAY_REQUEST => Ok(RequestMessage::StopReplay {
            control_session_id: r.i64()?,
            correlation_id: r.i64()?,
            replay_session_id: r.i64()?,
        }),
        template::STOP_ALL_REPLAYS_REQUEST => Ok(RequestMessage::StopAllReplays {
            control_session_id: r.i64()?,
            correlation_id: r.i64()?,
            recording_id: r.i64()?,
        }),
        template::LIST_RECORDINGS_REQUEST => Ok(RequestMessage::ListRecordings {
            control_session_id: r.i64()?,
            correlation_id: r.i64()?,
            from_recording_id: r.i64()?,
            record_count: r.i32()?,
        }),
        template::LIST_RECORDINGS_FOR_URI_REQUEST => {
            let control_session_id = r.i64()?;
            let correlation_id = r.i64()?;
            let from_recording_id = r.i64()?;
            let record_count = r.i32()?;
            let stream_id = r.i32()?;
            r.skip_to(block)?;
            let channel_fragment = r.var_str("channel fragment")?;
            Ok(RequestMessage::ListRecordingsForUri {
                control_session_id,
                correlation_id,
                from_recording_id,
                record_count,
                stream_id,
                channel_fragment,
            })
        }
        template::LIST_RECORDING_REQUEST => Ok(RequestMessage::ListRecording {
            control_session_id: r.i64()?,
            correlation_id: r.i64()?,
            recording_id: r.i64()?,
        }),
        template::LIST_RECORDING_SUBSCRIPTIONS_REQUEST => {
            let control_session_id = r.i64()?;
            let correlation_id = r.i64()?;
            let pseudo_index = r.i32()?;
            let subscription_count = r.i32()?;
            let apply_stream_id = r.i32()? != 0;
            let stream_id = r.i32()?;
            r.skip_to(block)?;
            let channel_fragment = r.var_str("channel fragment")?;
            Ok(RequestMessage::ListRecordingSubscriptions {
                control_session_id,
                correlation_id,
                pseudo_index,
                subscription_count,
                apply_stream_id,
                stream_id,
                channel_fragment,
            })
        }
        template::EXTEND_RECORDING_REQUEST => {
            let control_session_id = r.i64()?;
            let correlation_id = r.i64()?;
            let recording_id = r.i64()?;
            let stream_id = r.i32()?;
            let location = source_location(r.i32()?)?;
            r.skip_to(block)?;
            let channel = r.var_str("channel")?;
            Ok(RequestMessage::ExtendRecording {
                control_session_id,
                correlation_id,
                recording_id,
                stream_id,
                source_location: location,
                channel,
            })
        }
        template::RECORDING_POSITION_REQUEST => Ok(RequestMessage::RecordingPosition {
            control_session_id: r.i64()?,
            correlation_id: r.i64()?,
            recording_id: r.i64()?,
        }),
        template::STOP_POSITION_REQUEST => Ok(RequestMessage::StopPosition {
            control_session_id: r.i64()?,
            correlation_id: r.i64()?,
            recording_id: r.i64()?,
        }),
        template::TRUNCATE_RECORDING_REQUEST => Ok(RequestMessage::TruncateRecording {
            control_session_id: r.i64()?,
            correlation_id: r.i64()?,
            recording_id: r.i64()?,
            position: r.i64()?,
        }),
        template::FIND_LAST_MATCHING_RECORDING_REQUEST => {
            let control_session_id = r.i64()?;
            let correlation_id = r.i64()?;
            let min_recording_id = r.i64()?;
            let session_id = r.i32()?;
            let stream_id = r.i32()?;
            r.skip_to(block)?;
            let channel_fragment = r.var_str("channel fragment")?;
            Ok(RequestMessage::FindLastMatchingRecording {
                control_session_id,
                correlation_id,
                min_recording_id,
                session_id,
                stream_id,
                channel_fragment,
            })
        }
        template_id => Ok(RequestMessage::Unknown { template_id }),
    }
}
