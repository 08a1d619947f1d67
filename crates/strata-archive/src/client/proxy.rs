// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request proxy - the single writer on the control-request publication.
//!
//! One method per request template. Each encodes the frame into a fixed
//! scratch buffer and offers exactly those bytes as one message. The buffer
//! holds one message at a time; the proxy is move-only and never shared,
//! so the session mutex is the only serialization needed above it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use strata_transport::{Driver, IdleStrategy, OfferOutcome, Publication};

use crate::config::CLIENT_SEMANTIC_VERSION;
use crate::error::{ArchiveError, Result};
use crate::protocol::codec;
use crate::protocol::SourceLocation;

/// Scratch buffer length. Sized for typical control URIs; raise it if your
/// channels carry unusually long parameter lists.
pub const SCRATCH_BUFFER_LENGTH: usize = 256;

/// Offer attempts per request before giving up on back-pressure.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Encoder and single writer for control requests.
pub struct ArchiveProxy {
    publication: Arc<dyn Publication>,
    conductor: Option<Arc<dyn Driver>>,
    buffer: [u8; SCRATCH_BUFFER_LENGTH],
    connect_timeout: Duration,
    retry_attempts: u32,
    idle: IdleStrategy,
}

impl ArchiveProxy {
    /// Create a proxy over an exclusive control-request publication.
    ///
    /// `conductor`, when given, is re-entered once per idle step so an
    /// agent-invoker transport keeps making progress during offer retries.
    pub fn new(
        publication: Arc<dyn Publication>,
        conductor: Option<Arc<dyn Driver>>,
        connect_timeout: Duration,
        retry_attempts: u32,
    ) -> Self {
        Self {
            publication,
            conductor,
            buffer: [0u8; SCRATCH_BUFFER_LENGTH],
            connect_timeout,
            retry_attempts: retry_attempts.max(1),
            idle: IdleStrategy::Yielding,
        }
    }

    /// The publication requests are offered to.
    #[must_use]
    pub fn publication(&self) -> &Arc<dyn Publication> {
        &self.publication
    }

    /// Connect to an archive, retrying offers until the connect timeout.
    pub fn connect(
        &mut self,
        response_channel: &str,
        response_stream_id: i32,
        correlation_id: i64,
    ) -> Result<bool> {
        let length = codec::encode_connect_request(
            &mut self.buffer,
            correlation_id,
            response_stream_id,
            CLIENT_SEMANTIC_VERSION,
            response_channel,
        )?;
        self.offer_with_timeout(length, false)
    }

    /// [`ArchiveProxy::connect`], re-entering the conductor between offers.
    pub fn connect_with_invoker(
        &mut self,
        response_channel: &str,
        response_stream_id: i32,
        correlation_id: i64,
    ) -> Result<bool> {
        let length = codec::encode_connect_request(
            &mut self.buffer,
            correlation_id,
            response_stream_id,
            CLIENT_SEMANTIC_VERSION,
            response_channel,
        )?;
        self.offer_with_timeout(length, true)
    }

    /// Connect with a single offer attempt. Success iff the transport
    /// accepted the message.
    pub fn try_connect(
        &mut self,
        response_channel: &str,
        response_stream_id: i32,
        correlation_id: i64,
    ) -> Result<bool> {
        let length = codec::encode_connect_request(
            &mut self.buffer,
            correlation_id,
            response_stream_id,
            CLIENT_SEMANTIC_VERSION,
            response_channel,
        )?;
        Ok(self.publication.offer(&self.buffer[..length]).is_accepted())
    }

    /// Close a control session. Best-effort: callers ignore a false return.
    pub fn close_session(&mut self, control_session_id: i64) -> Result<bool> {
        let length = codec::encode_close_session_request(&mut self.buffer, control_session_id)?;
        self.offer(length)
    }

    /// Request recording of a channel/stream pairing.
    pub fn start_recording(
        &mut self,
        channel: &str,
        stream_id: i32,
        source_location: SourceLocation,
        correlation_id: i64,
        control_session_id: i64,
    ) -> Result<bool> {
        let length = codec::encode_start_recording_request(
            &mut self.buffer,
            control_session_id,
            correlation_id,
            stream_id,
            source_location,
            channel,
        )?;
        self.offer(length)
    }

    /// Request that recording stop for a channel/stream pairing.
    pub fn stop_recording(
        &mut self,
        channel: &str,
        stream_id: i32,
        correlation_id: i64,
        control_session_id: i64,
    ) -> Result<bool> {
        let length = codec::encode_stop_recording_request(
            &mut self.buffer,
            control_session_id,
            correlation_id,
            stream_id,
            channel,
        )?;
        self.offer(length)
    }

    /// Request that recording stop for a subscription id.
    pub fn stop_recording_subscription(
        &mut self,
        subscription_id: i64,
        correlation_id: i64,
        control_session_id: i64,
    ) -> Result<bool> {
        let length = codec::encode_stop_recording_subscription_request(
            &mut self.buffer,
            control_session_id,
            correlation_id,
            subscription_id,
        )?;
        self.offer(length)
    }

    /// Request extension of an existing, stopped recording.
    pub fn extend_recording(
        &mut self,
        channel: &str,
        stream_id: i32,
        source_location: SourceLocation,
        recording_id: i64,
        correlation_id: i64,
        control_session_id: i64,
    ) -> Result<bool> {
        let length = codec::encode_extend_recording_request(
            &mut self.buffer,
            control_session_id,
            correlation_id,
            recording_id,
            stream_id,
            source_location,
            channel,
        )?;
        self.offer(length)
    }

    /// Request a replay of a recording.
    #[allow(clippy::too_many_arguments)]
    pub fn replay(
        &mut self,
        recording_id: i64,
        position: i64,
        length: i64,
        replay_channel: &str,
        replay_stream_id: i32,
        correlation_id: i64,
        control_session_id: i64,
    ) -> Result<bool> {
        let frame_length = codec::encode_replay_request(
            &mut self.buffer,
            control_session_id,
            correlation_id,
            recording_id,
            position,
            length,
            replay_stream_id,
            replay_channel,
        )?;
        self.offer(frame_length)
    }

    /// Request a replay bounded by a limit counter.
    #[allow(clippy::too_many_arguments)]
    pub fn bounded_replay(
        &mut self,
        recording_id: i64,
        position: i64,
        length: i64,
        limit_counter_id: i32,
        replay_channel: &str,
        replay_stream_id: i32,
        correlation_id: i64,
        control_session_id: i64,
    ) -> Result<bool> {
        let frame_length = codec::encode_bounded_replay_request(
            &mut self.buffer,
            control_session_id,
            correlation_id,
            recording_id,
            position,
            length,
            limit_counter_id,
            replay_stream_id,
            replay_channel,
        )?;
        self.offer(frame_length)
    }

    /// Request that a replay session stop.
    pub fn stop_replay(
        &mut self,
        replay_session_id: i64,
        correlation_id: i64,
        control_session_id: i64,
    ) -> Result<bool> {
        let length = codec::encode_stop_replay_request(
            &mut self.buffer,
            control_session_id,
            correlation_id,
            replay_session_id,
        )?;
        self.offer(length)
    }

    /// Request that all replays for a recording stop. A null recording id
    /// matches every replay.
    pub fn stop_all_replays(
        &mut self,
        recording_id: i64,
        correlation_id: i64,
        control_session_id: i64,
    ) -> Result<bool> {
        let length = codec::encode_stop_all_replays_request(
            &mut self.buffer,
            control_session_id,
            correlation_id,
            recording_id,
        )?;
        self.offer(length)
    }

    /// Request a listing of recording descriptors.
    pub fn list_recordings(
        &mut self,
        from_recording_id: i64,
        record_count: i32,
        correlation_id: i64,
        control_session_id: i64,
    ) -> Result<bool> {
        let length = codec::encode_list_recordings_request(
            &mut self.buffer,
            control_session_id,
            correlation_id,
            from_recording_id,
            record_count,
        )?;
        self.offer(length)
    }

    /// Request a listing of recording descriptors matching a channel
    /// fragment and stream id.
    #[allow(clippy::too_many_arguments)]
    pub fn list_recordings_for_uri(
        &mut self,
        from_recording_id: i64,
        record_count: i32,
        channel_fragment: &str,
        stream_id: i32,
        correlation_id: i64,
        control_session_id: i64,
    ) -> Result<bool> {
        let length = codec::encode_list_recordings_for_uri_request(
            &mut self.buffer,
            control_session_id,
            correlation_id,
            from_recording_id,
            record_count,
            stream_id,
            channel_fragment,
        )?;
        self.offer(length)
    }

    /// Request the descriptor of a single recording.
    pub fn list_recording(
        &mut self,
        recording_id: i64,
        correlation_id: i64,
        control_session_id: i64,
    ) -> Result<bool> {
        let length = codec::encode_list_recording_request(
            &mut self.buffer,
            control_session_id,
            correlation_id,
            recording_id,
        )?;
        self.offer(length)
    }

    /// Request a listing of active recording subscriptions.
    #[allow(clippy::too_many_arguments)]
    pub fn list_recording_subscriptions(
        &mut self,
        pseudo_index: i32,
        subscription_count: i32,
        channel_fragment: &str,
        stream_id: i32,
        apply_stream_id: bool,
        correlation_id: i64,
        control_session_id: i64,
    ) -> Result<bool> {
        let length = codec::encode_list_recording_subscriptions_request(
            &mut self.buffer,
            control_session_id,
            correlation_id,
            pseudo_index,
            subscription_count,
            apply_stream_id,
            stream_id,
            channel_fragment,
        )?;
        self.offer(length)
    }

    /// Request the recorded position of an active recording.
    pub fn get_recording_position(
        &mut self,
        recording_id: i64,
        correlation_id: i64,
        control_session_id: i64,
    ) -> Result<bool> {
        let length = codec::encode_recording_position_request(
            &mut self.buffer,
            control_session_id,
            correlation_id,
            recording_id,
        )?;
        self.offer(length)
    }

    /// Request the stop position of a recording.
    pub fn get_stop_position(
        &mut self,
        recording_id: i64,
        correlation_id: i64,
        control_session_id: i64,
    ) -> Result<bool> {
        let length = codec::encode_stop_position_request(
            &mut self.buffer,
            control_session_id,
            correlation_id,
            recording_id,
        )?;
        self.offer(length)
    }

    /// Request truncation of a stopped recording.
    pub fn truncate_recording(
        &mut self,
        recording_id: i64,
        position: i64,
        correlation_id: i64,
        control_session_id: i64,
    ) -> Result<bool> {
        let length = codec::encode_truncate_recording_request(
            &mut self.buffer,
            control_session_id,
            correlation_id,
            recording_id,
            position,
        )?;
        self.offer(length)
    }

    /// Request a search for the last recording matching the criteria.
    #[allow(clippy::too_many_arguments)]
    pub fn find_last_matching_recording(
        &mut self,
        min_recording_id: i64,
        channel_fragment: &str,
        stream_id: i32,
        session_id: i32,
        correlation_id: i64,
        control_session_id: i64,
    ) -> Result<bool> {
        let length = codec::encode_find_last_matching_recording_request(
            &mut self.buffer,
            control_session_id,
            correlation_id,
            min_recording_id,
            session_id,
            stream_id,
            channel_fragment,
        )?;
        self.offer(length)
    }

    /// Offer with the bounded retry budget. `Ok(false)` means the budget
    /// was exhausted on back-pressure; fatal outcomes are errors and are
    /// never retried.
    fn offer(&mut self, length: usize) -> Result<bool> {
        let mut remaining_attempts = self.retry_attempts;
        loop {
            match self.publication.offer(&self.buffer[..length]) {
                OfferOutcome::Position(_) => return Ok(true),
                OfferOutcome::Closed => return Err(ArchiveError::PublicationClosed),
                OfferOutcome::MaxPositionExceeded => return Err(ArchiveError::MaxPositionExceeded),
                OfferOutcome::NotConnected => return Err(ArchiveError::NotConnected),
                outcome @ (OfferOutcome::BackPressured | OfferOutcome::AdminAction) => {
                    remaining_attempts -= 1;
                    if remaining_attempts == 0 {
                        log::debug!("control request not accepted after {} attempts: {outcome:?}", self.retry_attempts);
                        return Ok(false);
                    }
                    self.idle.idle();
                    if let Some(conductor) = &self.conductor {
                        conductor.invoke_conductor();
                    }
                }
            }
        }
    }

    /// Offer, retrying every transient outcome until the connect timeout.
    /// Only used for the connect request, where no subscriber may exist yet
    /// so `NotConnected` is expected and retryable.
    fn offer_with_timeout(&mut self, length: usize, invoke_conductor: bool) -> Result<bool> {
        let deadline = Instant::now() + self.connect_timeout;
        loop {
            match self.publication.offer(&self.buffer[..length]) {
                OfferOutcome::Position(_) => return Ok(true),
                OfferOutcome::Closed => return Err(ArchiveError::PublicationClosed),
                OfferOutcome::MaxPositionExceeded => return Err(ArchiveError::MaxPositionExceeded),
                OfferOutcome::BackPressured
                | OfferOutcome::NotConnected
                | OfferOutcome::AdminAction => {
                    if Instant::now() > deadline {
                        return Ok(false);
                    }
                    if invoke_conductor {
                        if let Some(conductor) = &self.conductor {
                            conductor.invoke_conductor();
                        }
                    }
                    self.idle.idle();
                }
            }
        }
    }
}
