// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Archive control session.
//!
//! [`ArchiveClient`] owns one control session and exposes the synchronous
//! command surface. Every command mints a fresh correlation id, encodes and
//! offers the request, then busy-polls (yielding idle) for the matching
//! response, a timeout, or a disconnect. One mutex guards the proxy and all
//! pollers from command entry to response, so at most one request is in
//! flight per session at any instant.
//!
//! # Thread Safety
//!
//! Commands take `&self` and may be issued from any thread; they serialize
//! on the internal mutex. Descriptor consumers run synchronously inside the
//! calling command, under that mutex - they must not call back into the
//! client.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use strata_transport::{add_session_id, Driver, IdleStrategy, ImageHandler, Publication};

use crate::client::descriptor_poller::{
    DescriptorKind, DescriptorPoller, RecordingDescriptors, RecordingSubscriptionDescriptors,
};
use crate::client::proxy::ArchiveProxy;
use crate::client::response_poller::{ControlResponsePoller, FRAGMENT_LIMIT};
use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, ArchiveErrorCode, ErrorHandler, Result};
use crate::protocol::codec::{RecordingDescriptor, RecordingSubscriptionDescriptor};
use crate::protocol::SourceLocation;

struct ClientInner {
    proxy: ArchiveProxy,
    response_poller: ControlResponsePoller,
    recording_poller: DescriptorPoller<RecordingDescriptors>,
    subscription_poller: DescriptorPoller<RecordingSubscriptionDescriptors>,
}

/// Client for one control session with an archive.
pub struct ArchiveClient {
    control_session_id: i64,
    message_timeout: std::time::Duration,
    driver: Arc<dyn Driver>,
    error_handler: Option<ErrorHandler>,
    idle: IdleStrategy,
    inner: Mutex<ClientInner>,
}

impl ArchiveClient {
    /// Assemble a client from handshake products. Most embedders go through
    /// [`crate::client::async_connect::connect`] instead.
    pub fn new(
        config: &ArchiveConfig,
        control_session_id: i64,
        driver: Arc<dyn Driver>,
        response_poller: ControlResponsePoller,
        proxy: ArchiveProxy,
    ) -> Self {
        let subscription = Arc::clone(response_poller.subscription());
        let recording_poller = DescriptorPoller::new(
            Arc::clone(&subscription),
            config.error_handler.clone(),
            control_session_id,
            FRAGMENT_LIMIT,
        );
        let subscription_poller = DescriptorPoller::new(
            subscription,
            config.error_handler.clone(),
            control_session_id,
            FRAGMENT_LIMIT,
        );

        Self {
            control_session_id,
            message_timeout: config.message_timeout,
            driver,
            error_handler: config.error_handler.clone(),
            idle: IdleStrategy::Yielding,
            inner: Mutex::new(ClientInner {
                proxy,
                response_poller,
                recording_poller,
                subscription_poller,
            }),
        }
    }

    /// The control session id the archive assigned to this connection.
    #[must_use]
    pub fn control_session_id(&self) -> i64 {
        self.control_session_id
    }

    /// The transport driver handle this client was built with.
    #[must_use]
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Poll the response stream once for an error. If another message is
    /// present it is skipped over, so only call when not expecting another
    /// response. Returns the error message if an error was observed.
    pub fn poll_for_error_response(&self) -> Result<Option<String>> {
        let mut inner = self.inner.lock();
        if inner.response_poller.poll()? != 0 && inner.response_poller.is_poll_complete() {
            let poller = &inner.response_poller;
            if poller.control_session_id() == self.control_session_id
                && poller.is_control_response()
                && poller.is_code_error()
            {
                return Ok(Some(poller.error_message().to_string()));
            }
        }
        Ok(None)
    }

    /// Like [`ArchiveClient::poll_for_error_response`], but an observed
    /// error goes to the configured error handler, or is returned as an
    /// error when no handler is set.
    pub fn check_for_error_response(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.response_poller.poll()? != 0 && inner.response_poller.is_poll_complete() {
            let poller = &inner.response_poller;
            if poller.control_session_id() == self.control_session_id
                && poller.is_control_response()
                && poller.is_code_error()
            {
                let error = ArchiveError::Response {
                    code: ArchiveErrorCode::from_relevant_id(poller.relevant_id()),
                    message: poller.error_message().to_string(),
                };
                match &self.error_handler {
                    Some(handler) => handler(&error),
                    None => return Err(error),
                }
            }
        }
        Ok(())
    }

    /// Add a publication and start a session-scoped recording of it.
    ///
    /// Fails if the publication is a second, non-original session on the
    /// same channel - that session is already being recorded.
    pub fn add_recorded_publication(
        &self,
        channel: &str,
        stream_id: i32,
    ) -> Result<Arc<dyn Publication>> {
        let registration_id = self.driver.add_publication(channel, stream_id);
        let publication = self.await_publication(registration_id, |id| self.driver.find_publication(id))?;
        self.start_session_recording(&publication, channel, stream_id)?;
        Ok(publication)
    }

    /// Add an exclusive publication and start a session-scoped recording.
    pub fn add_recorded_exclusive_publication(
        &self,
        channel: &str,
        stream_id: i32,
    ) -> Result<Arc<dyn Publication>> {
        let registration_id = self.driver.add_exclusive_publication(channel, stream_id);
        let publication =
            self.await_publication(registration_id, |id| self.driver.find_exclusive_publication(id))?;
        self.start_session_recording(&publication, channel, stream_id)?;
        Ok(publication)
    }

    fn await_publication(
        &self,
        registration_id: i64,
        find: impl Fn(i64) -> Option<Arc<dyn Publication>>,
    ) -> Result<Arc<dyn Publication>> {
        loop {
            if let Some(publication) = find(registration_id) {
                return Ok(publication);
            }
            self.idle.idle();
            self.driver.invoke_conductor();
        }
    }

    fn start_session_recording(
        &self,
        publication: &Arc<dyn Publication>,
        channel: &str,
        stream_id: i32,
    ) -> Result<()> {
        if !publication.is_original() {
            return Err(ArchiveError::InvalidArgument(format!(
                "publication already added for channel={channel} streamId={stream_id}"
            )));
        }
        self.start_recording(
            &add_session_id(channel, publication.session_id()),
            stream_id,
            SourceLocation::Local,
        )?;
        Ok(())
    }

    /// Start recording a channel/stream pairing. Returns the subscription
    /// id of the recording.
    pub fn start_recording(
        &self,
        channel: &str,
        stream_id: i32,
        source_location: SourceLocation,
    ) -> Result<i64> {
        let mut inner = self.inner.lock();
        let correlation_id = self.driver.next_correlation_id();
        if !inner.proxy.start_recording(
            channel,
            stream_id,
            source_location,
            correlation_id,
            self.control_session_id,
        )? {
            return Err(ArchiveError::SendFailed("start recording"));
        }
        self.poll_for_response(&mut inner, correlation_id)
    }

    /// Extend an existing, non-active recording. Returns the subscription
    /// id of the recording.
    pub fn extend_recording(
        &self,
        recording_id: i64,
        channel: &str,
        stream_id: i32,
        source_location: SourceLocation,
    ) -> Result<i64> {
        let mut inner = self.inner.lock();
        let correlation_id = self.driver.next_correlation_id();
        if !inner.proxy.extend_recording(
            channel,
            stream_id,
            source_location,
            recording_id,
            correlation_id,
            self.control_session_id,
        )? {
            return Err(ArchiveError::SendFailed("extend recording"));
        }
        self.poll_for_response(&mut inner, correlation_id)
    }

    /// Stop recording a channel/stream pairing.
    pub fn stop_recording(&self, channel: &str, stream_id: i32) -> Result<()> {
        let mut inner = self.inner.lock();
        let correlation_id = self.driver.next_correlation_id();
        if !inner
            .proxy
            .stop_recording(channel, stream_id, correlation_id, self.control_session_id)?
        {
            return Err(ArchiveError::SendFailed("stop recording"));
        }
        self.poll_for_response(&mut inner, correlation_id)?;
        Ok(())
    }

    /// Stop the session-scoped recording of a publication added with
    /// [`ArchiveClient::add_recorded_publication`].
    pub fn stop_recording_publication(&self, publication: &dyn Publication) -> Result<()> {
        let channel = add_session_id(publication.channel(), publication.session_id());
        self.stop_recording(&channel, publication.stream_id())
    }

    /// Stop recording for a subscription id returned by
    /// [`ArchiveClient::start_recording`] or
    /// [`ArchiveClient::extend_recording`].
    pub fn stop_recording_subscription(&self, subscription_id: i64) -> Result<()> {
        let mut inner = self.inner.lock();
        let correlation_id = self.driver.next_correlation_id();
        if !inner.proxy.stop_recording_subscription(
            subscription_id,
            correlation_id,
            self.control_session_id,
        )? {
            return Err(ArchiveError::SendFailed("stop recording"));
        }
        self.poll_for_response(&mut inner, correlation_id)?;
        Ok(())
    }

    /// Start a replay of a recording.
    ///
    /// The lower 32 bits of the returned replay session id are the image
    /// session id of the replay; all 64 bits identify the replay for
    /// [`ArchiveClient::stop_replay`].
    pub fn start_replay(
        &self,
        recording_id: i64,
        position: i64,
        length: i64,
        replay_channel: &str,
        replay_stream_id: i32,
    ) -> Result<i64> {
        let mut inner = self.inner.lock();
        let correlation_id = self.driver.next_correlation_id();
        if !inner.proxy.replay(
            recording_id,
            position,
            length,
            replay_channel,
            replay_stream_id,
            correlation_id,
            self.control_session_id,
        )? {
            return Err(ArchiveError::SendFailed("replay"));
        }
        self.poll_for_response(&mut inner, correlation_id)
    }

    /// Start a replay bounded by the position in a limit counter.
    pub fn start_bounded_replay(
        &self,
        recording_id: i64,
        position: i64,
        length: i64,
        limit_counter_id: i32,
        replay_channel: &str,
        replay_stream_id: i32,
    ) -> Result<i64> {
        let mut inner = self.inner.lock();
        let correlation_id = self.driver.next_correlation_id();
        if !inner.proxy.bounded_replay(
            recording_id,
            position,
            length,
            limit_counter_id,
            replay_channel,
            replay_stream_id,
            correlation_id,
            self.control_session_id,
        )? {
            return Err(ArchiveError::SendFailed("replay"));
        }
        self.poll_for_response(&mut inner, correlation_id)
    }

    /// Start a replay and add a subscription to consume it. Returns the
    /// registration id of the subscription.
    pub fn replay(
        &self,
        recording_id: i64,
        position: i64,
        length: i64,
        replay_channel: &str,
        replay_stream_id: i32,
    ) -> Result<i64> {
        let replay_session_id =
            self.start_replay(recording_id, position, length, replay_channel, replay_stream_id)?;
        let channel = add_session_id(replay_channel, replay_session_id as i32);
        Ok(self.driver.add_subscription(&channel, replay_stream_id))
    }

    /// [`ArchiveClient::replay`] with image availability handlers on the
    /// created subscription.
    #[allow(clippy::too_many_arguments)]
    pub fn replay_with_image_handlers(
        &self,
        recording_id: i64,
        position: i64,
        length: i64,
        replay_channel: &str,
        replay_stream_id: i32,
        on_available_image: ImageHandler,
        on_unavailable_image: ImageHandler,
    ) -> Result<i64> {
        let replay_session_id =
            self.start_replay(recording_id, position, length, replay_channel, replay_stream_id)?;
        let channel = add_session_id(replay_channel, replay_session_id as i32);
        Ok(self.driver.add_subscription_with_handlers(
            &channel,
            replay_stream_id,
            on_available_image,
            on_unavailable_image,
        ))
    }

    /// Stop a replay session.
    pub fn stop_replay(&self, replay_session_id: i64) -> Result<()> {
        let mut inner = self.inner.lock();
        let correlation_id = self.driver.next_correlation_id();
        if !inner
            .proxy
            .stop_replay(replay_session_id, correlation_id, self.control_session_id)?
        {
            return Err(ArchiveError::SendFailed("stop replay"));
        }
        self.poll_for_response(&mut inner, correlation_id)?;
        Ok(())
    }

    /// Stop all replays of a recording; a null recording id matches all.
    pub fn stop_all_replays(&self, recording_id: i64) -> Result<()> {
        let mut inner = self.inner.lock();
        let correlation_id = self.driver.next_correlation_id();
        if !inner
            .proxy
            .stop_all_replays(recording_id, correlation_id, self.control_session_id)?
        {
            return Err(ArchiveError::SendFailed("stop replay"));
        }
        self.poll_for_response(&mut inner, correlation_id)?;
        Ok(())
    }

    /// List recording descriptors starting from a recording id. Returns the
    /// number of descriptors consumed.
    pub fn list_recordings(
        &self,
        from_recording_id: i64,
        record_count: i32,
        consumer: &mut dyn FnMut(&RecordingDescriptor),
    ) -> Result<i32> {
        let mut inner = self.inner.lock();
        let correlation_id = self.driver.next_correlation_id();
        if !inner.proxy.list_recordings(
            from_recording_id,
            record_count,
            correlation_id,
            self.control_session_id,
        )? {
            return Err(ArchiveError::SendFailed("list recordings"));
        }
        let ClientInner { recording_poller, .. } = &mut *inner;
        self.poll_for_descriptors(
            recording_poller,
            correlation_id,
            record_count,
            consumer,
            "recording descriptors",
        )
    }

    /// List recording descriptors matching a channel fragment and stream.
    pub fn list_recordings_for_uri(
        &self,
        from_recording_id: i64,
        record_count: i32,
        channel_fragment: &str,
        stream_id: i32,
        consumer: &mut dyn FnMut(&RecordingDescriptor),
    ) -> Result<i32> {
        let mut inner = self.inner.lock();
        let correlation_id = self.driver.next_correlation_id();
        if !inner.proxy.list_recordings_for_uri(
            from_recording_id,
            record_count,
            channel_fragment,
            stream_id,
            correlation_id,
            self.control_session_id,
        )? {
            return Err(ArchiveError::SendFailed("list recordings"));
        }
        let ClientInner { recording_poller, .. } = &mut *inner;
        self.poll_for_descriptors(
            recording_poller,
            correlation_id,
            record_count,
            consumer,
            "recording descriptors",
        )
    }

    /// List the descriptor of a single recording. Returns 1 when found.
    pub fn list_recording(
        &self,
        recording_id: i64,
        consumer: &mut dyn FnMut(&RecordingDescriptor),
    ) -> Result<i32> {
        let mut inner = self.inner.lock();
        let correlation_id = self.driver.next_correlation_id();
        if !inner
            .proxy
            .list_recording(recording_id, correlation_id, self.control_session_id)?
        {
            return Err(ArchiveError::SendFailed("list recording"));
        }
        let ClientInner { recording_poller, .. } = &mut *inner;
        self.poll_for_descriptors(
            recording_poller,
            correlation_id,
            1,
            consumer,
            "recording descriptors",
        )
    }

    /// List active recording subscriptions. Returns the number matched.
    pub fn list_recording_subscriptions(
        &self,
        pseudo_index: i32,
        subscription_count: i32,
        channel_fragment: &str,
        stream_id: i32,
        apply_stream_id: bool,
        consumer: &mut dyn FnMut(&RecordingSubscriptionDescriptor),
    ) -> Result<i32> {
        let mut inner = self.inner.lock();
        let correlation_id = self.driver.next_correlation_id();
        if !inner.proxy.list_recording_subscriptions(
            pseudo_index,
            subscription_count,
            channel_fragment,
            stream_id,
            apply_stream_id,
            correlation_id,
            self.control_session_id,
        )? {
            return Err(ArchiveError::SendFailed("list recording subscriptions"));
        }
        let ClientInner { subscription_poller, .. } = &mut *inner;
        self.poll_for_descriptors(
            subscription_poller,
            correlation_id,
            subscription_count,
            consumer,
            "subscription descriptors",
        )
    }

    /// Recorded position of an active recording, or the null position when
    /// the recording is not active.
    pub fn get_recording_position(&self, recording_id: i64) -> Result<i64> {
        let mut inner = self.inner.lock();
        let correlation_id = self.driver.next_correlation_id();
        if !inner
            .proxy
            .get_recording_position(recording_id, correlation_id, self.control_session_id)?
        {
            return Err(ArchiveError::SendFailed("get recording position"));
        }
        self.poll_for_response(&mut inner, correlation_id)
    }

    /// Stop position of a recording, or the null position while active.
    pub fn get_stop_position(&self, recording_id: i64) -> Result<i64> {
        let mut inner = self.inner.lock();
        let correlation_id = self.driver.next_correlation_id();
        if !inner
            .proxy
            .get_stop_position(recording_id, correlation_id, self.control_session_id)?
        {
            return Err(ArchiveError::SendFailed("get stop position"));
        }
        self.poll_for_response(&mut inner, correlation_id)
    }

    /// Find the last recording matching the criteria, or the null value.
    pub fn find_last_matching_recording(
        &self,
        min_recording_id: i64,
        channel_fragment: &str,
        stream_id: i32,
        session_id: i32,
    ) -> Result<i64> {
        let mut inner = self.inner.lock();
        let correlation_id = self.driver.next_correlation_id();
        if !inner.proxy.find_last_matching_recording(
            min_recording_id,
            channel_fragment,
            stream_id,
            session_id,
            correlation_id,
            self.control_session_id,
        )? {
            return Err(ArchiveError::SendFailed("find last matching recording"));
        }
        self.poll_for_response(&mut inner, correlation_id)
    }

    /// Truncate a stopped recording to a position on a fragment boundary.
    /// Truncating to the start position deletes the recording.
    pub fn truncate_recording(&self, recording_id: i64, position: i64) -> Result<()> {
        let mut inner = self.inner.lock();
        let correlation_id = self.driver.next_correlation_id();
        if !inner.proxy.truncate_recording(
            recording_id,
            position,
            correlation_id,
            self.control_session_id,
        )? {
            return Err(ArchiveError::SendFailed("truncate recording"));
        }
        self.poll_for_response(&mut inner, correlation_id)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Non-blocking plumbing for the replay-merge state machine.
    // ------------------------------------------------------------------

    pub(crate) fn try_send_recording_position_request(
        &self,
        recording_id: i64,
        correlation_id: i64,
    ) -> Result<bool> {
        self.inner
            .lock()
            .proxy
            .get_recording_position(recording_id, correlation_id, self.control_session_id)
    }

    pub(crate) fn try_send_stop_position_request(
        &self,
        recording_id: i64,
        correlation_id: i64,
    ) -> Result<bool> {
        self.inner
            .lock()
            .proxy
            .get_stop_position(recording_id, correlation_id, self.control_session_id)
    }

    pub(crate) fn try_send_replay_request(
        &self,
        recording_id: i64,
        position: i64,
        length: i64,
        replay_channel: &str,
        replay_stream_id: i32,
        correlation_id: i64,
    ) -> Result<bool> {
        self.inner.lock().proxy.replay(
            recording_id,
            position,
            length,
            replay_channel,
            replay_stream_id,
            correlation_id,
            self.control_session_id,
        )
    }

    pub(crate) fn try_send_stop_replay_request(
        &self,
        replay_session_id: i64,
        correlation_id: i64,
    ) -> Result<bool> {
        self.inner
            .lock()
            .proxy
            .stop_replay(replay_session_id, correlation_id, self.control_session_id)
    }

    /// One non-blocking poll for the response to `correlation_id`. Returns
    /// the relevant id when the matching response has arrived; error-coded
    /// matches raise immediately.
    pub(crate) fn poll_response_once(&self, correlation_id: i64) -> Result<Option<i64>> {
        let mut inner = self.inner.lock();
        let fragments = inner.response_poller.poll()?;
        if fragments > 0 && inner.response_poller.is_poll_complete() {
            let poller = &inner.response_poller;
            if poller.control_session_id() == self.control_session_id
                && poller.correlation_id() == correlation_id
            {
                if poller.is_code_error() {
                    return Err(ArchiveError::Response {
                        code: ArchiveErrorCode::from_relevant_id(poller.relevant_id()),
                        message: format!(
                            "archive response for correlationId={correlation_id}, error: {}",
                            poller.error_message()
                        ),
                    });
                }
                return Ok(Some(poller.relevant_id()));
            }
        }
        Ok(None)
    }

    // ------------------------------------------------------------------
    // Wait loops
    // ------------------------------------------------------------------

    fn poll_for_response(&self, inner: &mut ClientInner, correlation_id: i64) -> Result<i64> {
        let deadline = Instant::now() + self.message_timeout;

        loop {
            self.poll_next_response(inner, correlation_id, deadline)?;

            let poller = &inner.response_poller;
            if poller.control_session_id() != self.control_session_id
                || !poller.is_control_response()
            {
                self.driver.invoke_conductor();
                continue;
            }

            if poller.is_code_error() {
                let error = ArchiveError::Response {
                    code: ArchiveErrorCode::from_relevant_id(poller.relevant_id()),
                    message: format!(
                        "response for correlationId={correlation_id}, error: {}",
                        poller.error_message()
                    ),
                };

                if poller.correlation_id() == correlation_id {
                    return Err(error);
                }
                self.dispatch_out_of_band_error(poller.correlation_id(), error);
            } else if poller.correlation_id() == correlation_id {
                if !poller.is_code_ok() {
                    return Err(ArchiveError::UnexpectedResponseCode(poller.code()));
                }
                return Ok(poller.relevant_id());
            }
        }
    }

    fn poll_next_response(
        &self,
        inner: &mut ClientInner,
        correlation_id: i64,
        deadline: Instant,
    ) -> Result<()> {
        loop {
            let fragments = inner.response_poller.poll()?;

            if inner.response_poller.is_poll_complete() {
                return Ok(());
            }

            if fragments > 0 {
                continue;
            }

            if !inner.response_poller.subscription().is_connected() {
                return Err(ArchiveError::ResponseChannelDisconnected);
            }

            if Instant::now() > deadline {
                return Err(ArchiveError::Timeout(format!(
                    "awaiting response - correlationId={correlation_id}"
                )));
            }

            self.idle.idle();
            self.driver.invoke_conductor();
        }
    }

    /// Descriptor wait loop. The deadline is rearmed whenever the listing
    /// makes progress, so a long listing is bounded per record rather than
    /// in total.
    fn poll_for_descriptors<K: DescriptorKind>(
        &self,
        poller: &mut DescriptorPoller<K>,
        correlation_id: i64,
        record_count: i32,
        consumer: &mut dyn FnMut(&K::Record),
        awaiting: &'static str,
    ) -> Result<i32> {
        let mut existing_remain_count = record_count;
        let mut deadline = Instant::now() + self.message_timeout;
        poller.reset(correlation_id, record_count);

        loop {
            let fragments = poller.poll(consumer)?;
            let remaining = poller.remaining_count();

            if poller.is_dispatch_complete() {
                return Ok(record_count - remaining);
            }

            if remaining != existing_remain_count {
                existing_remain_count = remaining;
                deadline = Instant::now() + self.message_timeout;
            }

            self.driver.invoke_conductor();

            if fragments > 0 {
                continue;
            }

            if !poller.subscription().is_connected() {
                return Err(ArchiveError::ResponseChannelDisconnected);
            }

            if Instant::now() > deadline {
                return Err(ArchiveError::Timeout(format!(
                    "awaiting {awaiting} - correlationId={correlation_id}"
                )));
            }

            self.idle.idle();
        }
    }

    fn dispatch_out_of_band_error(&self, correlation_id: i64, error: ArchiveError) {
        match &self.error_handler {
            Some(handler) => handler(&error),
            None => log::debug!(
                "dropping out-of-band archive error for correlationId={correlation_id}: {error}"
            ),
        }
    }
}

impl Drop for ArchiveClient {
    /// Best-effort close of the control session; the offer result is
    /// ignored.
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        let control_session_id = self.control_session_id;
        if let Err(error) = inner.proxy.close_session(control_session_id) {
            log::debug!("close session offer failed for controlSessionId={control_session_id}: {error}");
        }
    }
}
