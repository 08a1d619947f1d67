// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Replay/live merge.
//!
//! [`ReplayMerge`] consumes a historical replay of a recording and swaps to
//! the live stream without gaps or duplicates, transparently to whoever
//! polls the subscription. It needs a `control-mode=manual` subscription so
//! it can add the replay destination, later add the live destination, and
//! finally remove the replay destination once the consumer has caught up.
//!
//! The embedder drives [`ReplayMerge::do_work`]; each call performs at most
//! one protocol step and returns a work count for busy/idle accounting. At
//! most one request is in flight inside the merge at any time.

use std::sync::Arc;

use strata_transport::{ChannelUri, Image, Subscription, NULL_POSITION, NULL_VALUE};

use crate::client::session::ArchiveClient;
use crate::error::{ArchiveError, Result};

// Cutover thresholds as fractions of the replay image's term length,
// applied when the embedder does not override them.
const LIVE_ADD_TERM_FRACTION: i64 = 16;
const REPLAY_REMOVE_TERM_FRACTION: i64 = 4;

/// States of the merge. `Merged` and `Closed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMergeState {
    AwaitInitialRecordingPosition,
    AwaitReplay,
    AwaitCatchUp,
    AwaitCurrentRecordingPosition,
    AwaitStopReplay,
    Merged,
    Closed,
}

/// Stitches a catch-up replay onto a live stream.
pub struct ReplayMerge<'a> {
    archive: &'a ArchiveClient,
    subscription: Arc<dyn Subscription>,
    replay_channel: String,
    replay_destination: String,
    live_destination: String,
    recording_id: i64,
    start_position: i64,
    live_add_threshold: Option<i64>,
    replay_remove_threshold: Option<i64>,
    state: ReplayMergeState,
    active_correlation_id: i64,
    initial_max_position: i64,
    next_target_position: i64,
    replay_session_id: i64,
    is_replay_active: bool,
    is_live_added: bool,
    image: Option<Arc<dyn Image>>,
}

impl<'a> ReplayMerge<'a> {
    /// Begin a merge. The subscription must declare `control-mode=manual`;
    /// the replay destination is added to it immediately.
    pub fn new(
        archive: &'a ArchiveClient,
        subscription: Arc<dyn Subscription>,
        replay_channel: impl Into<String>,
        replay_destination: impl Into<String>,
        live_destination: impl Into<String>,
        recording_id: i64,
        start_position: i64,
    ) -> Result<Self> {
        let uri = ChannelUri::parse(subscription.channel())?;
        if !uri.is_manual_control_mode() {
            return Err(ArchiveError::InvalidArgument(format!(
                "subscription channel must be manual control mode: mode={}",
                uri.get(strata_transport::channel::CONTROL_MODE_PARAM).unwrap_or("")
            )));
        }

        let replay_destination = replay_destination.into();
        subscription.add_destination(&replay_destination);

        Ok(Self {
            archive,
            subscription,
            replay_channel: replay_channel.into(),
            replay_destination,
            live_destination: live_destination.into(),
            recording_id,
            start_position,
            live_add_threshold: None,
            replay_remove_threshold: None,
            state: ReplayMergeState::AwaitInitialRecordingPosition,
            active_correlation_id: NULL_VALUE,
            initial_max_position: NULL_POSITION,
            next_target_position: NULL_POSITION,
            replay_session_id: NULL_VALUE,
            is_replay_active: false,
            is_live_added: false,
            image: None,
        })
    }

    /// Override the cutover thresholds (bytes short of the recording
    /// position). The defaults derive from the replay image's term length.
    #[must_use]
    pub fn with_thresholds(mut self, live_add: i64, replay_remove: i64) -> Self {
        self.live_add_threshold = Some(live_add);
        self.replay_remove_threshold = Some(replay_remove);
        self
    }

    /// Perform one unit of merge work. Returns the work count.
    pub fn do_work(&mut self) -> Result<usize> {
        match self.state {
            ReplayMergeState::AwaitInitialRecordingPosition => self.await_initial_recording_position(),
            ReplayMergeState::AwaitReplay => self.await_replay(),
            ReplayMergeState::AwaitCatchUp => self.await_catch_up(),
            ReplayMergeState::AwaitCurrentRecordingPosition => self.await_updated_recording_position(),
            ReplayMergeState::AwaitStopReplay => self.await_stop_replay(),
            ReplayMergeState::Merged | ReplayMergeState::Closed => Ok(0),
        }
    }

    /// Current state of the merge.
    #[must_use]
    pub fn state(&self) -> ReplayMergeState {
        self.state
    }

    /// True once the live stream has fully replaced the replay.
    #[must_use]
    pub fn is_merged(&self) -> bool {
        self.state == ReplayMergeState::Merged
    }

    /// True while the archive is replaying to this subscription.
    #[must_use]
    pub fn is_replay_active(&self) -> bool {
        self.is_replay_active
    }

    /// True once the live destination has been added.
    #[must_use]
    pub fn is_live_added(&self) -> bool {
        self.is_live_added
    }

    /// The replay image, once resolved on the subscription.
    #[must_use]
    pub fn image(&self) -> Option<&Arc<dyn Image>> {
        self.image.as_ref()
    }

    /// Recording position observed when the merge began, or the null
    /// position before the first reply.
    #[must_use]
    pub fn initial_max_position(&self) -> i64 {
        self.initial_max_position
    }

    /// The subscription being merged onto.
    #[must_use]
    pub fn subscription(&self) -> &Arc<dyn Subscription> {
        &self.subscription
    }

    /// Stop an active replay and release the replay destination. Called by
    /// `Drop`; callable early for deterministic cleanup. Idempotent.
    pub fn close(&mut self) {
        if self.state == ReplayMergeState::Closed {
            return;
        }

        if self.is_replay_active && self.replay_session_id != NULL_VALUE {
            self.is_replay_active = false;
            let replay_session_id = self.replay_session_id;
            self.replay_session_id = NULL_VALUE;
            if let Err(error) = self.archive.stop_replay(replay_session_id) {
                log::warn!("failed to stop replay sessionId={replay_session_id} on close: {error}");
            }
        }

        if self.state != ReplayMergeState::Merged {
            self.subscription.remove_destination(&self.replay_destination);
        }

        self.set_state(ReplayMergeState::Closed);
    }

    fn await_initial_recording_position(&mut self) -> Result<usize> {
        let mut work_count = 0;

        if self.active_correlation_id == NULL_VALUE {
            let correlation_id = self.archive.driver().next_correlation_id();
            if self
                .archive
                .try_send_recording_position_request(self.recording_id, correlation_id)?
            {
                self.active_correlation_id = correlation_id;
                work_count += 1;
            }
        } else if let Some(position) = self.archive.poll_response_once(self.active_correlation_id)? {
            if position == NULL_POSITION {
                // Not being recorded right now; fall back to the stop
                // position of the finished recording.
                let correlation_id = self.archive.driver().next_correlation_id();
                if self
                    .archive
                    .try_send_stop_position_request(self.recording_id, correlation_id)?
                {
                    self.active_correlation_id = correlation_id;
                    work_count += 1;
                }
            } else {
                self.initial_max_position = position;
                self.next_target_position = position;
                self.active_correlation_id = NULL_VALUE;
                self.set_state(ReplayMergeState::AwaitReplay);
            }

            work_count += 1;
        }

        Ok(work_count)
    }

    fn await_replay(&mut self) -> Result<usize> {
        let mut work_count = 0;

        if self.active_correlation_id == NULL_VALUE {
            let correlation_id = self.archive.driver().next_correlation_id();
            if self.archive.try_send_replay_request(
                self.recording_id,
                self.start_position,
                i64::MAX,
                &self.replay_channel,
                self.subscription.stream_id(),
                correlation_id,
            )? {
                self.active_correlation_id = correlation_id;
                work_count += 1;
            }
        } else if let Some(replay_session_id) =
            self.archive.poll_response_once(self.active_correlation_id)?
        {
            self.is_replay_active = true;
            self.replay_session_id = replay_session_id;
            self.active_correlation_id = NULL_VALUE;
            self.set_state(ReplayMergeState::AwaitCatchUp);
            work_count += 1;
        }

        Ok(work_count)
    }

    fn await_catch_up(&mut self) -> Result<usize> {
        let mut work_count = 0;

        if self.image.is_none() && self.subscription.is_connected() {
            if let Some(image) = self
                .subscription
                .image_by_session_id(self.replay_session_id as i32)
            {
                if self.live_add_threshold.is_none() {
                    let term_length = i64::from(image.term_buffer_length());
                    self.live_add_threshold = Some(term_length / LIVE_ADD_TERM_FRACTION);
                    self.replay_remove_threshold = Some(term_length / REPLAY_REMOVE_TERM_FRACTION);
                }
                self.image = Some(image);
            }
        }

        if let Some(image) = &self.image {
            if image.position() >= self.next_target_position {
                self.active_correlation_id = NULL_VALUE;
                self.set_state(ReplayMergeState::AwaitCurrentRecordingPosition);
                work_count += 1;
            }
        }

        Ok(work_count)
    }

    fn await_updated_recording_position(&mut self) -> Result<usize> {
        let mut work_count = 0;

        if self.active_correlation_id == NULL_VALUE {
            let correlation_id = self.archive.driver().next_correlation_id();
            if self
                .archive
                .try_send_recording_position_request(self.recording_id, correlation_id)?
            {
                self.active_correlation_id = correlation_id;
                work_count += 1;
            }
        } else if let Some(position) = self.archive.poll_response_once(self.active_correlation_id)? {
            if position == NULL_POSITION {
                let correlation_id = self.archive.driver().next_correlation_id();
                if self
                    .archive
                    .try_send_recording_position_request(self.recording_id, correlation_id)?
                {
                    self.active_correlation_id = correlation_id;
                }
            } else {
                self.next_target_position = position;
                let mut next_state = ReplayMergeState::AwaitCatchUp;

                if let Some(image) = &self.image {
                    let image_position = image.position();

                    if self.should_add_live_destination(image_position) {
                        self.subscription.add_destination(&self.live_destination);
                        self.is_live_added = true;
                    } else if self.should_stop_and_remove_replay(image_position) {
                        next_state = ReplayMergeState::AwaitStopReplay;
                    }
                }

                self.active_correlation_id = NULL_VALUE;
                self.set_state(next_state);
            }

            work_count += 1;
        }

        Ok(work_count)
    }

    fn await_stop_replay(&mut self) -> Result<usize> {
        let mut work_count = 0;

        if self.active_correlation_id == NULL_VALUE {
            let correlation_id = self.archive.driver().next_correlation_id();
            if self
                .archive
                .try_send_stop_replay_request(self.replay_session_id, correlation_id)?
            {
                self.active_correlation_id = correlation_id;
                work_count += 1;
            }
        } else if self.archive.poll_response_once(self.active_correlation_id)?.is_some() {
            self.is_replay_active = false;
            self.replay_session_id = NULL_VALUE;
            self.active_correlation_id = NULL_VALUE;
            self.subscription.remove_destination(&self.replay_destination);
            self.set_state(ReplayMergeState::Merged);
            work_count += 1;
        }

        Ok(work_count)
    }

    fn should_add_live_destination(&self, position: i64) -> bool {
        !self.is_live_added
            && self
                .live_add_threshold
                .is_some_and(|threshold| self.next_target_position - position <= threshold)
    }

    fn should_stop_and_remove_replay(&self, position: i64) -> bool {
        self.is_live_added
            && self
                .replay_remove_threshold
                .is_some_and(|threshold| self.next_target_position - position <= threshold)
    }

    fn set_state(&mut self, state: ReplayMergeState) {
        log::debug!(
            "replay merge recordingId={}: {:?} -> {:?}",
            self.recording_id,
            self.state,
            state
        );
        self.state = state;
    }
}

impl Drop for ReplayMerge<'_> {
    fn drop(&mut self) {
        self.close();
    }
}
