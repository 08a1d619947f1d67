// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Recording progress events.
//!
//! The archive publishes started/progress/stopped events for its recordings
//! on a dedicated events channel (dynamic multi-destination-cast by
//! default). [`RecordingEventsAdapter`] polls that subscription and
//! dispatches decoded events to a [`RecordingEventsListener`].

use std::sync::Arc;

use strata_transport::Subscription;

use crate::error::{ArchiveError, Result};
use crate::protocol::codec::{
    decode_control_message, ControlMessage, RecordingProgress, RecordingStarted, RecordingStopped,
};

/// Receiver of recording lifecycle events.
///
/// Callbacks run synchronously inside [`RecordingEventsAdapter::poll`].
pub trait RecordingEventsListener {
    /// A recording has started.
    fn on_start(&mut self, event: &RecordingStarted);

    /// An active recording has advanced.
    fn on_progress(&mut self, event: &RecordingProgress);

    /// A recording has stopped.
    fn on_stop(&mut self, event: &RecordingStopped);
}

/// Polls the recording-events subscription and dispatches to a listener.
pub struct RecordingEventsAdapter<L: RecordingEventsListener> {
    subscription: Arc<dyn Subscription>,
    listener: L,
    fragment_limit: usize,
    pending_error: Option<ArchiveError>,
}

impl<L: RecordingEventsListener> RecordingEventsAdapter<L> {
    /// Create an adapter over the recording-events subscription.
    pub fn new(subscription: Arc<dyn Subscription>, listener: L, fragment_limit: usize) -> Self {
        Self {
            subscription,
            listener,
            fragment_limit,
            pending_error: None,
        }
    }

    /// The subscription polled for events.
    #[must_use]
    pub fn subscription(&self) -> &Arc<dyn Subscription> {
        &self.subscription
    }

    /// The listener events are dispatched to.
    pub fn listener(&mut self) -> &mut L {
        &mut self.listener
    }

    /// Poll for events. Returns the number of messages consumed; unknown
    /// templates are skipped, schema violations are fatal.
    pub fn poll(&mut self) -> Result<usize> {
        let subscription = Arc::clone(&self.subscription);
        let fragment_limit = self.fragment_limit;
        let fragments = subscription.poll(&mut |frame| self.on_fragment(frame), fragment_limit);

        match self.pending_error.take() {
            Some(error) => Err(error),
            None => Ok(fragments),
        }
    }

    fn on_fragment(&mut self, frame: &[u8]) {
        if self.pending_error.is_some() {
            return;
        }

        match decode_control_message(frame) {
            Ok(ControlMessage::RecordingStarted(event)) => self.listener.on_start(&event),
            Ok(ControlMessage::RecordingProgress(event)) => self.listener.on_progress(&event),
            Ok(ControlMessage::RecordingStopped(event)) => self.listener.on_stop(&event),
            Ok(_) => {}
            Err(error) => self.pending_error = Some(error.into()),
        }
    }
}
