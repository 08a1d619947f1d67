// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Control-response poller.
//!
//! Decodes at most one complete control response per `poll()`. The
//! last-polled accessors are only meaningful while [`is_poll_complete`]
//! holds; the next `poll()` clears them.
//!
//! [`is_poll_complete`]: ControlResponsePoller::is_poll_complete

use std::sync::Arc;

use strata_transport::{ControlledPollAction, Subscription, NULL_VALUE};

use crate::error::{ArchiveError, Result};
use crate::protocol::codec::{decode_control_message, ControlMessage};
use crate::protocol::{template, ControlResponseCode};

/// Fragment limit for one control-channel poll.
pub const FRAGMENT_LIMIT: usize = 10;

/// Single-response decoder over the control-response subscription.
pub struct ControlResponsePoller {
    subscription: Arc<dyn Subscription>,
    fragment_limit: usize,
    control_session_id: i64,
    correlation_id: i64,
    relevant_id: i64,
    template_id: Option<u16>,
    code: ControlResponseCode,
    error_message: String,
    poll_complete: bool,
    pending_error: Option<ArchiveError>,
}

impl ControlResponsePoller {
    /// Create a poller with the default fragment limit.
    pub fn new(subscription: Arc<dyn Subscription>) -> Self {
        Self::with_fragment_limit(subscription, FRAGMENT_LIMIT)
    }

    /// Create a poller with an explicit fragment limit.
    pub fn with_fragment_limit(subscription: Arc<dyn Subscription>, fragment_limit: usize) -> Self {
        Self {
            subscription,
            fragment_limit,
            control_session_id: NULL_VALUE,
            correlation_id: NULL_VALUE,
            relevant_id: NULL_VALUE,
            template_id: None,
            code: ControlResponseCode::NullVal,
            error_message: String::new(),
            poll_complete: false,
            pending_error: None,
        }
    }

    /// The subscription polled for responses.
    #[must_use]
    pub fn subscription(&self) -> &Arc<dyn Subscription> {
        &self.subscription
    }

    /// Poll for one complete response. Returns the number of messages
    /// consumed; check [`ControlResponsePoller::is_poll_complete`] before
    /// reading the response fields.
    pub fn poll(&mut self) -> Result<usize> {
        self.control_session_id = NULL_VALUE;
        self.correlation_id = NULL_VALUE;
        self.relevant_id = NULL_VALUE;
        self.template_id = None;
        self.code = ControlResponseCode::NullVal;
        self.error_message.clear();
        self.poll_complete = false;

        let subscription = Arc::clone(&self.subscription);
        let fragment_limit = self.fragment_limit;
        let fragments = subscription.controlled_poll(&mut |frame| self.on_fragment(frame), fragment_limit);

        match self.pending_error.take() {
            Some(error) => Err(error),
            None => Ok(fragments),
        }
    }

    fn on_fragment(&mut self, frame: &[u8]) -> ControlledPollAction {
        if self.poll_complete {
            return ControlledPollAction::Abort;
        }

        let message = match decode_control_message(frame) {
            Ok(message) => message,
            Err(error) => {
                self.pending_error = Some(error.into());
                return ControlledPollAction::Break;
            }
        };

        self.template_id = Some(message.template_id());
        match message {
            ControlMessage::Response(response) => {
                self.control_session_id = response.control_session_id;
                self.correlation_id = response.correlation_id;
                self.relevant_id = response.relevant_id;
                self.code = response.code;
                self.error_message = response.error_message;
                self.poll_complete = true;
                ControlledPollAction::Break
            }
            _ => ControlledPollAction::Continue,
        }
    }

    /// Control session id of the last response.
    #[must_use]
    pub fn control_session_id(&self) -> i64 {
        self.control_session_id
    }

    /// Correlation id of the last response.
    #[must_use]
    pub fn correlation_id(&self) -> i64 {
        self.correlation_id
    }

    /// Relevant id (semantic payload) of the last response.
    #[must_use]
    pub fn relevant_id(&self) -> i64 {
        self.relevant_id
    }

    /// Code of the last response.
    #[must_use]
    pub fn code(&self) -> ControlResponseCode {
        self.code
    }

    /// Error message of the last response; empty unless error-coded.
    #[must_use]
    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    /// True iff the last decoded fragment was a control response.
    #[must_use]
    pub fn is_control_response(&self) -> bool {
        self.template_id == Some(template::CONTROL_RESPONSE)
    }

    /// True iff the last response carried `Ok`.
    #[must_use]
    pub fn is_code_ok(&self) -> bool {
        self.code == ControlResponseCode::Ok
    }

    /// True iff the last response carried `Error`.
    #[must_use]
    pub fn is_code_error(&self) -> bool {
        self.code == ControlResponseCode::Error
    }

    /// True iff a complete response was decoded by the last `poll()`.
    #[must_use]
    pub fn is_poll_complete(&self) -> bool {
        self.poll_complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::{encode_control_response, encode_recording_progress, RecordingProgress};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use strata_transport::Image;

    struct StubSubscription {
        frames: Mutex<VecDeque<Vec<u8>>>,
    }

    impl StubSubscription {
        fn with_frames(frames: impl IntoIterator<Item = Vec<u8>>) -> Arc<Self> {
            Arc::new(Self {
                frames: Mutex::new(frames.into_iter().collect()),
            })
        }

        fn remaining(&self) -> usize {
            self.frames.lock().len()
        }
    }

    impl Subscription for StubSubscription {
        fn poll(&self, handler: &mut dyn FnMut(&[u8]), fragment_limit: usize) -> usize {
            let mut count = 0;
            while count < fragment_limit {
                let Some(frame) = self.frames.lock().pop_front() else {
                    break;
                };
                handler(&frame);
                count += 1;
            }
            count
        }

        fn controlled_poll(
            &self,
            handler: &mut dyn FnMut(&[u8]) -> ControlledPollAction,
            fragment_limit: usize,
        ) -> usize {
            let mut count = 0;
            while count < fragment_limit {
                let Some(frame) = self.frames.lock().pop_front() else {
                    break;
                };
                match handler(&frame) {
                    ControlledPollAction::Continue | ControlledPollAction::Commit => count += 1,
                    ControlledPollAction::Break => {
                        count += 1;
                        break;
                    }
                    ControlledPollAction::Abort => {
                        self.frames.lock().push_front(frame);
                        break;
                    }
                }
            }
            count
        }

        fn is_connected(&self) -> bool {
            true
        }

        fn channel(&self) -> &str {
            "aeron:udp?endpoint=localhost:8020"
        }

        fn stream_id(&self) -> i32 {
            20
        }

        fn image_by_session_id(&self, _session_id: i32) -> Option<Arc<dyn Image>> {
            None
        }

        fn add_destination(&self, _endpoint_channel: &str) {}

        fn remove_destination(&self, _endpoint_channel: &str) {}
    }

    fn response_frame(
        control_session_id: i64,
        correlation_id: i64,
        relevant_id: i64,
        code: ControlResponseCode,
        error_message: &str,
    ) -> Vec<u8> {
        let mut buf = [0u8; 256];
        let length = encode_control_response(
            &mut buf,
            control_session_id,
            correlation_id,
            relevant_id,
            code,
            error_message,
        )
        .expect("encode");
        buf[..length].to_vec()
    }

    #[test]
    fn test_poll_decodes_one_response() {
        let subscription = StubSubscription::with_frames([response_frame(
            7,
            42,
            1234,
            ControlResponseCode::Ok,
            "",
        )]);
        let mut poller = ControlResponsePoller::new(subscription);

        poller.poll().expect("poll");
        assert!(poller.is_poll_complete());
        assert!(poller.is_control_response());
        assert!(poller.is_code_ok());
        assert_eq!(poller.control_session_id(), 7);
        assert_eq!(poller.correlation_id(), 42);
        assert_eq!(poller.relevant_id(), 1234);
    }

    #[test]
    fn test_poll_skips_non_response_templates() {
        let mut buf = [0u8; 64];
        let length = encode_recording_progress(
            &mut buf,
            &RecordingProgress {
                recording_id: 1,
                start_position: 0,
                position: 100,
            },
        )
        .expect("encode");

        let subscription = StubSubscription::with_frames([
            buf[..length].to_vec(),
            response_frame(7, 42, 0, ControlResponseCode::Ok, ""),
        ]);
        let mut poller = ControlResponsePoller::new(subscription);

        let fragments = poller.poll().expect("poll");
        assert_eq!(fragments, 2);
        assert!(poller.is_poll_complete());
        assert_eq!(poller.correlation_id(), 42);
    }

    #[test]
    fn test_poll_stops_after_first_response() {
        let subscription = StubSubscription::with_frames([
            response_frame(7, 42, 0, ControlResponseCode::Ok, ""),
            response_frame(7, 43, 0, ControlResponseCode::Ok, ""),
        ]);
        let mut poller = ControlResponsePoller::new(Arc::clone(&subscription) as Arc<dyn Subscription>);

        poller.poll().expect("poll");
        assert!(poller.is_poll_complete());
        assert_eq!(poller.correlation_id(), 42);
        // The second response stays queued for the next poll.
        assert_eq!(subscription.remaining(), 1);

        poller.poll().expect("poll");
        assert!(poller.is_poll_complete());
        assert_eq!(poller.correlation_id(), 43);
    }

    #[test]
    fn test_error_coded_response_fields() {
        let subscription = StubSubscription::with_frames([response_frame(
            7,
            42,
            8,
            ControlResponseCode::Error,
            "limit reached",
        )]);
        let mut poller = ControlResponsePoller::new(subscription);

        poller.poll().expect("poll");
        assert!(poller.is_code_error());
        assert_eq!(poller.relevant_id(), 8);
        assert_eq!(poller.error_message(), "limit reached");
    }

    #[test]
    fn test_schema_mismatch_is_error() {
        let mut frame = response_frame(7, 42, 0, ControlResponseCode::Ok, "");
        frame[4..6].copy_from_slice(&999u16.to_le_bytes());
        let subscription = StubSubscription::with_frames([frame]);
        let mut poller = ControlResponsePoller::new(subscription);

        let err = poller.poll().expect_err("schema mismatch");
        assert!(matches!(err, ArchiveError::Codec(_)));
        assert!(!poller.is_poll_complete());
    }
}
