// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Descriptor pollers for multi-record listing queries.
//!
//! One dispatch core, two instantiations: recording descriptors terminate
//! early on a `RecordingUnknown` response, recording-subscription
//! descriptors on `SubscriptionUnknown`. A listing is driven as
//! `reset(correlation_id, expected_count)` followed by `poll(consumer)`
//! until [`DescriptorPoller::is_dispatch_complete`].

use std::marker::PhantomData;
use std::sync::Arc;

use strata_transport::{ControlledPollAction, Subscription, NULL_VALUE};

use crate::error::{ArchiveError, ArchiveErrorCode, ErrorHandler, Result};
use crate::protocol::codec::{
    decode_control_message, ControlMessage, RecordingDescriptor, RecordingSubscriptionDescriptor,
};
use crate::protocol::ControlResponseCode;

/// What a descriptor poller dispatches and which control-response code
/// terminates its listings early.
pub trait DescriptorKind {
    /// Decoded record type delivered to consumers.
    type Record;

    /// Control-response code that ends a listing with fewer records than
    /// requested.
    const UNKNOWN_CODE: ControlResponseCode;

    /// Extract this kind's record from a decoded message, if it is one.
    fn record(message: ControlMessage) -> Option<Self::Record>;

    /// `(control_session_id, correlation_id)` of a record, for filtering.
    fn ids(record: &Self::Record) -> (i64, i64);
}

/// Kind marker for recording-descriptor listings.
pub struct RecordingDescriptors;

impl DescriptorKind for RecordingDescriptors {
    type Record = RecordingDescriptor;

    const UNKNOWN_CODE: ControlResponseCode = ControlResponseCode::RecordingUnknown;

    fn record(message: ControlMessage) -> Option<Self::Record> {
        match message {
            ControlMessage::RecordingDescriptor(descriptor) => Some(descriptor),
            _ => None,
        }
    }

    fn ids(record: &Self::Record) -> (i64, i64) {
        (record.control_session_id, record.correlation_id)
    }
}

/// Kind marker for recording-subscription-descriptor listings.
pub struct RecordingSubscriptionDescriptors;

impl DescriptorKind for RecordingSubscriptionDescriptors {
    type Record = RecordingSubscriptionDescriptor;

    const UNKNOWN_CODE: ControlResponseCode = ControlResponseCode::SubscriptionUnknown;

    fn record(message: ControlMessage) -> Option<Self::Record> {
        match message {
            ControlMessage::RecordingSubscriptionDescriptor(descriptor) => Some(descriptor),
            _ => None,
        }
    }

    fn ids(record: &Self::Record) -> (i64, i64) {
        (record.control_session_id, record.correlation_id)
    }
}

/// Dispatches a finite, bounded stream of descriptor records to a consumer
/// while interleaving error responses.
pub struct DescriptorPoller<K: DescriptorKind> {
    subscription: Arc<dyn Subscription>,
    error_handler: Option<ErrorHandler>,
    control_session_id: i64,
    fragment_limit: usize,
    correlation_id: i64,
    remaining_count: i32,
    dispatch_complete: bool,
    pending_error: Option<ArchiveError>,
    _kind: PhantomData<K>,
}

impl<K: DescriptorKind> DescriptorPoller<K> {
    /// Create a poller bound to a control session.
    pub fn new(
        subscription: Arc<dyn Subscription>,
        error_handler: Option<ErrorHandler>,
        control_session_id: i64,
        fragment_limit: usize,
    ) -> Self {
        Self {
            subscription,
            error_handler,
            control_session_id,
            fragment_limit,
            correlation_id: NULL_VALUE,
            remaining_count: 0,
            dispatch_complete: false,
            pending_error: None,
            _kind: PhantomData,
        }
    }

    /// The subscription polled for descriptors.
    #[must_use]
    pub fn subscription(&self) -> &Arc<dyn Subscription> {
        &self.subscription
    }

    /// Arm the poller for one listing.
    pub fn reset(&mut self, correlation_id: i64, expected_count: i32) {
        self.correlation_id = correlation_id;
        self.remaining_count = expected_count;
        self.dispatch_complete = false;
        self.pending_error = None;
    }

    /// Poll, dispatching matching records into `consumer`. Returns the
    /// number of messages consumed.
    pub fn poll(&mut self, consumer: &mut dyn FnMut(&K::Record)) -> Result<usize> {
        self.dispatch_complete = false;

        let subscription = Arc::clone(&self.subscription);
        let fragment_limit = self.fragment_limit;
        let fragments =
            subscription.controlled_poll(&mut |frame| self.on_fragment(frame, consumer), fragment_limit);

        match self.pending_error.take() {
            Some(error) => Err(error),
            None => Ok(fragments),
        }
    }

    fn on_fragment(
        &mut self,
        frame: &[u8],
        consumer: &mut dyn FnMut(&K::Record),
    ) -> ControlledPollAction {
        let message = match decode_control_message(frame) {
            Ok(message) => message,
            Err(error) => {
                self.pending_error = Some(error.into());
                return ControlledPollAction::Break;
            }
        };

        match message {
            ControlMessage::Response(response) => {
                if response.control_session_id == self.control_session_id {
                    if response.code == K::UNKNOWN_CODE
                        && response.correlation_id == self.correlation_id
                    {
                        self.dispatch_complete = true;
                        return ControlledPollAction::Break;
                    }

                    if response.code == ControlResponseCode::Error {
                        let error = ArchiveError::Response {
                            code: ArchiveErrorCode::from_relevant_id(response.relevant_id),
                            message: response.error_message,
                        };

                        if response.correlation_id == self.correlation_id {
                            self.pending_error = Some(error);
                            return ControlledPollAction::Break;
                        }

                        match &self.error_handler {
                            Some(handler) => handler(&error),
                            None => log::debug!(
                                "dropping out-of-band archive error for correlationId={}: {error}",
                                response.correlation_id
                            ),
                        }
                    }
                }
                ControlledPollAction::Continue
            }
            other => {
                if let Some(record) = K::record(other) {
                    let (control_session_id, correlation_id) = K::ids(&record);
                    if control_session_id == self.control_session_id
                        && correlation_id == self.correlation_id
                    {
                        consumer(&record);
                    }

                    self.remaining_count -= 1;
                    if self.remaining_count == 0 {
                        self.dispatch_complete = true;
                        return ControlledPollAction::Break;
                    }
                }
                ControlledPollAction::Continue
            }
        }
    }

    /// True once the listing has terminated, by count or by an
    /// unknown-coded response.
    #[must_use]
    pub fn is_dispatch_complete(&self) -> bool {
        self.dispatch_complete
    }

    /// Records still expected by the active listing.
    #[must_use]
    pub fn remaining_count(&self) -> i32 {
        self.remaining_count
    }

    /// Correlation id of the active listing.
    #[must_use]
    pub fn correlation_id(&self) -> i64 {
        self.correlation_id
    }
}
