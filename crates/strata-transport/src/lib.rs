// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # strata-transport - Transport Contract
//!
//! The contract a low-latency publish/subscribe transport must satisfy to
//! carry the strata archive control protocol. The archive client never talks
//! to a network itself; it drives these traits, and the embedding application
//! supplies an implementation (a real media driver binding, or an in-memory
//! double for tests).
//!
//! ## Model
//!
//! - A [`Publication`] is a one-way outbound stream. Offering a message
//!   either succeeds with a new stream position or reports a sentinel
//!   condition ([`OfferOutcome`]).
//! - A [`Subscription`] is a one-way inbound stream polled with a fragment
//!   handler. Controlled polling lets the handler stop after a message of
//!   interest ([`ControlledPollAction`]).
//! - An [`Image`] is the materialized per-sender view on a subscription,
//!   exposing the consumer position and term buffer geometry.
//! - A [`Driver`] is the handle to the transport's conductor: two-step
//!   registration/resolution of publications and subscriptions, correlation
//!   id minting, and the counters registry.
//!
//! Fragment assembly is the transport's responsibility: handlers always see
//! whole messages.

pub mod channel;
pub mod idle;

use std::sync::Arc;

pub use channel::{add_session_id, ChannelUri, ChannelUriError};
pub use idle::IdleStrategy;

/// Reserved "none" for correlation ids, registration ids and recording ids.
pub const NULL_VALUE: i64 = -1;

/// A position that has not been set or is not known.
pub const NULL_POSITION: i64 = NULL_VALUE;

/// A timestamp that has not been set.
pub const NULL_TIMESTAMP: i64 = NULL_VALUE;

/// A length that has not been set. Replays interpret it as "whole stream".
pub const NULL_LENGTH: i64 = NULL_VALUE;

/// Result of offering a message to a [`Publication`].
///
/// `Position` is the only success: the stream position after the message.
/// Every other variant is a sentinel condition the caller must handle;
/// `BackPressured` and `AdminAction` are transient, the rest are terminal
/// for the publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    /// Message accepted; the new stream position (always > 0).
    Position(i64),
    /// The subscribers have no free space; retry later.
    BackPressured,
    /// No subscriber is connected to receive the message.
    NotConnected,
    /// The conductor is performing administrative work; retry later.
    AdminAction,
    /// The publication has been closed and can accept nothing further.
    Closed,
    /// The stream reached the maximum position it can ever carry.
    MaxPositionExceeded,
}

impl OfferOutcome {
    /// True iff the offer was accepted.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, OfferOutcome::Position(_))
    }
}

/// Verdict returned by a controlled-poll fragment handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlledPollAction {
    /// Consume the fragment and keep polling.
    Continue,
    /// Consume the fragment, then stop the poll.
    Break,
    /// Do not consume the fragment; stop the poll. The fragment is
    /// redelivered on the next poll.
    Abort,
    /// Consume the fragment, commit the position, and keep polling.
    Commit,
}

/// One-way outbound message stream.
pub trait Publication: Send + Sync + std::fmt::Debug {
    /// Offer one framed message. The buffer is not retained.
    fn offer(&self, buffer: &[u8]) -> OfferOutcome;

    /// True while at least one subscriber is connected.
    fn is_connected(&self) -> bool;

    /// True iff this publication is the first for its channel/stream pair
    /// rather than a handle onto an existing session.
    fn is_original(&self) -> bool;

    /// Transport session id of this publication.
    fn session_id(&self) -> i32;

    /// Stream id within the channel.
    fn stream_id(&self) -> i32;

    /// Channel URI this publication was added with.
    fn channel(&self) -> &str;
}

/// Materialized per-sender view on a subscription.
pub trait Image: Send + Sync {
    /// Position this image's consumer has reached.
    fn position(&self) -> i64;

    /// Term buffer length of the underlying log, in bytes.
    fn term_buffer_length(&self) -> i32;

    /// Transport session id of the sender.
    fn session_id(&self) -> i32;
}

/// One-way inbound message stream.
pub trait Subscription: Send + Sync {
    /// Poll up to `fragment_limit` whole messages into the handler.
    /// Returns the number of messages delivered.
    fn poll(&self, handler: &mut dyn FnMut(&[u8]), fragment_limit: usize) -> usize;

    /// Poll up to `fragment_limit` whole messages, letting the handler stop
    /// or rewind the poll. Returns the number of messages delivered.
    fn controlled_poll(
        &self,
        handler: &mut dyn FnMut(&[u8]) -> ControlledPollAction,
        fragment_limit: usize,
    ) -> usize;

    /// True while at least one publisher image is connected.
    fn is_connected(&self) -> bool;

    /// Channel URI this subscription was added with.
    fn channel(&self) -> &str;

    /// Stream id within the channel.
    fn stream_id(&self) -> i32;

    /// Look up the image for a given sender session id, if materialized.
    fn image_by_session_id(&self, session_id: i32) -> Option<Arc<dyn Image>>;

    /// Add an endpoint to a `control-mode=manual` subscription.
    fn add_destination(&self, endpoint_channel: &str);

    /// Remove an endpoint from a `control-mode=manual` subscription.
    fn remove_destination(&self, endpoint_channel: &str);
}

/// Callback invoked when an image becomes available or unavailable on a
/// subscription added with [`Driver::add_subscription_with_handlers`].
pub type ImageHandler = Arc<dyn Fn(&dyn Image) + Send + Sync>;

/// Read access to the transport's counters registry.
///
/// Counters are identified by a dense counter id; each allocated counter has
/// a type id, an opaque key written by whoever allocated it, and a value.
pub trait CountersReader: Send + Sync {
    /// Highest counter id that may be in use.
    fn max_counter_id(&self) -> i32;

    /// True iff the counter id refers to an allocated counter.
    fn is_allocated(&self, counter_id: i32) -> bool;

    /// Type id of an allocated counter; unspecified otherwise.
    fn counter_type_id(&self, counter_id: i32) -> i32;

    /// Key bytes of an allocated counter; empty otherwise.
    fn counter_key(&self, counter_id: i32) -> Vec<u8>;

    /// Current value of the counter.
    fn counter_value(&self, counter_id: i32) -> i64;
}

/// Handle to the transport conductor.
///
/// Publications and subscriptions are registered asynchronously: `add_*`
/// returns a registration id immediately and the matching `find_*` yields
/// the resolved resource once the conductor has materialized it.
pub trait Driver: Send + Sync {
    /// Mint a fresh, monotonically increasing correlation id.
    fn next_correlation_id(&self) -> i64;

    /// Register a subscription; returns its registration id.
    fn add_subscription(&self, channel: &str, stream_id: i32) -> i64;

    /// Register a subscription with image lifecycle handlers.
    fn add_subscription_with_handlers(
        &self,
        channel: &str,
        stream_id: i32,
        on_available_image: ImageHandler,
        on_unavailable_image: ImageHandler,
    ) -> i64;

    /// Resolve a registered subscription once the conductor has it ready.
    fn find_subscription(&self, registration_id: i64) -> Option<Arc<dyn Subscription>>;

    /// Register a (shared-session) publication; returns its registration id.
    fn add_publication(&self, channel: &str, stream_id: i32) -> i64;

    /// Resolve a registered publication once the conductor has it ready.
    fn find_publication(&self, registration_id: i64) -> Option<Arc<dyn Publication>>;

    /// Register an exclusive publication; returns its registration id.
    fn add_exclusive_publication(&self, channel: &str, stream_id: i32) -> i64;

    /// Resolve a registered exclusive publication.
    fn find_exclusive_publication(&self, registration_id: i64) -> Option<Arc<dyn Publication>>;

    /// Run one duty cycle of the conductor when it is configured to run on
    /// the caller's thread (agent-invoker mode). No-op otherwise.
    fn invoke_conductor(&self);

    /// The counters registry.
    fn counters(&self) -> Arc<dyn CountersReader>;
}
