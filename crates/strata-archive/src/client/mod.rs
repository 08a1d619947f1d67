// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Control-session protocol engine.
//!
//! - [`proxy::ArchiveProxy`] encodes and offers requests.
//! - [`response_poller::ControlResponsePoller`] decodes one response per
//!   poll.
//! - [`descriptor_poller::DescriptorPoller`] dispatches listing records.
//! - [`session::ArchiveClient`] ties them together under one mutex as the
//!   synchronous command surface.
//! - [`async_connect::AsyncConnect`] drives the connection handshake.
//! - [`replay_merge::ReplayMerge`] stitches a replay onto a live stream.

pub mod async_connect;
pub mod descriptor_poller;
pub mod proxy;
pub mod replay_merge;
pub mod response_poller;
pub mod session;

pub use async_connect::{connect, AsyncConnect};
pub use descriptor_poller::{
    DescriptorKind, DescriptorPoller, RecordingDescriptors, RecordingSubscriptionDescriptors,
};
pub use proxy::{ArchiveProxy, DEFAULT_RETRY_ATTEMPTS, SCRATCH_BUFFER_LENGTH};
pub use replay_merge::{ReplayMerge, ReplayMergeState};
pub use response_poller::{ControlResponsePoller, FRAGMENT_LIMIT};
pub use session::ArchiveClient;
