// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # strata-archive - Archive Control Client
//!
//! Client-side control plane for a stream archive layered on a low-latency
//! publish/subscribe transport. The archive records streams to durable
//! storage and replays them on demand; this crate opens a control session,
//! issues commands (start/stop/extend recording, replay, list, truncate)
//! and correlates the responses the archive delivers asynchronously on a
//! separate response stream.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strata_archive::{connect, ArchiveConfig, SourceLocation};
//! use strata_transport::Driver;
//!
//! fn record(driver: Arc<dyn Driver>) -> strata_archive::Result<()> {
//!     let archive = connect(ArchiveConfig::new(), driver)?;
//!
//!     let subscription_id = archive.start_recording(
//!         "aeron:udp?endpoint=localhost:9000",
//!         42,
//!         SourceLocation::Local,
//!     )?;
//!
//!     // ... publish traffic on the recorded channel ...
//!
//!     archive.stop_recording_subscription(subscription_id)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                        Embedding Application                       |
//! +--------------------------------------------------------------------+
//! |  ArchiveClient (session controller, one request in flight)         |
//! |    AsyncConnect -> handshake     ReplayMerge -> live cutover       |
//! +--------------------------------------------------------------------+
//! |  ArchiveProxy   ControlResponsePoller   DescriptorPoller x2        |
//! |  (encode+offer) (one response per poll) (listing dispatch)         |
//! +--------------------------------------------------------------------+
//! |  protocol::codec - fixed little-endian framing, tagged decode      |
//! +--------------------------------------------------------------------+
//! |  strata-transport - publications, subscriptions, images, counters  |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Scheduling Model
//!
//! The engine spawns no threads. Commands busy-poll with a yielding idle
//! until response, timeout or disconnect; the long-running pieces
//! ([`AsyncConnect`], [`ReplayMerge`]) are pollable state machines the
//! embedder drives from its own duty cycle.

/// Control-session protocol engine (proxy, pollers, session, handshake,
/// replay merge).
pub mod client;
/// Configuration defaults and the client semantic version.
pub mod config;
/// Error taxonomy of the client.
pub mod error;
/// Recording progress events (started/progress/stopped).
pub mod events;
/// Wire protocol constants and codec.
pub mod protocol;
/// Recording-position counters in the transport's counters registry.
pub mod status;

pub use client::{
    connect, ArchiveClient, ArchiveProxy, AsyncConnect, ControlResponsePoller, DescriptorPoller,
    RecordingDescriptors, RecordingSubscriptionDescriptors, ReplayMerge, ReplayMergeState,
};
pub use config::ArchiveConfig;
pub use error::{ArchiveError, ArchiveErrorCode, ErrorHandler, Result};
pub use events::{RecordingEventsAdapter, RecordingEventsListener};
pub use protocol::codec::{RecordingDescriptor, RecordingSubscriptionDescriptor};
pub use protocol::{ControlResponseCode, SourceLocation};

/// Client version string.
pub const VERSION: &str = "0.2.1";
