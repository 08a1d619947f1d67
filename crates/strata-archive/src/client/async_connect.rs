// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Asynchronous establishment of a control session.
//!
//! [`AsyncConnect`] drives the three-step handshake without blocking:
//! the control-response subscription resolves and connects, the exclusive
//! control-request publication resolves and connects and the connect
//! request is accepted, then the archive's response assigns the control
//! session id. `poll()` is idempotent; call it until it returns `true`,
//! then take the session with [`AsyncConnect::into_client`].
//!
//! [`connect`] wraps the same steps in a busy-polling loop for embedders
//! that want a blocking call.

use std::sync::Arc;

use strata_transport::{Driver, IdleStrategy, NULL_VALUE};

use crate::client::proxy::{ArchiveProxy, DEFAULT_RETRY_ATTEMPTS};
use crate::client::response_poller::ControlResponsePoller;
use crate::client::session::ArchiveClient;
use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, ArchiveErrorCode, Result};

/// In-flight control-session handshake.
pub struct AsyncConnect {
    config: ArchiveConfig,
    driver: Arc<dyn Driver>,
    subscription_id: i64,
    publication_id: i64,
    poller: Option<ControlResponsePoller>,
    proxy: Option<ArchiveProxy>,
    poller_ready: bool,
    proxy_ready: bool,
    correlation_id: i64,
    control_session_id: i64,
    connected: bool,
}

impl AsyncConnect {
    /// Begin a connection attempt: registers the control-response
    /// subscription and the control-request publication with the driver.
    pub fn new(config: ArchiveConfig, driver: Arc<dyn Driver>) -> Self {
        let subscription_id = driver.add_subscription(
            &config.control_response_channel,
            config.control_response_stream_id,
        );
        let publication_id = driver.add_exclusive_publication(
            &config.control_request_channel,
            config.control_request_stream_id,
        );

        Self {
            config,
            driver,
            subscription_id,
            publication_id,
            poller: None,
            proxy: None,
            poller_ready: false,
            proxy_ready: false,
            correlation_id: NULL_VALUE,
            control_session_id: NULL_VALUE,
            connected: false,
        }
    }

    /// Poll for a complete connection. Returns `true` once the archive has
    /// acknowledged the connect request and assigned a control session.
    pub fn poll(&mut self) -> Result<bool> {
        if self.connected {
            return Ok(true);
        }

        if !self.poller_ready {
            if self.poller.is_none() {
                if let Some(subscription) = self.driver.find_subscription(self.subscription_id) {
                    self.poller = Some(ControlResponsePoller::new(subscription));
                }
            }
            if let Some(poller) = &self.poller {
                if poller.subscription().is_connected() {
                    self.poller_ready = true;
                }
            }
        }

        if !self.proxy_ready {
            if self.proxy.is_none() {
                if let Some(publication) = self.driver.find_exclusive_publication(self.publication_id)
                {
                    self.proxy = Some(ArchiveProxy::new(
                        publication,
                        Some(Arc::clone(&self.driver)),
                        self.config.message_timeout,
                        DEFAULT_RETRY_ATTEMPTS,
                    ));
                }
            }
            if let Some(proxy) = &mut self.proxy {
                if self.correlation_id == NULL_VALUE {
                    if proxy.publication().is_connected() {
                        // The correlation id survives failed offers so the
                        // archive sees one logical connect attempt.
                        self.correlation_id = self.driver.next_correlation_id();
                        self.proxy_ready = proxy.try_connect(
                            &self.config.control_response_channel,
                            self.config.control_response_stream_id,
                            self.correlation_id,
                        )?;
                    }
                } else {
                    self.proxy_ready = proxy.try_connect(
                        &self.config.control_response_channel,
                        self.config.control_response_stream_id,
                        self.correlation_id,
                    )?;
                }
            }
        }

        if self.poller_ready && self.proxy_ready {
            if let Some(poller) = &mut self.poller {
                poller.poll()?;

                if poller.is_poll_complete()
                    && poller.correlation_id() == self.correlation_id
                    && poller.is_control_response()
                {
                    if !poller.is_code_ok() {
                        if poller.is_code_error() {
                            return Err(ArchiveError::Response {
                                code: ArchiveErrorCode::from_relevant_id(poller.relevant_id()),
                                message: poller.error_message().to_string(),
                            });
                        }
                        return Err(ArchiveError::UnexpectedResponseCode(poller.code()));
                    }

                    self.control_session_id = poller.control_session_id();
                    self.connected = true;
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    /// Consume the completed handshake into an [`ArchiveClient`].
    ///
    /// Fails if called before [`AsyncConnect::poll`] has returned `true`.
    pub fn into_client(self) -> Result<ArchiveClient> {
        let (Some(poller), Some(proxy), true) = (self.poller, self.proxy, self.connected) else {
            return Err(ArchiveError::InvalidArgument(
                "connect handshake is not complete".to_string(),
            ));
        };

        Ok(ArchiveClient::new(
            &self.config,
            self.control_session_id,
            self.driver,
            poller,
            proxy,
        ))
    }
}

/// Connect to an archive, blocking until the control session is
/// established. Busy-polls with a yielding idle, re-entering the conductor
/// each cycle for agent-invoker transports.
pub fn connect(config: ArchiveConfig, driver: Arc<dyn Driver>) -> Result<ArchiveClient> {
    let idle = IdleStrategy::Yielding;
    let mut pending = AsyncConnect::new(config, Arc::clone(&driver));

    while !pending.poll()? {
        driver.invoke_conductor();
        idle.idle();
    }

    pending.into_client()
}
