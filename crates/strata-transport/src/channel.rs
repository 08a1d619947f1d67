// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Channel URI parsing and manipulation.
//!
//! Channel URIs have the form `scheme:media?key=value|key=value`, e.g.
//! `aeron:udp?endpoint=localhost:8010|mtu=1408`. The archive client needs to
//! read parameters (`control-mode` for manual multi-destination
//! subscriptions) and to scope a channel to a transport session with
//! [`add_session_id`].

use thiserror::Error;

/// URI scheme every channel must carry.
pub const URI_SCHEME: &str = "aeron";

/// Parameter naming the multi-destination control mode.
pub const CONTROL_MODE_PARAM: &str = "control-mode";

/// `control-mode` value for manual destination management.
pub const CONTROL_MODE_MANUAL: &str = "manual";

/// Parameter scoping a channel to one transport session.
pub const SESSION_ID_PARAM: &str = "session-id";

/// Errors raised while parsing a channel URI.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelUriError {
    #[error("channel must start with '{URI_SCHEME}:': {0}")]
    MissingScheme(String),

    #[error("channel has an empty media: {0}")]
    EmptyMedia(String),

    #[error("channel parameter is not key=value: {0}")]
    MalformedParam(String),
}

/// Parsed channel URI.
///
/// Parameters keep their source order; lookups are linear, which is fine for
/// the handful of parameters a control channel carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUri {
    media: String,
    params: Vec<(String, String)>,
}

impl ChannelUri {
    /// Parse a `scheme:media?key=value|key=value` URI.
    pub fn parse(uri: &str) -> Result<Self, ChannelUriError> {
        let rest = uri
            .strip_prefix(URI_SCHEME)
            .and_then(|r| r.strip_prefix(':'))
            .ok_or_else(|| ChannelUriError::MissingScheme(uri.to_string()))?;

        let (media, query) = match rest.split_once('?') {
            Some((media, query)) => (media, Some(query)),
            None => (rest, None),
        };

        if media.is_empty() {
            return Err(ChannelUriError::EmptyMedia(uri.to_string()));
        }

        let mut params = Vec::new();
        if let Some(query) = query {
            for pair in query.split('|').filter(|p| !p.is_empty()) {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| ChannelUriError::MalformedParam(pair.to_string()))?;
                params.push((key.to_string(), value.to_string()));
            }
        }

        Ok(Self {
            media: media.to_string(),
            params,
        })
    }

    /// Media part of the URI (`udp`, `ipc`, ...).
    #[must_use]
    pub fn media(&self) -> &str {
        &self.media
    }

    /// First value for a parameter key, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// True iff the URI declares `control-mode=manual`.
    #[must_use]
    pub fn is_manual_control_mode(&self) -> bool {
        self.get(CONTROL_MODE_PARAM) == Some(CONTROL_MODE_MANUAL)
    }
}

/// Scope a channel URI to one transport session.
///
/// Appends `?session-id=<id>` when the URI has no query part yet, otherwise
/// `|session-id=<id>`. The parameter is appended, never deduplicated:
/// applying this twice yields two `session-id` parameters.
#[must_use]
pub fn add_session_id(channel: &str, session_id: i32) -> String {
    let separator = if channel.contains('?') { '|' } else { '?' };
    format!("{channel}{separator}{SESSION_ID_PARAM}={session_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_media_and_params() {
        let uri = ChannelUri::parse("aeron:udp?endpoint=localhost:8010|mtu=1408").expect("parse");
        assert_eq!(uri.media(), "udp");
        assert_eq!(uri.get("endpoint"), Some("localhost:8010"));
        assert_eq!(uri.get("mtu"), Some("1408"));
        assert_eq!(uri.get("absent"), None);
    }

    #[test]
    fn test_parse_no_query() {
        let uri = ChannelUri::parse("aeron:ipc").expect("parse");
        assert_eq!(uri.media(), "ipc");
        assert_eq!(uri.get("endpoint"), None);
    }

    #[test]
    fn test_parse_rejects_missing_scheme() {
        assert!(matches!(
            ChannelUri::parse("udp?endpoint=localhost:8010"),
            Err(ChannelUriError::MissingScheme(_))
        ));
    }

    #[test]
    fn test_parse_rejects_bare_param() {
        assert!(matches!(
            ChannelUri::parse("aeron:udp?sparse"),
            Err(ChannelUriError::MalformedParam(_))
        ));
    }

    #[test]
    fn test_manual_control_mode_detection() {
        let manual = ChannelUri::parse("aeron:udp?control-mode=manual").expect("parse");
        assert!(manual.is_manual_control_mode());

        let dynamic =
            ChannelUri::parse("aeron:udp?control-mode=dynamic|control=localhost:8030").expect("parse");
        assert!(!dynamic.is_manual_control_mode());
    }

    #[test]
    fn test_add_session_id_without_query() {
        assert_eq!(
            add_session_id("aeron:udp", 77),
            "aeron:udp?session-id=77"
        );
    }

    #[test]
    fn test_add_session_id_with_query() {
        assert_eq!(
            add_session_id("aeron:udp?endpoint=localhost:9000", -5),
            "aeron:udp?endpoint=localhost:9000|session-id=-5"
        );
    }

    #[test]
    fn test_add_session_id_appends_no_dedupe() {
        let once = add_session_id("aeron:udp", 7);
        let twice = add_session_id(&once, 7);
        assert_eq!(twice, "aeron:udp?session-id=7|session-id=7");
        assert_eq!(twice.matches(SESSION_ID_PARAM).count(), 2);
    }
}
