// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Control-session integration tests against the in-memory transport.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{connected_client, MockPublication, CONTROL_SESSION_ID};
use strata_archive::protocol::codec::{decode_request, RequestMessage};
use strata_archive::protocol::ControlResponseCode;
use strata_archive::{ArchiveConfig, ArchiveError, ArchiveErrorCode, ErrorHandler, SourceLocation};
use strata_transport::OfferOutcome;

fn short_timeout_config() -> ArchiveConfig {
    ArchiveConfig::new().message_timeout(Duration::from_millis(100))
}

#[test]
fn test_connect_handshake_assigns_control_session() {
    let config = ArchiveConfig::new()
        .control_response_channel("aeron:udp?endpoint=localhost:8020|session-id=9999")
        .control_response_stream_id(20);
    let (transport, client) = connected_client(config);

    assert_eq!(client.control_session_id(), CONTROL_SESSION_ID);

    // Exactly one request (the connect) has been offered so far, and it
    // advertised the response stream back to the archive.
    let offered = transport.request_publication.offered();
    assert_eq!(offered.len(), 1);
    match decode_request(&offered[0]).expect("decode") {
        RequestMessage::Connect {
            response_stream_id,
            response_channel,
            ..
        } => {
            assert_eq!(response_stream_id, 20);
            assert_eq!(response_channel, "aeron:udp?endpoint=localhost:8020|session-id=9999");
        }
        other => panic!("unexpected request: {other:?}"),
    }
}

#[test]
fn test_start_recording_returns_relevant_id() {
    let (transport, client) = connected_client(short_timeout_config());

    let correlation_id = transport.driver.peek_next_correlation_id();
    transport.enqueue_response(CONTROL_SESSION_ID, correlation_id, 1234, ControlResponseCode::Ok, "");

    let subscription_id = client
        .start_recording("aeron:udp?endpoint=localhost:9000", 42, SourceLocation::Local)
        .expect("start recording");
    assert_eq!(subscription_id, 1234);

    let request = transport.request_publication.last_offered().expect("request offered");
    match decode_request(&request).expect("decode") {
        RequestMessage::StartRecording {
            control_session_id,
            correlation_id: sent_correlation_id,
            stream_id,
            source_location,
            channel,
        } => {
            assert_eq!(control_session_id, CONTROL_SESSION_ID);
            assert_eq!(sent_correlation_id, correlation_id);
            assert_eq!(stream_id, 42);
            assert_eq!(source_location, SourceLocation::Local);
            assert_eq!(channel, "aeron:udp?endpoint=localhost:9000");
        }
        other => panic!("unexpected request: {other:?}"),
    }
}

#[test]
fn test_archive_error_response_raises_typed_error() {
    let (transport, client) = connected_client(short_timeout_config());

    let correlation_id = transport.driver.peek_next_correlation_id();
    transport.enqueue_response(
        CONTROL_SESSION_ID,
        correlation_id,
        ArchiveErrorCode::MaxRecordings.as_relevant_id(),
        ControlResponseCode::Error,
        "limit reached",
    );

    let err = client
        .start_recording("aeron:udp?endpoint=localhost:9000", 42, SourceLocation::Local)
        .expect_err("archive error");
    match err {
        ArchiveError::Response { code, message } => {
            assert_eq!(code, ArchiveErrorCode::MaxRecordings);
            assert!(message.contains("limit reached"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_list_recordings_terminates_early_on_recording_unknown() {
    let (transport, client) = connected_client(short_timeout_config());

    let correlation_id = transport.driver.peek_next_correlation_id();
    for recording_id in 0..3 {
        transport.response_subscription.enqueue(common::recording_descriptor_frame(
            CONTROL_SESSION_ID,
            correlation_id,
            recording_id,
        ));
    }
    transport.enqueue_response(
        CONTROL_SESSION_ID,
        correlation_id,
        0,
        ControlResponseCode::RecordingUnknown,
        "",
    );

    let mut seen = Vec::new();
    let count = client
        .list_recordings(0, 10, &mut |descriptor| {
            assert_eq!(descriptor.control_session_id, CONTROL_SESSION_ID);
            assert_eq!(descriptor.correlation_id, correlation_id);
            seen.push(descriptor.recording_id);
        })
        .expect("list recordings");

    assert_eq!(count, 3);
    assert_eq!(seen, vec![0, 1, 2]);
}

#[test]
fn test_list_recordings_full_count() {
    let (transport, client) = connected_client(short_timeout_config());

    let correlation_id = transport.driver.peek_next_correlation_id();
    for recording_id in 0..2 {
        transport.response_subscription.enqueue(common::recording_descriptor_frame(
            CONTROL_SESSION_ID,
            correlation_id,
            recording_id,
        ));
    }

    let mut seen = 0;
    let count = client
        .list_recordings(0, 2, &mut |_| seen += 1)
        .expect("list recordings");
    assert_eq!(count, 2);
    assert_eq!(seen, 2);
}

#[test]
fn test_command_times_out_without_response() {
    let (_transport, client) = connected_client(short_timeout_config());

    let err = client.get_recording_position(99).expect_err("timeout");
    match err {
        ArchiveError::Timeout(message) => assert!(message.contains("correlationId")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_disconnected_response_channel_raises() {
    let (transport, client) = connected_client(short_timeout_config());

    transport.response_subscription.set_connected(false);
    let err = client.get_recording_position(99).expect_err("disconnect");
    assert!(matches!(err, ArchiveError::ResponseChannelDisconnected));
}

#[test]
fn test_back_pressure_exhaustion_raises_send_failed() {
    let (transport, client) = connected_client(short_timeout_config());

    for _ in 0..3 {
        transport.request_publication.push_outcome(OfferOutcome::BackPressured);
    }

    let err = client.get_stop_position(5).expect_err("send failed");
    match err {
        ArchiveError::SendFailed(request) => assert_eq!(request, "get stop position"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_responses_for_other_sessions_are_skipped() {
    let (transport, client) = connected_client(short_timeout_config());

    let correlation_id = transport.driver.peek_next_correlation_id();
    // A response for some other session arrives first and is ignored.
    transport.enqueue_response(99, correlation_id, 5555, ControlResponseCode::Ok, "");
    transport.enqueue_response(CONTROL_SESSION_ID, correlation_id, 4096, ControlResponseCode::Ok, "");

    let position = client.get_recording_position(12).expect("position");
    assert_eq!(position, 4096);
}

#[test]
fn test_out_of_band_error_goes_to_handler() {
    let forwarded = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&forwarded);
    let handler: ErrorHandler = Arc::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let config = short_timeout_config().error_handler(handler);
    let (transport, client) = connected_client(config);

    let correlation_id = transport.driver.peek_next_correlation_id();
    // Error for an older request on this session, then our answer.
    transport.enqueue_response(
        CONTROL_SESSION_ID,
        correlation_id - 50,
        0,
        ControlResponseCode::Error,
        "stale failure",
    );
    transport.enqueue_response(CONTROL_SESSION_ID, correlation_id, 10, ControlResponseCode::Ok, "");

    let position = client.get_recording_position(12).expect("position");
    assert_eq!(position, 10);
    assert_eq!(forwarded.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unexpected_response_code_is_fatal() {
    let (transport, client) = connected_client(short_timeout_config());

    let correlation_id = transport.driver.peek_next_correlation_id();
    transport.enqueue_response(
        CONTROL_SESSION_ID,
        correlation_id,
        0,
        ControlResponseCode::RecordingUnknown,
        "",
    );

    let err = client.get_recording_position(12).expect_err("unexpected code");
    assert!(matches!(err, ArchiveError::UnexpectedResponseCode(_)));
}

#[test]
fn test_replay_adds_session_scoped_subscription() {
    let (transport, client) = connected_client(short_timeout_config());

    // Replay session id with high bits set; the subscription must be
    // scoped to the lower 32 bits.
    let replay_session_id: i64 = (77 << 32) | 4242;
    let correlation_id = transport.driver.peek_next_correlation_id();
    transport.enqueue_response(
        CONTROL_SESSION_ID,
        correlation_id,
        replay_session_id,
        ControlResponseCode::Ok,
        "",
    );

    client
        .replay(12, 0, i64::MAX, "aeron:udp?endpoint=localhost:9100", 88)
        .expect("replay");

    let requests = transport.driver.subscription_requests();
    let (channel, stream_id) = requests.last().expect("subscription added");
    assert_eq!(channel, "aeron:udp?endpoint=localhost:9100|session-id=4242");
    assert_eq!(*stream_id, 88);
}

#[test]
fn test_add_recorded_publication_scopes_channel_to_session() {
    let (transport, client) = connected_client(short_timeout_config());

    let publication = MockPublication::new("aeron:udp?endpoint=localhost:9000", 42, 555);
    transport.driver.stage_publication(Arc::clone(&publication));

    let correlation_id = transport.driver.peek_next_correlation_id();
    transport.enqueue_response(CONTROL_SESSION_ID, correlation_id, 1, ControlResponseCode::Ok, "");

    let recorded = client
        .add_recorded_publication("aeron:udp?endpoint=localhost:9000", 42)
        .expect("recorded publication");
    assert_eq!(recorded.session_id(), 555);

    let request = transport.request_publication.last_offered().expect("request offered");
    match decode_request(&request).expect("decode") {
        RequestMessage::StartRecording {
            channel,
            source_location,
            ..
        } => {
            assert_eq!(channel, "aeron:udp?endpoint=localhost:9000|session-id=555");
            assert_eq!(source_location, SourceLocation::Local);
        }
        other => panic!("unexpected request: {other:?}"),
    }
}

#[test]
fn test_add_recorded_publication_rejects_non_original_session() {
    let (transport, client) = connected_client(short_timeout_config());

    let publication =
        MockPublication::with_original("aeron:udp?endpoint=localhost:9000", 42, 556, false);
    transport.driver.stage_publication(publication);

    let before = transport.request_publication.offered_count();
    let err = client
        .add_recorded_publication("aeron:udp?endpoint=localhost:9000", 42)
        .expect_err("duplicate session");
    assert!(matches!(err, ArchiveError::InvalidArgument(_)));
    // No recording request was sent.
    assert_eq!(transport.request_publication.offered_count(), before);
}

#[test]
fn test_poll_for_error_response_only_reports_session_errors() {
    let (transport, client) = connected_client(short_timeout_config());

    assert_eq!(client.poll_for_error_response().expect("poll"), None);

    transport.enqueue_response(CONTROL_SESSION_ID, 9999, 0, ControlResponseCode::Error, "deferred failure");
    assert_eq!(
        client.poll_for_error_response().expect("poll"),
        Some("deferred failure".to_string())
    );
}

#[test]
fn test_drop_offers_close_session() {
    let (transport, client) = connected_client(short_timeout_config());

    drop(client);

    let request = transport.request_publication.last_offered().expect("close offered");
    match decode_request(&request).expect("decode") {
        RequestMessage::CloseSession { control_session_id } => {
            assert_eq!(control_session_id, CONTROL_SESSION_ID);
        }
        other => panic!("unexpected request: {other:?}"),
    }
}

#[test]
fn test_exactly_one_request_per_command() {
    let (transport, client) = connected_client(short_timeout_config());

    let before = transport.request_publication.offered_count();
    let correlation_id = transport.driver.peek_next_correlation_id();
    transport.enqueue_response(CONTROL_SESSION_ID, correlation_id, 0, ControlResponseCode::Ok, "");
    client.truncate_recording(3, 0).expect("truncate");

    assert_eq!(transport.request_publication.offered_count(), before + 1);
}
