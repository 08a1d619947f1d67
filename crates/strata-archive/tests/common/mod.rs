// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory transport double for driving the archive client end-to-end.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use strata_archive::protocol::codec::{encode_control_response, encode_recording_descriptor, RecordingDescriptor};
use strata_archive::protocol::ControlResponseCode;
use strata_archive::{ArchiveClient, ArchiveConfig, AsyncConnect};
use strata_transport::{
    ControlledPollAction, CountersReader, Driver, Image, ImageHandler, OfferOutcome, Publication,
    Subscription, NULL_VALUE,
};

#[derive(Debug)]
pub struct MockPublication {
    channel: String,
    stream_id: i32,
    session_id: i32,
    original: bool,
    connected: AtomicBool,
    offers: Mutex<Vec<Vec<u8>>>,
    outcomes: Mutex<VecDeque<OfferOutcome>>,
}

impl MockPublication {
    pub fn new(channel: &str, stream_id: i32, session_id: i32) -> Arc<Self> {
        Self::with_original(channel, stream_id, session_id, true)
    }

    pub fn with_original(
        channel: &str,
        stream_id: i32,
        session_id: i32,
        original: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            channel: channel.to_string(),
            stream_id,
            session_id,
            original,
            connected: AtomicBool::new(true),
            offers: Mutex::new(Vec::new()),
            outcomes: Mutex::new(VecDeque::new()),
        })
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn push_outcome(&self, outcome: OfferOutcome) {
        self.outcomes.lock().push_back(outcome);
    }

    pub fn offered(&self) -> Vec<Vec<u8>> {
        self.offers.lock().clone()
    }

    pub fn offered_count(&self) -> usize {
        self.offers.lock().len()
    }

    pub fn last_offered(&self) -> Option<Vec<u8>> {
        self.offers.lock().last().cloned()
    }
}

impl Publication for MockPublication {
    fn offer(&self, buffer: &[u8]) -> OfferOutcome {
        self.offers.lock().push(buffer.to_vec());
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or(OfferOutcome::Position(buffer.len() as i64))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn is_original(&self) -> bool {
        self.original
    }

    fn session_id(&self) -> i32 {
        self.session_id
    }

    fn stream_id(&self) -> i32 {
        self.stream_id
    }

    fn channel(&self) -> &str {
        &self.channel
    }
}

pub struct MockImage {
    session_id: i32,
    term_buffer_length: i32,
    position: AtomicI64,
}

impl MockImage {
    pub fn new(session_id: i32, term_buffer_length: i32, position: i64) -> Arc<Self> {
        Arc::new(Self {
            session_id,
            term_buffer_length,
            position: AtomicI64::new(position),
        })
    }

    pub fn set_position(&self, position: i64) {
        self.position.store(position, Ordering::SeqCst);
    }
}

impl Image for MockImage {
    fn position(&self) -> i64 {
        self.position.load(Ordering::SeqCst)
    }

    fn term_buffer_length(&self) -> i32 {
        self.term_buffer_length
    }

    fn session_id(&self) -> i32 {
        self.session_id
    }
}

pub struct MockSubscription {
    channel: String,
    stream_id: i32,
    connected: AtomicBool,
    frames: Mutex<VecDeque<Vec<u8>>>,
    images: Mutex<Vec<Arc<MockImage>>>,
    destinations: Mutex<Vec<(String, String)>>,
}

impl MockSubscription {
    pub fn new(channel: &str, stream_id: i32) -> Arc<Self> {
        Arc::new(Self {
            channel: channel.to_string(),
            stream_id,
            connected: AtomicBool::new(true),
            frames: Mutex::new(VecDeque::new()),
            images: Mutex::new(Vec::new()),
            destinations: Mutex::new(Vec::new()),
        })
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn enqueue(&self, frame: Vec<u8>) {
        self.frames.lock().push_back(frame);
    }

    pub fn add_image(&self, image: Arc<MockImage>) {
        self.images.lock().push(image);
    }

    /// `("add" | "remove", endpoint channel)` in call order.
    pub fn destination_log(&self) -> Vec<(String, String)> {
        self.destinations.lock().clone()
    }
}

impl Subscription for MockSubscription {
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
        self.connected.load(Ordering::SeqCst)
    }

    fn channel(&self) -> &str {
        &self.channel
    }

    fn stream_id(&self) -> i32 {
        self.stream_id
    }

    fn image_by_session_id(&self, session_id: i32) -> Option<Arc<dyn Image>> {
        self.images
            .lock()
            .iter()
            .find(|image| image.session_id == session_id)
            .cloned()
            .map(|image| image as Arc<dyn Image>)
    }

    fn add_destination(&self, endpoint_channel: &str) {
        self.destinations
            .lock()
            .push(("add".to_string(), endpoint_channel.to_string()));
    }

    fn remove_destination(&self, endpoint_channel: &str) {
        self.destinations
            .lock()
            .push(("remove".to_string(), endpoint_channel.to_string()));
    }
}

struct EmptyCounters;

impl CountersReader for EmptyCounters {
    fn max_counter_id(&self) -> i32 {
        -1
    }

    fn is_allocated(&self, _counter_id: i32) -> bool {
        false
    }

    fn counter_type_id(&self, _counter_id: i32) -> i32 {
        -1
    }

    fn counter_key(&self, _counter_id: i32) -> Vec<u8> {
        Vec::new()
    }

    fn counter_value(&self, _counter_id: i32) -> i64 {
        0
    }
}

pub struct MockDriver {
    next_correlation_id: AtomicI64,
    next_registration_id: AtomicI64,
    conductor_invocations: AtomicUsize,
    staged_subscriptions: Mutex<VecDeque<Arc<MockSubscription>>>,
    staged_publications: Mutex<VecDeque<Arc<MockPublication>>>,
    subscriptions: Mutex<HashMap<i64, Arc<MockSubscription>>>,
    publications: Mutex<HashMap<i64, Arc<MockPublication>>>,
    subscription_requests: Mutex<Vec<(String, i32)>>,
    counters: Arc<EmptyCounters>,
}

impl MockDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_correlation_id: AtomicI64::new(100),
            next_registration_id: AtomicI64::new(1),
            conductor_invocations: AtomicUsize::new(0),
            staged_subscriptions: Mutex::new(VecDeque::new()),
            staged_publications: Mutex::new(VecDeque::new()),
            subscriptions: Mutex::new(HashMap::new()),
            publications: Mutex::new(HashMap::new()),
            subscription_requests: Mutex::new(Vec::new()),
            counters: Arc::new(EmptyCounters),
        })
    }

    /// The next `add_subscription` hands out this mock.
    pub fn stage_subscription(&self, subscription: Arc<MockSubscription>) {
        self.staged_subscriptions.lock().push_back(subscription);
    }

    /// The next `add_publication`/`add_exclusive_publication` hands out
    /// this mock.
    pub fn stage_publication(&self, publication: Arc<MockPublication>) {
        self.staged_publications.lock().push_back(publication);
    }

    /// Correlation id the next command will mint.
    pub fn peek_next_correlation_id(&self) -> i64 {
        self.next_correlation_id.load(Ordering::SeqCst)
    }

    pub fn conductor_invocations(&self) -> usize {
        self.conductor_invocations.load(Ordering::SeqCst)
    }

    /// `(channel, stream_id)` of every subscription added, in order.
    pub fn subscription_requests(&self) -> Vec<(String, i32)> {
        self.subscription_requests.lock().clone()
    }

    fn register_subscription(&self, channel: &str, stream_id: i32) -> i64 {
        self.subscription_requests
            .lock()
            .push((channel.to_string(), stream_id));
        let subscription = self
            .staged_subscriptions
            .lock()
            .pop_front()
            .unwrap_or_else(|| MockSubscription::new(channel, stream_id));
        let registration_id = self.next_registration_id.fetch_add(1, Ordering::SeqCst);
        self.subscriptions.lock().insert(registration_id, subscription);
        registration_id
    }

    fn register_publication(&self, channel: &str, stream_id: i32) -> i64 {
        let publication = self
            .staged_publications
            .lock()
            .pop_front()
            .unwrap_or_else(|| MockPublication::new(channel, stream_id, 0));
        let registration_id = self.next_registration_id.fetch_add(1, Ordering::SeqCst);
        self.publications.lock().insert(registration_id, publication);
        registration_id
    }
}

impl Driver for MockDriver {
    fn next_correlation_id(&self) -> i64 {
        self.next_correlation_id.fetch_add(1, Ordering::SeqCst)
    }

    fn add_subscription(&self, channel: &str, stream_id: i32) -> i64 {
        self.register_subscription(channel, stream_id)
    }

    fn add_subscription_with_handlers(
        &self,
        channel: &str,
        stream_id: i32,
        _on_available_image: ImageHandler,
        _on_unavailable_image: ImageHandler,
    ) -> i64 {
        self.register_subscription(channel, stream_id)
    }

    fn find_subscription(&self, registration_id: i64) -> Option<Arc<dyn Subscription>> {
        self.subscriptions
            .lock()
            .get(&registration_id)
            .cloned()
            .map(|subscription| subscription as Arc<dyn Subscription>)
    }

    fn add_publication(&self, channel: &str, stream_id: i32) -> i64 {
        self.register_publication(channel, stream_id)
    }

    fn find_publication(&self, registration_id: i64) -> Option<Arc<dyn Publication>> {
        self.publications
            .lock()
            .get(&registration_id)
            .cloned()
            .map(|publication| publication as Arc<dyn Publication>)
    }

    fn add_exclusive_publication(&self, channel: &str, stream_id: i32) -> i64 {
        self.register_publication(channel, stream_id)
    }

    fn find_exclusive_publication(&self, registration_id: i64) -> Option<Arc<dyn Publication>> {
        self.find_publication(registration_id)
    }

    fn invoke_conductor(&self) {
        self.conductor_invocations.fetch_add(1, Ordering::SeqCst);
    }

    fn counters(&self) -> Arc<dyn CountersReader> {
        Arc::clone(&self.counters) as Arc<dyn CountersReader>
    }
}

/// The transport doubles behind a connected client.
pub struct TestTransport {
    pub driver: Arc<MockDriver>,
    pub request_publication: Arc<MockPublication>,
    pub response_subscription: Arc<MockSubscription>,
}

impl TestTransport {
    pub fn enqueue_response(
        &self,
        control_session_id: i64,
        correlation_id: i64,
        relevant_id: i64,
        code: ControlResponseCode,
        error_message: &str,
    ) {
        self.response_subscription.enqueue(control_response_frame(
            control_session_id,
            correlation_id,
            relevant_id,
            code,
            error_message,
        ));
    }
}

pub fn control_response_frame(
    control_session_id: i64,
    correlation_id: i64,
    relevant_id: i64,
    code: ControlResponseCode,
    error_message: &str,
) -> Vec<u8> {
    let mut buf = [0u8; 512];
    let length = encode_control_response(
        &mut buf,
        control_session_id,
        correlation_id,
        relevant_id,
        code,
        error_message,
    )
    .expect("encode control response");
    buf[..length].to_vec()
}

pub fn recording_descriptor_frame(
    control_session_id: i64,
    correlation_id: i64,
    recording_id: i64,
) -> Vec<u8> {
    let descriptor = RecordingDescriptor {
        control_session_id,
        correlation_id,
        recording_id,
        start_timestamp: 1_000 + recording_id,
        stop_timestamp: NULL_VALUE,
        start_position: 0,
        stop_position: NULL_VALUE,
        initial_term_id: 0,
        segment_file_length: 128 * 1024 * 1024,
        term_buffer_length: 64 * 1024,
        mtu_length: 1408,
        session_id: 1,
        stream_id: 42,
        stripped_channel: "aeron:udp?endpoint=localhost:9000".to_string(),
        original_channel: "aeron:udp?endpoint=localhost:9000".to_string(),
        source_identity: "127.0.0.1:40123".to_string(),
    };
    let mut buf = [0u8; 512];
    let length = encode_recording_descriptor(&mut buf, &descriptor).expect("encode descriptor");
    buf[..length].to_vec()
}

/// Control session id assigned by the mock archive during the handshake.
pub const CONTROL_SESSION_ID: i64 = 7;

/// Drive a full handshake against staged mocks and return the connected
/// client with its transport doubles.
pub fn connected_client(config: ArchiveConfig) -> (TestTransport, ArchiveClient) {
    let driver = MockDriver::new();

    let response_subscription =
        MockSubscription::new(&config.control_response_channel, config.control_response_stream_id);
    let request_publication =
        MockPublication::new(&config.control_request_channel, config.control_request_stream_id, 1);

    driver.stage_subscription(Arc::clone(&response_subscription));
    driver.stage_publication(Arc::clone(&request_publication));

    let mut pending = AsyncConnect::new(config, Arc::clone(&driver) as Arc<dyn Driver>);

    // First poll: resolves both resources and offers the connect request.
    assert!(!pending.poll().expect("handshake poll"));
    let connect_frame = request_publication
        .last_offered()
        .expect("connect request offered");
    let correlation_id =
        match strata_archive::protocol::codec::decode_request(&connect_frame).expect("decode connect") {
            strata_archive::protocol::codec::RequestMessage::Connect { correlation_id, .. } => {
                correlation_id
            }
            other => panic!("expected connect request, got {other:?}"),
        };

    response_subscription.enqueue(control_response_frame(
        CONTROL_SESSION_ID,
        correlation_id,
        0,
        ControlResponseCode::Ok,
        "",
    ));

    assert!(pending.poll().expect("handshake completion"));
    let client = pending.into_client().expect("client");
    assert_eq!(client.control_session_id(), CONTROL_SESSION_ID);

    let transport = TestTransport {
        driver,
        request_publication,
        response_subscription,
    };
    (transport, client)
}
