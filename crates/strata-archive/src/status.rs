// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Recording-position counters.
//!
//! The archive publishes the position of each active recording through a
//! counter in the transport's counters registry. The counter key layout:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +---------------------------------------------------------------+
//! |                         Recording ID                          |
//! |                                                               |
//! +---------------------------------------------------------------+
//! |                          Session ID                           |
//! +---------------------------------------------------------------+
//! |                    (alignment padding)                        |
//! +---------------------------------------------------------------+
//! |                    Source Identity Length                     |
//! +---------------------------------------------------------------+
//! |                  Source Identity (UTF-8) ...                  |
//! +---------------------------------------------------------------+
//! ```

use strata_transport::CountersReader;

/// Type id of a recording position counter.
pub const RECORDING_POSITION_TYPE_ID: i32 = 100;

/// Counter id returned when no counter matches.
pub const NULL_COUNTER_ID: i32 = -1;

/// Recording id returned when a counter does not name one.
pub const NULL_RECORDING_ID: i64 = -1;

const RECORDING_ID_OFFSET: usize = 0;
const SESSION_ID_OFFSET: usize = 8;
const SOURCE_IDENTITY_LENGTH_OFFSET: usize = 16;
const SOURCE_IDENTITY_OFFSET: usize = 20;

fn key_i64(key: &[u8], offset: usize) -> Option<i64> {
    let bytes = key.get(offset..offset + 8)?;
    Some(i64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ]))
}

fn key_i32(key: &[u8], offset: usize) -> Option<i32> {
    let bytes = key.get(offset..offset + 4)?;
    Some(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn find_counter_id(
    counters: &dyn CountersReader,
    matches: impl Fn(&[u8]) -> bool,
) -> i32 {
    for counter_id in 0..=counters.max_counter_id() {
        if counters.is_allocated(counter_id)
            && counters.counter_type_id(counter_id) == RECORDING_POSITION_TYPE_ID
            && matches(&counters.counter_key(counter_id))
        {
            return counter_id;
        }
    }
    NULL_COUNTER_ID
}

/// Find the counter id for an active recording by recording id.
pub fn find_counter_id_by_recording(counters: &dyn CountersReader, recording_id: i64) -> i32 {
    find_counter_id(counters, |key| {
        key_i64(key, RECORDING_ID_OFFSET) == Some(recording_id)
    })
}

/// Find the counter id for an active recording by image session id.
pub fn find_counter_id_by_session(counters: &dyn CountersReader, session_id: i32) -> i32 {
    find_counter_id(counters, |key| {
        key_i32(key, SESSION_ID_OFFSET) == Some(session_id)
    })
}

/// Recording id a counter tracks, or [`NULL_RECORDING_ID`].
pub fn recording_id(counters: &dyn CountersReader, counter_id: i32) -> i64 {
    if counters.is_allocated(counter_id)
        && counters.counter_type_id(counter_id) == RECORDING_POSITION_TYPE_ID
    {
        if let Some(id) = key_i64(&counters.counter_key(counter_id), RECORDING_ID_OFFSET) {
            return id;
        }
    }
    NULL_RECORDING_ID
}

/// Source identity of the image being recorded, when the counter is an
/// allocated recording-position counter with a well-formed key.
pub fn source_identity(counters: &dyn CountersReader, counter_id: i32) -> Option<String> {
    if !counters.is_allocated(counter_id)
        || counters.counter_type_id(counter_id) != RECORDING_POSITION_TYPE_ID
    {
        return None;
    }

    let key = counters.counter_key(counter_id);
    let length = key_i32(&key, SOURCE_IDENTITY_LENGTH_OFFSET)?;
    let length = usize::try_from(length).ok()?;
    let bytes = key.get(SOURCE_IDENTITY_OFFSET..SOURCE_IDENTITY_OFFSET + length)?;
    String::from_utf8(bytes.to_vec()).ok()
}

/// True while the counter still tracks the given recording.
pub fn is_active(counters: &dyn CountersReader, counter_id: i32, recording_id: i64) -> bool {
    counters.is_allocated(counter_id)
        && counters.counter_type_id(counter_id) == RECORDING_POSITION_TYPE_ID
        && key_i64(&counters.counter_key(counter_id), RECORDING_ID_OFFSET) == Some(recording_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubCounters {
        counters: Vec<Option<(i32, Vec<u8>, i64)>>,
    }

    impl StubCounters {
        fn new() -> Self {
            Self {
                counters: Vec::new(),
            }
        }

        fn add(&mut self, type_id: i32, key: Vec<u8>, value: i64) -> i32 {
            self.counters.push(Some((type_id, key, value)));
            (self.counters.len() - 1) as i32
        }

        fn add_gap(&mut self) {
            self.counters.push(None);
        }
    }

    impl CountersReader for StubCounters {
        fn max_counter_id(&self) -> i32 {
            self.counters.len() as i32 - 1
        }

        fn is_allocated(&self, counter_id: i32) -> bool {
            usize::try_from(counter_id)
                .ok()
                .and_then(|index| self.counters.get(index))
                .is_some_and(Option::is_some)
        }

        fn counter_type_id(&self, counter_id: i32) -> i32 {
            self.counters[counter_id as usize]
                .as_ref()
                .map_or(0, |(type_id, _, _)| *type_id)
        }

        fn counter_key(&self, counter_id: i32) -> Vec<u8> {
            self.counters[counter_id as usize]
                .as_ref()
                .map_or_else(Vec::new, |(_, key, _)| key.clone())
        }

        fn counter_value(&self, counter_id: i32) -> i64 {
            self.counters[counter_id as usize]
                .as_ref()
                .map_or(0, |(_, _, value)| *value)
        }
    }

    fn recording_key(recording_id: i64, session_id: i32, source_identity: &str) -> Vec<u8> {
        let mut key = vec![0u8; SOURCE_IDENTITY_OFFSET + source_identity.len()];
        key[RECORDING_ID_OFFSET..RECORDING_ID_OFFSET + 8]
            .copy_from_slice(&recording_id.to_le_bytes());
        key[SESSION_ID_OFFSET..SESSION_ID_OFFSET + 4].copy_from_slice(&session_id.to_le_bytes());
        key[SOURCE_IDENTITY_LENGTH_OFFSET..SOURCE_IDENTITY_LENGTH_OFFSET + 4]
            .copy_from_slice(&(source_identity.len() as i32).to_le_bytes());
        key[SOURCE_IDENTITY_OFFSET..].copy_from_slice(source_identity.as_bytes());
        key
    }

    #[test]
    fn test_find_by_recording_skips_other_types_and_gaps() {
        let mut counters = StubCounters::new();
        counters.add_gap();
        counters.add(7, recording_key(12, 1, "x"), 0);
        let counter_id = counters.add(
            RECORDING_POSITION_TYPE_ID,
            recording_key(12, 77, "127.0.0.1:40123"),
            1_024,
        );

        assert_eq!(find_counter_id_by_recording(&counters, 12), counter_id);
        assert_eq!(find_counter_id_by_recording(&counters, 99), NULL_COUNTER_ID);
        assert_eq!(counters.counter_value(counter_id), 1_024);
    }

    #[test]
    fn test_find_by_session() {
        let mut counters = StubCounters::new();
        let counter_id = counters.add(
            RECORDING_POSITION_TYPE_ID,
            recording_key(12, 77, "127.0.0.1:40123"),
            0,
        );

        assert_eq!(find_counter_id_by_session(&counters, 77), counter_id);
        assert_eq!(find_counter_id_by_session(&counters, 78), NULL_COUNTER_ID);
    }

    #[test]
    fn test_recording_id_and_source_identity() {
        let mut counters = StubCounters::new();
        let counter_id = counters.add(
            RECORDING_POSITION_TYPE_ID,
            recording_key(12, 77, "127.0.0.1:40123"),
            0,
        );

        assert_eq!(recording_id(&counters, counter_id), 12);
        assert_eq!(
            source_identity(&counters, counter_id).as_deref(),
            Some("127.0.0.1:40123")
        );

        let other_type = counters.add(7, recording_key(13, 1, "y"), 0);
        assert_eq!(recording_id(&counters, other_type), NULL_RECORDING_ID);
        assert_eq!(source_identity(&counters, other_type), None);
    }

    #[test]
    fn test_is_active_requires_same_recording() {
        let mut counters = StubCounters::new();
        let counter_id = counters.add(
            RECORDING_POSITION_TYPE_ID,
            recording_key(12, 77, "127.0.0.1:40123"),
            0,
        );

        assert!(is_active(&counters, counter_id, 12));
        assert!(!is_active(&counters, counter_id, 13));
        assert!(!is_active(&counters, NULL_COUNTER_ID, 12));
    }
}
