//! Property-based tests for the v1 codec and replay window.

use box_protocol::{
    Command, Payload, PutPayload, QueuePayload, ReplayWindow, TransportError, V1Frame,
    V1_HEADER_SIZE,
};
use proptest::prelude::*;

fn command_strategy() -> impl Strategy<Value = Command> {
    any::<u32>().prop_map(Command::from_u32)
}

#[test]
fn prop_v1_roundtrip() {
    proptest!(|(
        command in command_strategy(),
        request_id in any::<u64>(),
        payload in proptest::collection::vec(any::<u8>(), 0..2048),
    )| {
        let frame = V1Frame::new(command, request_id, payload.clone());
        let bytes = frame.pack().unwrap();
        prop_assert_eq!(bytes.len(), V1_HEADER_SIZE + payload.len());
        prop_assert_eq!(V1Frame::unpack(&bytes).unwrap(), frame);
    });
}

#[test]
fn prop_unpack_never_panics() {
    proptest!(|(bytes in proptest::collection::vec(any::<u8>(), 0..64))| {
        let _ = V1Frame::unpack(&bytes);
        let _ = PutPayload::decode(&bytes);
        let _ = QueuePayload::decode(&bytes);
    });
}

#[test]
fn prop_put_payload_roundtrip() {
    proptest!(|(
        queue in "[a-z0-9]{0,32}",
        content_type in "[a-z/+-]{0,32}",
        data in proptest::collection::vec(any::<u8>(), 0..512),
    )| {
        let put = PutPayload { queue, content_type, data };
        let bytes = put.to_bytes().unwrap();
        prop_assert_eq!(PutPayload::decode(&bytes).unwrap(), put);
    });
}

#[test]
fn prop_replay_rejects_second_delivery() {
    proptest!(|(counters in proptest::collection::vec(1u64..200, 1..100))| {
        let mut window = ReplayWindow::new();
        let mut accepted: Vec<u64> = Vec::new();

        for c in counters {
            let was_accepted = window.check_and_update(c).is_ok();
            if accepted.contains(&c) {
                prop_assert!(!was_accepted);
            }
            if was_accepted {
                accepted.push(c);
            }
        }

        let max = window.max();
        for c in accepted {
            match window.check(c) {
                Err(TransportError::Replayed(_)) => prop_assert!(max - c < 64),
                Err(TransportError::TooOld { .. }) => prop_assert!(max - c >= 64),
                other => prop_assert!(false, "accepted counter {} re-accepted: {:?}", c, other),
            }
        }
    });
}
