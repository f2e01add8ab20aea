//! Property tests for the newline-delimited JSON framer.

use proptest::prelude::*;
use serde_json::{Map, Value};
use toolpipe_transport::{FrameError, LineFramer, Message};

// ─────────────────────────────────────────────────────────────────────────────
// Strategies
// ─────────────────────────────────────────────────────────────────────────────

/// JSON leaves, including any finite float.
fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        any::<f64>()
            .prop_filter("JSON has no NaN or infinity", |f| f.is_finite())
            .prop_map(Value::from),
        // Includes newlines, quotes and non-ASCII text.
        any::<String>().prop_map(Value::String),
    ]
}

fn arb_value() -> impl Strategy<Value = Value> {
    arb_leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn arb_message() -> impl Strategy<Value = Message> {
    prop::collection::btree_map("[a-zA-Z_]{1,12}", arb_value(), 0..6)
        .prop_map(|m| Message::from(m.into_iter().collect::<Map<String, Value>>()))
}

/// Split `bytes` at the given (unsorted, possibly repeated) offsets.
fn split_at_offsets(bytes: &[u8], offsets: &[usize]) -> Vec<Vec<u8>> {
    let mut cuts: Vec<usize> = offsets
        .iter()
        .map(|o| o % (bytes.len() + 1))
        .collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut chunks = Vec::new();
    let mut start = 0;
    for cut in cuts {
        chunks.push(bytes[start..cut].to_vec());
        start = cut;
    }
    chunks.push(bytes[start..].to_vec());
    chunks
}

fn encode_all(messages: &[Message]) -> Vec<u8> {
    let framer = LineFramer::default();
    messages
        .iter()
        .flat_map(|m| framer.encode(m).unwrap().to_vec())
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn encoded_message_decodes_to_itself(message in arb_message()) {
        let mut framer = LineFramer::default();
        let line = framer.encode(&message).unwrap();
        prop_assert_eq!(line.iter().filter(|&&b| b == b'\n').count(), 1);

        let frames = framer.decode(&line);
        prop_assert_eq!(frames, vec![Ok(message)]);
        prop_assert_eq!(framer.finish(), None);
    }

    #[test]
    fn chunk_boundaries_do_not_matter(
        messages in prop::collection::vec(arb_message(), 1..6),
        offsets in prop::collection::vec(any::<usize>(), 0..12),
    ) {
        let stream = encode_all(&messages);
        let chunks = split_at_offsets(&stream, &offsets);

        let mut framer = LineFramer::default();
        let frames = framer.decode_stream(&chunks);

        let expected: Vec<_> = messages.into_iter().map(Ok).collect();
        prop_assert_eq!(frames, expected);
        prop_assert_eq!(framer.pending_bytes(), 0);
    }

    #[test]
    fn bad_line_only_affects_itself(
        first in arb_message(),
        second in arb_message(),
        garbage in "[a-z{][a-z{ ]{0,19}",
        offsets in prop::collection::vec(any::<usize>(), 0..6),
    ) {
        let mut stream = encode_all(std::slice::from_ref(&first));
        stream.extend_from_slice(garbage.as_bytes());
        stream.push(b'\n');
        stream.extend(encode_all(std::slice::from_ref(&second)));

        let mut framer = LineFramer::default();
        let frames = framer.decode_stream(split_at_offsets(&stream, &offsets));

        prop_assert_eq!(frames.len(), 3);
        prop_assert_eq!(&frames[0], &Ok(first));
        prop_assert!(
            matches!(&frames[1], Err(FrameError::Malformed { .. })),
            "garbage line should be malformed: {:?}",
            frames[1]
        );
        prop_assert_eq!(&frames[2], &Ok(second));
    }
}
