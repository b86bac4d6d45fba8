use iris_pack::{Event, Message, Reader, Writer};
use proptest::prelude::*;

proptest! {
    #[test]
    fn arbitrary_object_sequences_round_trip(
        msgs in prop::collection::vec(
            (0u64..64, prop::collection::vec(any::<u8>(), 0..512)),
            0..32,
        ),
    ) {
        let mut w = Writer::new(Vec::new()).unwrap();
        for (t, bytes) in &msgs {
            w.object(&Message::new(*t, bytes.clone())).unwrap();
        }
        let encoded = w.finish().unwrap();

        let mut r = Reader::new(encoded.as_slice()).unwrap();
        let mut decoded = Vec::new();
        while let Some(e) = r.next_event().unwrap() {
            match e {
                Event::Object { msg } => decoded.push((msg.msg_type, msg.bytes)),
                other => prop_assert!(false, "unexpected event {other:?}"),
            }
        }
        prop_assert_eq!(decoded, msgs);
    }

    #[test]
    fn nested_groups_close_in_any_order(depth in 1usize..8) {
        let mut w = Writer::new(Vec::new()).unwrap();
        let mut ids = Vec::new();
        let mut parent = None;
        for _ in 0..depth {
            let id = match parent {
                None => w.begin_group(&Message::new(2, vec![])).unwrap(),
                Some(p) => w.begin_child_group(p, &Message::new(2, vec![])).unwrap(),
            };
            parent = Some(id);
            ids.push(id);
        }
        for id in ids.iter().rev() {
            w.end_group(*id).unwrap();
        }
        let encoded = w.finish().unwrap();

        let mut r = Reader::new(encoded.as_slice()).unwrap();
        let mut opens = 0usize;
        let mut closes = 0usize;
        while let Some(e) = r.next_event().unwrap() {
            match e {
                Event::BeginGroup { .. } | Event::BeginChildGroup { .. } => opens += 1,
                Event::EndGroup { .. } => closes += 1,
                other => prop_assert!(false, "unexpected event {other:?}"),
            }
        }
        prop_assert_eq!(opens, depth);
        prop_assert_eq!(closes, depth);
    }
}
