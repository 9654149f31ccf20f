use std::collections::VecDeque;

use proptest::prelude::*;

use crate::audio::buffer::BoundedByteBuffer;

#[derive(Debug, Clone)]
enum Op {
    Write(Vec<u8>),
    Read(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        proptest::collection::vec(any::<u8>(), 0..40).prop_map(Op::Write),
        (0usize..40).prop_map(Op::Read),
    ]
}

proptest! {
    #[test]
    fn test_ring_matches_fifo_model(
        capacity in 1usize..64,
        ops in proptest::collection::vec(op_strategy(), 1..100)
    ) {
        let buffer = BoundedByteBuffer::new(capacity).unwrap();
        let mut model: VecDeque<u8> = VecDeque::new();

        for op in ops {
            match op {
                Op::Write(data) => {
                    let expected = data.len().min(capacity - model.len());
                    let written = buffer.write(&data);
                    prop_assert_eq!(written, expected);
                    model.extend(&data[..written]);
                }
                Op::Read(len) => {
                    let mut out = vec![0u8; len];
                    let read = buffer.read(&mut out);
                    prop_assert_eq!(read, len.min(model.len()));
                    let expected: Vec<u8> = model.drain(..read).collect();
                    prop_assert_eq!(&out[..read], &expected[..]);
                }
            }

            prop_assert_eq!(buffer.size_used() + buffer.space_available(), capacity);
            prop_assert_eq!(buffer.size_used(), model.len());
            prop_assert_eq!(buffer.is_empty(), model.is_empty());
            prop_assert_eq!(buffer.is_full(), model.len() == capacity);
        }
    }
}
