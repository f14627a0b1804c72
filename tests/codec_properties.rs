//! Property tests for the wire codec and frame reassembly.

use std::collections::VecDeque;
use std::io;

use proptest::prelude::*;

use murmur::core::{FrameReader, ReadOutcome};
use murmur::network::Connection;
use murmur::protocol::{ClientMessage, ErrorCode, ServerMessage, Wire};

/// Every byte with a framing role in either direction.
const MARKERS: [u8; 7] = [0x01, 0x02, 0x04, 0x05, 0x16, 0x1F, 0x9E];

fn payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>().prop_filter("marker", |b| !MARKERS.contains(b)), 0..48)
}

fn name() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>().prop_filter("marker", |b| !MARKERS.contains(b)), 1..16)
}

fn client_message() -> impl Strategy<Value = ClientMessage> {
    prop_oneof![
        payload().prop_map(|name| ClientMessage::SetName { name }),
        Just(ClientMessage::ListUsers),
        payload().prop_map(|text| ClientMessage::Broadcast { text }),
        (payload(), payload()).prop_map(|(target, text)| ClientMessage::Unicast { target, text }),
    ]
}

fn server_message() -> impl Strategy<Value = ServerMessage> {
    prop_oneof![
        prop_oneof![Just(ErrorCode::InvalidName), Just(ErrorCode::InvalidTarget)]
            .prop_map(|code| ServerMessage::Error { code }),
        prop::collection::vec(name(), 0..6).prop_map(|names| ServerMessage::UsersList { names }),
        (payload(), payload()).prop_map(|(sender, body)| ServerMessage::Text { sender, body }),
    ]
}

/// Hands out a byte stream in predetermined chunk sizes.
struct Chunked {
    chunks: VecDeque<Vec<u8>>,
}

impl Chunked {
    fn new(bytes: &[u8], cuts: &[usize]) -> Self {
        let mut chunks = VecDeque::new();
        let mut rest = bytes;
        for &cut in cuts {
            if rest.is_empty() {
                break;
            }
            let (head, tail) = rest.split_at(cut.min(rest.len()).max(1));
            chunks.push_back(head.to_vec());
            rest = tail;
        }
        if !rest.is_empty() {
            chunks.push_back(rest.to_vec());
        }
        Self { chunks }
    }
}

impl Connection for Chunked {
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(mut chunk) = self.chunks.pop_front() else {
            return Err(io::ErrorKind::WouldBlock.into());
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.chunks.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        Ok(data.len())
    }

    fn is_closed(&self) -> io::Result<bool> {
        Ok(false)
    }
}

fn drain<M: Wire>(reader: &mut FrameReader, conn: &mut Chunked) -> Vec<M> {
    let mut out = Vec::new();
    loop {
        match reader.read::<M, _>(conn).unwrap() {
            ReadOutcome::Message(message) => out.push(message),
            ReadOutcome::Partial => {}
            ReadOutcome::Idle => return out,
            ReadOutcome::Closed => unreachable!(),
        }
    }
}

proptest! {
    #[test]
    fn prop_client_round_trip(message in client_message()) {
        let bytes = message.encode();
        prop_assert_eq!(bytes.len(), message.encoded_len());
        prop_assert_eq!(ClientMessage::decode(&bytes), Some((message, bytes.len())));
    }

    #[test]
    fn prop_server_round_trip(message in server_message()) {
        let bytes = message.encode();
        prop_assert_eq!(bytes.len(), message.encoded_len());
        prop_assert_eq!(ServerMessage::decode(&bytes), Some((message, bytes.len())));
    }

    #[test]
    fn prop_reassembly_ignores_chunking(
        messages in prop::collection::vec(client_message(), 1..8),
        cuts in prop::collection::vec(1usize..16, 0..32),
    ) {
        let mut stream = Vec::new();
        for message in &messages {
            message.encode_into(&mut stream);
        }

        let mut conn = Chunked::new(&stream, &cuts);
        let mut reader = FrameReader::new(1024);
        prop_assert_eq!(drain::<ClientMessage>(&mut reader, &mut conn), messages);
        prop_assert!(reader.buffered().is_empty());
    }

    #[test]
    fn prop_garbage_before_frame_is_skipped(
        garbage in payload(),
        message in server_message(),
    ) {
        let mut stream = garbage;
        message.encode_into(&mut stream);

        let mut conn = Chunked::new(&stream, &[]);
        let mut reader = FrameReader::new(1024);
        prop_assert_eq!(drain::<ServerMessage>(&mut reader, &mut conn), vec![message]);
    }

    #[test]
    fn prop_oversized_frame_never_blocks_the_next(
        body in prop::collection::vec(b'a'..=b'z', 300..400),
        after in client_message(),
    ) {
        let mut stream = ClientMessage::Broadcast { text: body }.encode();
        after.encode_into(&mut stream);

        let mut conn = Chunked::new(&stream, &[]);
        let mut reader = FrameReader::new(256);
        prop_assert_eq!(drain::<ClientMessage>(&mut reader, &mut conn), vec![after]);
    }
}
