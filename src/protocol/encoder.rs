//! Encoder/decoder for both protocol directions.
//!
//! Decoding works on an immutable slice and reports how many bytes the
//! frame occupied, so a caller never has to re-derive positions. Every
//! variant attempt starts from the same slice; a failed attempt leaves
//! nothing behind.

use super::message::{
    client_markers as cm, server_markers as sm, ClientMessage, ErrorCode, ServerMessage,
    CLIENT_MIN_SIZE, ERROR_SIZE, TEXT_MIN_SIZE, UNICAST_MIN_SIZE, USERS_LIST_MIN_SIZE,
};

/// A message type with a marker-delimited wire form.
pub trait Wire: Sized {
    /// First byte of every frame in this direction.
    const HEADING: u8;
    /// Last byte of every frame in this direction.
    const END: u8;

    /// Exact size of the encoded frame.
    fn encoded_len(&self) -> usize;

    /// Append the encoded frame to `out`.
    fn encode_into(&self, out: &mut Vec<u8>);

    /// Decode one frame starting at `buf[0]`.
    ///
    /// Returns the message and the number of bytes consumed, up to and
    /// including the trailing `END`. `None` covers both "not this protocol"
    /// and "not enough bytes yet".
    fn decode(buf: &[u8]) -> Option<(Self, usize)>;

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out);
        out
    }
}

#[inline(always)]
fn find(buf: &[u8], from: usize, byte: u8) -> Option<usize> {
    buf.get(from..)?
        .iter()
        .position(|&b| b == byte)
        .map(|pos| pos + from)
}

/// Checks the fixed two-byte prefix and returns the position of the first
/// `end` marker after it.
#[inline(always)]
fn frame_end(buf: &[u8], min_size: usize, heading: u8, tag: u8, end: u8) -> Option<usize> {
    if buf.len() < min_size || buf[0] != heading || buf[1] != tag {
        return None;
    }
    find(buf, 2, end)
}

impl ClientMessage {
    fn decode_set_name(buf: &[u8]) -> Option<(Self, usize)> {
        let end = frame_end(buf, CLIENT_MIN_SIZE, cm::HEADING, cm::SET_NAME, cm::END)?;
        let name = buf[2..end].to_vec();
        Some((Self::SetName { name }, end + 1))
    }

    fn decode_list_users(buf: &[u8]) -> Option<(Self, usize)> {
        if buf.len() < CLIENT_MIN_SIZE
            || buf[0] != cm::HEADING
            || buf[1] != cm::LIST_USERS
            || buf[2] != cm::END
        {
            return None;
        }
        Some((Self::ListUsers, CLIENT_MIN_SIZE))
    }

    fn decode_broadcast(buf: &[u8]) -> Option<(Self, usize)> {
        let end = frame_end(buf, CLIENT_MIN_SIZE, cm::HEADING, cm::BROADCAST, cm::END)?;
        let text = buf[2..end].to_vec();
        Some((Self::Broadcast { text }, end + 1))
    }

    fn decode_unicast(buf: &[u8]) -> Option<(Self, usize)> {
        let end = frame_end(buf, UNICAST_MIN_SIZE, cm::HEADING, cm::UNICAST, cm::END)?;
        let sep = find(&buf[..end], 2, cm::FIELD_SEP)?;
        let target = buf[2..sep].to_vec();
        let text = buf[sep + 1..end].to_vec();
        Some((Self::Unicast { target, text }, end + 1))
    }
}

impl Wire for ClientMessage {
    const HEADING: u8 = cm::HEADING;
    const END: u8 = cm::END;

    fn encoded_len(&self) -> usize {
        match self {
            Self::SetName { name } => 3 + name.len(),
            Self::ListUsers => 3,
            Self::Broadcast { text } => 3 + text.len(),
            Self::Unicast { target, text } => 4 + target.len() + text.len(),
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(cm::HEADING);
        match self {
            Self::SetName { name } => {
                out.push(cm::SET_NAME);
                out.extend_from_slice(name);
            }
            Self::ListUsers => out.push(cm::LIST_USERS),
            Self::Broadcast { text } => {
                out.push(cm::BROADCAST);
                out.extend_from_slice(text);
            }
            Self::Unicast { target, text } => {
                out.push(cm::UNICAST);
                out.extend_from_slice(target);
                out.push(cm::FIELD_SEP);
                out.extend_from_slice(text);
            }
        }
        out.push(cm::END);
    }

    fn decode(buf: &[u8]) -> Option<(Self, usize)> {
        Self::decode_set_name(buf)
            .or_else(|| Self::decode_list_users(buf))
            .or_else(|| Self::decode_broadcast(buf))
            .or_else(|| Self::decode_unicast(buf))
    }
}

impl ServerMessage {
    fn decode_error(buf: &[u8]) -> Option<(Self, usize)> {
        if buf.len() < ERROR_SIZE
            || buf[0] != sm::HEADING
            || buf[1] != sm::ERROR
            || buf[3] != sm::END
        {
            return None;
        }
        let code = ErrorCode::from_u8(buf[2])?;
        Some((Self::Error { code }, ERROR_SIZE))
    }

    fn decode_users_list(buf: &[u8]) -> Option<(Self, usize)> {
        let end = frame_end(buf, USERS_LIST_MIN_SIZE, sm::HEADING, sm::USERS_LIST, sm::END)?;
        let entries = &buf[2..end];
        let names = if entries.is_empty() {
            Vec::new()
        } else {
            entries
                .split(|&b| b == sm::USER_SEP)
                .map(<[u8]>::to_vec)
                .collect()
        };
        Some((Self::UsersList { names }, end + 1))
    }

    fn decode_text(buf: &[u8]) -> Option<(Self, usize)> {
        let end = frame_end(buf, TEXT_MIN_SIZE, sm::HEADING, sm::TEXT, sm::END)?;
        let sep = find(&buf[..end], 2, sm::FIELD_SEP)?;
        let sender = buf[2..sep].to_vec();
        let body = buf[sep + 1..end].to_vec();
        Some((Self::Text { sender, body }, end + 1))
    }
}

impl Wire for ServerMessage {
    const HEADING: u8 = sm::HEADING;
    const END: u8 = sm::END;

    fn encoded_len(&self) -> usize {
        match self {
            Self::Error { .. } => ERROR_SIZE,
            Self::UsersList { names } => {
                let separators = names.len().saturating_sub(1);
                3 + separators + names.iter().map(Vec::len).sum::<usize>()
            }
            Self::Text { sender, body } => 4 + sender.len() + body.len(),
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(sm::HEADING);
        match self {
            Self::Error { code } => {
                out.push(sm::ERROR);
                out.push(code.as_u8());
            }
            Self::UsersList { names } => {
                debug_assert!(
                    names.iter().all(|name| !name.is_empty()),
                    "empty user list entry"
                );
                out.push(sm::USERS_LIST);
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        out.push(sm::USER_SEP);
                    }
                    out.extend_from_slice(name);
                }
            }
            Self::Text { sender, body } => {
                out.push(sm::TEXT);
                out.extend_from_slice(sender);
                out.push(sm::FIELD_SEP);
                out.extend_from_slice(body);
            }
        }
        out.push(sm::END);
    }

    fn decode(buf: &[u8]) -> Option<(Self, usize)> {
        Self::decode_error(buf)
            .or_else(|| Self::decode_users_list(buf))
            .or_else(|| Self::decode_text(buf))
    }
}
