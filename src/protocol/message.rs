//! Message variants and the marker alphabet.
//!
//! Layout of every frame:
//! ┌─────────┬─────┬──────────────────────────────────┬─────┐
//! │ HEADING │ TAG │ payload fields, marker-separated │ END │
//! └─────────┴─────┴──────────────────────────────────┴─────┘
//!
//! There is no length prefix and no escaping. Markers are picked from the
//! ASCII control range so printable payloads never contain them; a payload
//! byte equal to a marker breaks framing.

use std::fmt;

/// Markers for frames sent by a client to the server.
pub mod client_markers {
    /// Start of heading.
    pub const HEADING: u8 = 0x01;
    /// End of transmission.
    pub const END: u8 = 0x04;
    /// Synchronous idle.
    pub const SET_NAME: u8 = 0x16;
    /// Enquiry.
    pub const LIST_USERS: u8 = 0x05;
    /// Start of text.
    pub const BROADCAST: u8 = 0x02;
    /// Private message.
    pub const UNICAST: u8 = 0x9E;
    /// Separates a unicast target from its text.
    pub const FIELD_SEP: u8 = 0x02;
}

/// Markers for frames sent by the server to a client.
pub mod server_markers {
    /// Start of heading.
    pub const HEADING: u8 = 0x01;
    /// End of transmission.
    pub const END: u8 = 0x04;
    /// Negative acknowledge.
    pub const ERROR: u8 = 0x15;
    /// Enquiry.
    pub const USERS_LIST: u8 = 0x05;
    /// Private message.
    pub const TEXT: u8 = 0x9E;
    /// Unit separator, strictly between two user names.
    pub const USER_SEP: u8 = 0x1F;
    /// Separates a text's sender from its body.
    pub const FIELD_SEP: u8 = 0x02;
}

/// Smallest `ListUsers`, `SetName` or `Broadcast` frame.
pub const CLIENT_MIN_SIZE: usize = 3;
/// Smallest `Unicast` frame.
pub const UNICAST_MIN_SIZE: usize = 4;
/// Smallest `UsersList` frame.
pub const USERS_LIST_MIN_SIZE: usize = 3;
/// `Error` frames are always exactly this long.
pub const ERROR_SIZE: usize = 4;
/// Smallest `Text` frame.
pub const TEXT_MIN_SIZE: usize = 4;

/// A frame reader must hold at least the largest minimum frame of either direction.
pub const MIN_FRAME_CAPACITY: usize = {
    let client = if UNICAST_MIN_SIZE > CLIENT_MIN_SIZE {
        UNICAST_MIN_SIZE
    } else {
        CLIENT_MIN_SIZE
    };
    let server = if ERROR_SIZE > TEXT_MIN_SIZE {
        ERROR_SIZE
    } else {
        TEXT_MIN_SIZE
    };
    if client > server {
        client
    } else {
        server
    }
};

/// Sender name substituted for clients that never set one.
pub const ANONYMOUS_NAME: &[u8] = b"anonymous";

/// Messages a client sends to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Claim a display name.
    SetName { name: Vec<u8> },
    /// Ask for the connected users.
    ListUsers,
    /// Text for every other connected client.
    Broadcast { text: Vec<u8> },
    /// Text for one named client.
    Unicast { target: Vec<u8>, text: Vec<u8> },
}

/// Messages the server sends to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// A request was rejected.
    Error { code: ErrorCode },
    /// Reply to `ListUsers`.
    ///
    /// Entries must be non-empty: a lone empty entry has the same wire form
    /// as an empty list.
    UsersList { names: Vec<Vec<u8>> },
    /// Text relayed from another client.
    Text { sender: Vec<u8>, body: Vec<u8> },
}

/// Reason carried by [`ServerMessage::Error`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The requested name is taken, or the client already has one.
    InvalidName = 0x11,
    /// No client is registered under the unicast target.
    InvalidTarget = 0x12,
}

impl ErrorCode {
    #[inline(always)]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x11 => Some(Self::InvalidName),
            0x12 => Some(Self::InvalidTarget),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName => f.write_str("invalid name (may be already in use)"),
            Self::InvalidTarget => f.write_str("invalid target"),
        }
    }
}

/// Entry appended to a users list when anonymous clients are connected.
///
/// Plain text on the wire, indistinguishable from a name to the receiver.
pub fn anonymous_entry(count: usize) -> Vec<u8> {
    format!("{} anonymous", count).into_bytes()
}
