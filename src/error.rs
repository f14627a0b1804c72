//! Crate-wide error type.
//!
//! Protocol-level rejections (taken names, unknown targets) are not errors
//! here: they travel back to the peer as `ServerMessage::Error`. Garbage on
//! the wire is dropped by the frame reader. What remains is configuration
//! mistakes, I/O faults and shutdown requests.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("config: {0}")]
    Config(String),
    #[error("interrupted")]
    Interrupted,
}

impl Error {
    /// Lift an I/O error, turning a signal-interrupted syscall into a
    /// shutdown request.
    pub fn from_io(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::Interrupted {
            Self::Interrupted
        } else {
            Self::Io(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
