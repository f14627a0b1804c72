//! Connection seam between the engines and the socket.
//!
//! The engines only need three primitives from a peer: pull bytes, push
//! bytes, and ask whether the peer hung up. `mio::net::TcpStream` provides
//! them for real sockets; tests swap in an in-memory peer.

use std::io::{self, Read, Write};

use mio::net::TcpStream;

/// A byte-stream peer.
pub trait Connection {
    /// Read up to `buf.len()` bytes.
    ///
    /// `Ok(0)` means the peer closed. A non-blocking peer with nothing to
    /// offer returns `ErrorKind::WouldBlock`.
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all of `data`, returning the number of bytes sent.
    fn send(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Non-destructive liveness probe.
    fn is_closed(&self) -> io::Result<bool>;
}

/// Errors that mean "the peer is gone" rather than "the host is broken".
#[inline]
pub fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}

impl Connection for TcpStream {
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.read(buf) {
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < data.len() {
            match self.write(&data[written..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "Failed to write to socket",
                    ));
                }
                Ok(n) => written += n,
                // Socket buffer full: behave like a blocking send and wait it out.
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => std::thread::yield_now(),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }

    fn is_closed(&self) -> io::Result<bool> {
        let mut peek_buf = [0u8; 1];
        match self.peek(&mut peek_buf) {
            Ok(0) => Ok(true), // EOF
            Ok(_) => Ok(false),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(ref e) if is_disconnect(e) => Ok(true),
            Err(e) => Err(e),
        }
    }
}
