//! Network Layer: readiness-driven TCP
//!
//! Menggunakan mio untuk non-blocking I/O multiplexing, satu thread saja.
//!
//! Fitur:
//! - `Connection`: the receive/send/liveness seam over a socket
//! - `Sessions`: session list, name catalogue and message routing
//! - `Server`: accept loop and one-frame-per-wake dispatch
//! - `Client`: stdin and server socket on one poll

mod client;
mod connection;
mod server;
mod session;

pub use client::{handle_line, parse_command, render, Command, CommandError, Flow};
#[cfg(unix)]
pub use client::Client;
pub use connection::{is_disconnect, Connection};
pub use server::Server;
pub use session::{Removal, Session, Sessions, Step};

#[cfg(test)]
pub(crate) use connection::mock;
