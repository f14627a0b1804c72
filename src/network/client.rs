//! Terminal client.
//!
//! Multiplexes stdin and the server socket on one mio `Poll`. Each input
//! line becomes at most one protocol message; each decoded server message
//! becomes one rendered block on the output.

use std::io::{self, Write};

use crate::protocol::{client_markers, server_markers, ClientMessage, ServerMessage, Wire};

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(ClientMessage),
    Exit,
}

/// Why an input line was not sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("empty input")]
    Empty,
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("`{0}` is missing a `;` separator")]
    MissingSeparator(&'static str),
    #[error("byte {0:#04x} is reserved by the protocol")]
    ReservedByte(u8),
}

const RESERVED: [u8; 7] = [
    client_markers::HEADING,
    client_markers::END,
    client_markers::SET_NAME,
    client_markers::LIST_USERS,
    client_markers::BROADCAST,
    client_markers::UNICAST,
    server_markers::USER_SEP,
];

fn payload(text: &str) -> Result<Vec<u8>, CommandError> {
    match text.bytes().find(|b| RESERVED.contains(b)) {
        Some(b) => Err(CommandError::ReservedByte(b)),
        None => Ok(text.as_bytes().to_vec()),
    }
}

/// Translate one input line (without its newline) into a command.
///
/// `users`, `exit`, `all;<text>`, `name;<name>` and `uni;<target>;<text>`.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim_end_matches(['\r', '\n']);
    match line {
        "" => return Err(CommandError::Empty),
        "users" => return Ok(Command::Send(ClientMessage::ListUsers)),
        "exit" => return Ok(Command::Exit),
        _ => {}
    }

    let Some((command, rest)) = line.split_once(';') else {
        return Err(CommandError::UnknownCommand(line.to_string()));
    };

    let message = match command {
        "all" => ClientMessage::Broadcast {
            text: payload(rest)?,
        },
        "name" => ClientMessage::SetName {
            name: payload(rest)?,
        },
        "uni" => {
            let (target, text) = rest
                .split_once(';')
                .ok_or(CommandError::MissingSeparator("uni"))?;
            ClientMessage::Unicast {
                target: payload(target)?,
                text: payload(text)?,
            }
        }
        other => return Err(CommandError::UnknownCommand(other.to_string())),
    };
    Ok(Command::Send(message))
}

/// Render a server message for the terminal.
pub fn render(message: &ServerMessage) -> String {
    match message {
        ServerMessage::Error { code } => format!("error: {}", code),
        ServerMessage::UsersList { names } => {
            let mut out = String::from("users:");
            for name in names {
                out.push('\n');
                out.push_str(&String::from_utf8_lossy(name));
            }
            out
        }
        ServerMessage::Text { sender, body } => format!(
            "{}: {}",
            String::from_utf8_lossy(sender),
            String::from_utf8_lossy(body)
        ),
    }
}

/// Whether the client loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Handle one input line: send it, or report why it was rejected.
pub fn handle_line<C, W>(line: &str, server: &mut C, out: &mut W) -> io::Result<Flow>
where
    C: super::Connection + ?Sized,
    W: Write,
{
    match parse_command(line) {
        Ok(Command::Exit) => Ok(Flow::Exit),
        Ok(Command::Send(message)) => {
            server.send(&message.encode())?;
            Ok(Flow::Continue)
        }
        Err(e) => {
            tracing::debug!(error = %e, "input rejected");
            writeln!(out, "invalid message.")?;
            Ok(Flow::Continue)
        }
    }
}

#[cfg(unix)]
pub use self::engine::Client;

#[cfg(unix)]
mod engine {
    use std::fs::File;
    use std::io::{self, Read, Write};
    use std::mem::ManuallyDrop;
    use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
    use std::time::Duration;

    use mio::net::TcpStream;
    use mio::unix::SourceFd;
    use mio::{Events, Interest, Poll, Token};
    use tracing::{debug, info, warn};

    use super::{handle_line, render, Flow};
    use crate::config::ClientConfig;
    use crate::core::{FrameReader, ReadOutcome};
    use crate::error::{Error, Result};
    use crate::network::{is_disconnect, Connection};
    use crate::protocol::ServerMessage;

    const INPUT: Token = Token(0);
    const SERVER: Token = Token(1);
    const INPUT_CHUNK: usize = 4096;

    /// Put `fd` in non-blocking mode, returning the previous status flags.
    fn set_nonblocking(fd: RawFd) -> io::Result<libc::c_int> {
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFL, 0);
            if flags < 0 {
                return Err(io::Error::last_os_error());
            }
            if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(flags)
        }
    }

    /// Murmur terminal client
    pub struct Client {
        poll: Poll,
        events: Events,
        stream: TcpStream,
        reader: FrameReader,
        // Unbuffered view of the input fd; std's stdin buffer would hide data from epoll.
        // The fd is borrowed, never closed here.
        input: ManuallyDrop<File>,
        input_flags: libc::c_int,
        pending: Vec<u8>,
        input_ready: bool,
        server_ready: bool,
    }

    impl Client {
        /// Connect (blocking) and read commands from stdin.
        pub fn connect(config: &ClientConfig) -> Result<Self> {
            Self::connect_with_input(config, io::stdin().as_raw_fd())
        }

        /// Connect (blocking) and read commands from `input`.
        ///
        /// `input` is switched to non-blocking mode until the client is
        /// dropped and must outlive it.
        pub fn connect_with_input(config: &ClientConfig, input: RawFd) -> Result<Self> {
            config.validate()?;
            let addrs = config.addrs()?;
            let stream = std::net::TcpStream::connect(&addrs[..])?;
            stream.set_nonblocking(true)?;
            stream.set_nodelay(true)?;
            let mut stream = TcpStream::from_std(stream);

            let poll = Poll::new()?;
            poll.registry()
                .register(&mut stream, SERVER, Interest::READABLE)?;

            match poll
                .registry()
                .register(&mut SourceFd(&input), INPUT, Interest::READABLE)
            {
                Ok(()) => {}
                // Regular files cannot be polled but are always readable.
                Err(ref e) if e.kind() == io::ErrorKind::PermissionDenied => {
                    warn!("input is not pollable, reading it eagerly");
                }
                Err(e) => return Err(e.into()),
            }
            let input_flags = set_nonblocking(input)?;
            let input = ManuallyDrop::new(unsafe { File::from_raw_fd(input) });

            info!(peer = %stream.peer_addr()?, "connected");

            Ok(Self {
                poll,
                events: Events::with_capacity(8),
                stream,
                reader: FrameReader::new(config.buffer_capacity),
                input,
                input_flags,
                pending: Vec::new(),
                input_ready: true,
                server_ready: true,
            })
        }

        /// Relay input lines to the server and server messages to `out`
        /// until `exit`, end of input, or the server hanging up.
        pub fn run<W: Write>(&mut self, out: &mut W) -> Result<()> {
            loop {
                let timeout = if self.input_ready || self.server_ready {
                    Some(Duration::ZERO)
                } else {
                    None
                };
                self.poll
                    .poll(&mut self.events, timeout)
                    .map_err(Error::from_io)?;

                for event in self.events.iter() {
                    match event.token() {
                        INPUT => self.input_ready = true,
                        SERVER => self.server_ready = true,
                        _ => {}
                    }
                }

                if self.input_ready && self.service_input(out)? == Flow::Exit {
                    return Ok(());
                }
                if self.server_ready && self.service_server(out)? == Flow::Exit {
                    return Ok(());
                }
            }
        }

        /// Drain the input until it would block, then send every complete line.
        fn service_input<W: Write>(&mut self, out: &mut W) -> Result<Flow> {
            let mut chunk = [0u8; INPUT_CHUNK];
            let mut eof = false;
            loop {
                match self.input.read(&mut chunk) {
                    Ok(0) => {
                        eof = true;
                        break;
                    }
                    Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                        self.input_ready = false;
                        break;
                    }
                    Err(e) => return Err(Error::from_io(e)),
                }
            }

            while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                if handle_line(&line, &mut self.stream, out)? == Flow::Exit {
                    return Ok(Flow::Exit);
                }
            }

            if eof {
                if !self.pending.is_empty() {
                    let line = std::mem::take(&mut self.pending);
                    handle_line(&String::from_utf8_lossy(&line), &mut self.stream, out)?;
                }
                debug!("end of input");
                out.flush()?;
                return Ok(Flow::Exit);
            }
            out.flush()?;
            Ok(Flow::Continue)
        }

        fn service_server<W: Write>(&mut self, out: &mut W) -> Result<Flow> {
            let outcome = match self.reader.read::<ServerMessage, _>(&mut self.stream) {
                Err(ref e) if is_disconnect(e) => ReadOutcome::Closed,
                other => other.map_err(Error::from_io)?,
            };

            match outcome {
                ReadOutcome::Message(message) => {
                    writeln!(out, "{}", render(&message))?;
                    out.flush()?;
                }
                ReadOutcome::Partial => {}
                ReadOutcome::Idle => self.server_ready = false,
                ReadOutcome::Closed => {
                    if self.stream.is_closed()? {
                        info!("server closed the connection");
                        return Ok(Flow::Exit);
                    }
                    self.server_ready = false;
                }
            }
            Ok(Flow::Continue)
        }
    }

    impl Drop for Client {
        fn drop(&mut self) {
            // Leave the terminal the way it was found.
            unsafe {
                libc::fcntl(self.input.as_raw_fd(), libc::F_SETFL, self.input_flags);
            }
        }
    }
}
