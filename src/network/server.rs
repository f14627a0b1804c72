//! Murmur server dengan event-driven I/O
//!
//! Single-threaded readiness loop on top of mio. Session `i` is registered
//! under `Token(i)`; when a removal moves the tail session into slot `i`,
//! that session is re-registered under its new token together with the
//! catalogue repair.
//!
//! mio is edge-triggered, so a session that made progress stays marked
//! ready and the next wait does not block. That keeps "one frame per
//! session per wake" while still draining everything that is buffered.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, info, warn};

use super::session::{Removal, Session, Sessions, Step};
use crate::config::ServerConfig;
use crate::error::{Error, Result};

const LISTENER: Token = Token(usize::MAX);
const EVENTS_CAPACITY: usize = 1024;

/// Murmur server
pub struct Server {
    poll: Poll,
    listener: TcpListener,
    sessions: Sessions<TcpStream>,
    events: Events,
    buffer_capacity: usize,
}

impl Server {
    /// Bind the listening socket and register it.
    pub fn bind(config: &ServerConfig) -> Result<Self> {
        config.validate()?;
        let addr = config.addr()?;

        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(addr)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;

        info!(addr = %listener.local_addr()?, "listening");

        Ok(Self {
            poll,
            listener,
            sessions: Sessions::new(),
            events: Events::with_capacity(EVENTS_CAPACITY),
            buffer_capacity: config.buffer_capacity,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn sessions(&self) -> &Sessions<TcpStream> {
        &self.sessions
    }

    /// Run until interrupted or a fatal I/O error.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.poll_once()?;
        }
    }

    /// One wake cycle: wait, accept, then one step per ready session.
    pub fn poll_once(&mut self) -> Result<()> {
        let timeout = if self.sessions.any_ready() {
            Some(Duration::ZERO)
        } else {
            None
        };

        self.poll
            .poll(&mut self.events, timeout)
            .map_err(Error::from_io)?;

        let mut incoming = false;
        for event in self.events.iter() {
            match event.token() {
                LISTENER => incoming = true,
                Token(index) => self.sessions.mark_ready(index),
            }
        }

        if incoming {
            self.accept_connections()?;
        }

        self.service_ready()
    }

    /// Accept until the listener would block.
    fn accept_connections(&mut self) -> Result<()> {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    stream.set_nodelay(true)?;

                    let index = self.sessions.len();
                    self.poll
                        .registry()
                        .register(&mut stream, Token(index), Interest::READABLE)?;
                    self.sessions
                        .admit(Session::new(stream, self.buffer_capacity));
                    // The connection may have sent data before it was registered.
                    self.sessions.mark_ready(index);

                    info!(%addr, index, "connected");
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn service_ready(&mut self) -> Result<()> {
        let mut index = 0;
        while index < self.sessions.len() {
            if !self.sessions.is_ready(index) {
                index += 1;
                continue;
            }

            match self.sessions.step(index).map_err(Error::from_io)? {
                // The tail session now occupies `index` and has not been serviced yet.
                Step::Closed => self.disconnect(index)?,
                Step::Progress | Step::Idle => index += 1,
            }
        }
        Ok(())
    }

    fn disconnect(&mut self, index: usize) -> Result<()> {
        let Removal {
            mut session,
            moved_from,
        } = self.sessions.remove(index);

        if let Err(e) = self.poll.registry().deregister(session.connection_mut()) {
            warn!(index, error = %e, "deregister failed");
        }

        if let Some(from) = moved_from {
            if let Some(moved) = self.sessions.get_mut(index) {
                self.poll.registry().reregister(
                    moved.connection_mut(),
                    Token(index),
                    Interest::READABLE,
                )?;
                debug!(from, to = index, "session moved");
            }
        }

        info!(
            index,
            name = %String::from_utf8_lossy(session.sender_name()),
            remaining = self.sessions.len(),
            "disconnected"
        );
        Ok(())
    }
}
