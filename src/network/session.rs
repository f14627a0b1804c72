//! Server-side sessions and message routing.
//!
//! `Sessions` owns the live session list and the name catalogue and is the
//! only place either is mutated, so the catalogue invariant (every named
//! session at index `i` maps to `i`) is re-established inside each method.

use std::io;

use tracing::{debug, info, warn};

use super::connection::{is_disconnect, Connection};
use crate::core::{Catalogue, FrameReader, ReadOutcome};
use crate::protocol::{
    anonymous_entry, server_markers, ClientMessage, ErrorCode, ServerMessage, Wire,
    ANONYMOUS_NAME,
};

/// Bytes that would break a `UsersList` or `Text` frame if they appeared in a name.
const NAME_FORBIDDEN: [u8; 4] = [
    server_markers::HEADING,
    server_markers::END,
    server_markers::USER_SEP,
    server_markers::FIELD_SEP,
];

fn valid_name(name: &[u8]) -> bool {
    !name.is_empty() && !name.iter().any(|b| NAME_FORBIDDEN.contains(b))
}

/// One connected client.
pub struct Session<C> {
    connection: C,
    reader: FrameReader,
    name: Option<Vec<u8>>,
    ready: bool,
}

impl<C: Connection> Session<C> {
    pub fn new(connection: C, buffer_capacity: usize) -> Self {
        Self {
            connection,
            reader: FrameReader::new(buffer_capacity),
            name: None,
            ready: false,
        }
    }

    /// Display name, `None` while anonymous.
    pub fn name(&self) -> Option<&[u8]> {
        self.name.as_deref()
    }

    /// Name used as the sender of relayed text.
    pub fn sender_name(&self) -> &[u8] {
        self.name().unwrap_or(ANONYMOUS_NAME)
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    pub fn send(&mut self, message: &ServerMessage) -> io::Result<()> {
        self.send_encoded(&message.encode())
    }

    pub fn send_encoded(&mut self, packet: &[u8]) -> io::Result<()> {
        self.connection.send(packet).map(|_| ())
    }

    /// Read once and decode at most one frame. Disconnect errors are
    /// reported as `Closed`.
    fn read(&mut self) -> io::Result<ReadOutcome<ClientMessage>> {
        match self.reader.read(&mut self.connection) {
            Err(ref e) if is_disconnect(e) => Ok(ReadOutcome::Closed),
            other => other,
        }
    }
}

/// What one service step did to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Something happened; the session may have more to give.
    Progress,
    /// Nothing left to read for now.
    Idle,
    /// The peer is gone and the session must be removed.
    Closed,
}

/// A session taken out of the list.
pub struct Removal<C> {
    pub session: Session<C>,
    /// Former index of the session that now occupies the vacated slot.
    pub moved_from: Option<usize>,
}

/// Live sessions plus the name catalogue.
pub struct Sessions<C> {
    list: Vec<Session<C>>,
    catalogue: Catalogue,
}

impl<C> Default for Sessions<C> {
    fn default() -> Self {
        Self {
            list: Vec::new(),
            catalogue: Catalogue::new(),
        }
    }
}

impl<C: Connection> Sessions<C> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Session<C>> {
        self.list.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Session<C>> {
        self.list.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session<C>> {
        self.list.iter()
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    /// Append a new, anonymous session and return its index.
    pub fn admit(&mut self, session: Session<C>) -> usize {
        self.list.push(session);
        self.list.len() - 1
    }

    pub fn mark_ready(&mut self, index: usize) {
        if let Some(session) = self.list.get_mut(index) {
            session.ready = true;
        }
    }

    pub fn is_ready(&self, index: usize) -> bool {
        self.list.get(index).map_or(false, |s| s.ready)
    }

    pub fn any_ready(&self) -> bool {
        self.list.iter().any(|s| s.ready)
    }

    /// Swap-remove the session at `index` and repair the catalogue.
    ///
    /// # Panics
    /// If `index` is out of bounds.
    pub fn remove(&mut self, index: usize) -> Removal<C> {
        if let Some(name) = self.list[index].name() {
            self.catalogue.release(name);
        }

        let last = self.list.len() - 1;
        let session = self.list.swap_remove(index);
        let moved_from = (index != last).then_some(last);

        // The session that came from the tail now lives at `index`.
        if moved_from.is_some() {
            if let Some(name) = self.list[index].name.as_deref() {
                self.catalogue.repoint(name, index);
            }
        }

        debug_assert!(self.is_consistent());
        Removal {
            session,
            moved_from,
        }
    }

    /// Names in session order, then one entry for all anonymous sessions.
    pub fn users_list(&self) -> Vec<Vec<u8>> {
        let mut names: Vec<Vec<u8>> = self
            .list
            .iter()
            .filter_map(|s| s.name().map(<[u8]>::to_vec))
            .collect();
        let anonymous = self.list.len() - names.len();
        if anonymous > 0 {
            names.push(anonymous_entry(anonymous));
        }
        names
    }

    /// Check the catalogue against the session list.
    pub fn is_consistent(&self) -> bool {
        let named = self.list.iter().filter(|s| s.name.is_some()).count();
        named == self.catalogue.len()
            && self.list.iter().enumerate().all(|(i, s)| match s.name() {
                Some(name) => self.catalogue.lookup(name) == Some(i),
                None => true,
            })
            && self.catalogue.iter().all(|(_, i)| i < self.list.len())
    }

    /// Liveness check, one read, and dispatch of at most one message.
    pub fn step(&mut self, index: usize) -> io::Result<Step> {
        let session = &mut self.list[index];
        // Complete frames already buffered are served before the peer is declared gone.
        if !session.reader.holds_frame::<ClientMessage>() && session.connection.is_closed()? {
            return Ok(Step::Closed);
        }

        let step = match session.read()? {
            ReadOutcome::Message(message) => {
                self.dispatch(index, message)?;
                Step::Progress
            }
            ReadOutcome::Partial => Step::Progress,
            ReadOutcome::Idle => Step::Idle,
            ReadOutcome::Closed => {
                // A zero-length read alone is not trusted; ask the socket again.
                if self.list[index].connection.is_closed()? {
                    Step::Closed
                } else {
                    Step::Idle
                }
            }
        };

        if step == Step::Idle {
            self.list[index].ready = false;
        }
        Ok(step)
    }

    /// Route one decoded message from the session at `index`.
    pub fn dispatch(&mut self, index: usize, message: ClientMessage) -> io::Result<()> {
        match message {
            ClientMessage::SetName { name } => self.set_name(index, name),
            ClientMessage::ListUsers => {
                let names = self.users_list();
                debug!(index, users = names.len(), "list users");
                self.reply(index, &ServerMessage::UsersList { names })
            }
            ClientMessage::Broadcast { text } => {
                self.broadcast(index, text);
                Ok(())
            }
            ClientMessage::Unicast { target, text } => self.unicast(index, target, text),
        }
    }

    fn set_name(&mut self, index: usize, name: Vec<u8>) -> io::Result<()> {
        let session = &self.list[index];
        if session.name.is_some() || !valid_name(&name) || !self.catalogue.bind(&name, index) {
            debug!(index, name = %String::from_utf8_lossy(&name), "name rejected");
            return self.reply(
                index,
                &ServerMessage::Error {
                    code: ErrorCode::InvalidName,
                },
            );
        }

        info!(index, name = %String::from_utf8_lossy(&name), "session named");
        self.list[index].name = Some(name);
        Ok(())
    }

    fn broadcast(&mut self, index: usize, text: Vec<u8>) {
        let packet = ServerMessage::Text {
            sender: self.list[index].sender_name().to_vec(),
            body: text,
        }
        .encode();

        let mut delivered = 0usize;
        for (i, session) in self.list.iter_mut().enumerate() {
            if i == index {
                continue;
            }
            match session.send_encoded(&packet) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(index = i, error = %e, "broadcast send failed"),
            }
        }
        debug!(index, delivered, "broadcast");
    }

    fn unicast(&mut self, index: usize, target: Vec<u8>, text: Vec<u8>) -> io::Result<()> {
        let Some(recipient) = self.catalogue.lookup(&target) else {
            debug!(index, target = %String::from_utf8_lossy(&target), "unknown unicast target");
            return self.reply(
                index,
                &ServerMessage::Error {
                    code: ErrorCode::InvalidTarget,
                },
            );
        };

        let message = ServerMessage::Text {
            sender: self.list[index].sender_name().to_vec(),
            body: text,
        };
        debug!(index, recipient, "unicast");
        self.reply(recipient, &message)
    }

    /// Send to one session. A peer that already hung up is left for the
    /// next liveness check; anything else is fatal.
    fn reply(&mut self, index: usize, message: &ServerMessage) -> io::Result<()> {
        match self.list[index].send(message) {
            Err(ref e) if is_disconnect(e) => {
                warn!(index, error = %e, "peer gone before reply");
                Ok(())
            }
            other => other,
        }
    }
}
