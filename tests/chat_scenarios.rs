//! End-to-end chat scenarios against a live server.
//!
//! Each test binds its own server on an ephemeral port and drives it over
//! real sockets. A `ListUsers` round trip is used as a barrier: the server
//! handles one connection's frames in order, so once the reply arrives
//! everything sent before it has been processed.
//!
//! Usage:
//!   cargo test --test chat_scenarios -- --nocapture

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use murmur::config::ServerConfig;
use murmur::core::{FrameReader, ReadOutcome};
use murmur::network::{Connection, Server};
use murmur::protocol::{ClientMessage, ErrorCode, ServerMessage, Wire};

const RECV_DEADLINE: Duration = Duration::from_secs(5);

fn start_server(buffer_capacity: usize) -> SocketAddr {
    let config = ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        buffer_capacity,
    };
    let mut server = Server::bind(&config).expect("bind");
    let addr = server.local_addr().expect("local addr");
    thread::spawn(move || {
        let _ = server.run();
    });
    addr
}

/// Blocking socket with a short read timeout, seen through `Connection`.
struct Link(TcpStream);

impl Connection for Link {
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.read(buf) {
            Err(ref e) if e.kind() == io::ErrorKind::TimedOut => {
                Err(io::ErrorKind::WouldBlock.into())
            }
            other => other,
        }
    }

    fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.write_all(data)?;
        Ok(data.len())
    }

    fn is_closed(&self) -> io::Result<bool> {
        Ok(false)
    }
}

struct Peer {
    link: Link,
    reader: FrameReader,
}

impl Peer {
    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        stream.set_nodelay(true).unwrap();
        Self {
            link: Link(stream),
            reader: FrameReader::new(1024),
        }
    }

    fn send(&mut self, message: ClientMessage) {
        self.send_raw(&message.encode());
    }

    fn send_raw(&mut self, bytes: &[u8]) {
        self.link.send(bytes).expect("send");
    }

    fn recv(&mut self) -> ServerMessage {
        let start = Instant::now();
        loop {
            match self.reader.read::<ServerMessage, _>(&mut self.link) {
                Ok(ReadOutcome::Message(message)) => return message,
                Ok(ReadOutcome::Partial) | Ok(ReadOutcome::Idle) => {}
                Ok(ReadOutcome::Closed) => panic!("server closed the connection"),
                Err(e) => panic!("read failed: {}", e),
            }
            assert!(start.elapsed() < RECV_DEADLINE, "no message within deadline");
        }
    }

    fn users(&mut self) -> Vec<String> {
        self.send(ClientMessage::ListUsers);
        match self.recv() {
            ServerMessage::UsersList { names } => names
                .into_iter()
                .map(|n| String::from_utf8(n).unwrap())
                .collect(),
            other => panic!("expected UsersList, got {:?}", other),
        }
    }

    fn join(addr: SocketAddr, name: Option<&str>) -> Self {
        let mut peer = Self::connect(addr);
        if let Some(name) = name {
            peer.send(ClientMessage::SetName {
                name: name.as_bytes().to_vec(),
            });
        }
        // Barrier: admitted and named.
        peer.users();
        peer
    }
}

/// Step `server` on this thread until `done` holds.
fn poll_until(server: &mut Server, done: impl Fn(&Server) -> bool) {
    for _ in 0..1000 {
        if done(server) {
            return;
        }
        server.poll_once().expect("poll");
    }
    panic!("server never reached the expected state");
}

#[test]
fn test_session_bookkeeping_through_poll_once() {
    let config = ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        buffer_capacity: 1024,
    };
    let mut server = Server::bind(&config).expect("bind");
    let addr = server.local_addr().expect("local addr");

    let mut named = TcpStream::connect(addr).unwrap();
    named
        .write_all(&ClientMessage::SetName { name: b"a".to_vec() }.encode())
        .unwrap();
    let anonymous = TcpStream::connect(addr).unwrap();

    poll_until(&mut server, |s| {
        s.sessions().len() == 2 && s.sessions().catalogue().contains(b"a")
    });
    let names: Vec<Option<&[u8]>> = server.sessions().iter().map(|s| s.name()).collect();
    assert!(names.contains(&Some(&b"a"[..])));
    assert!(names.contains(&None));

    drop(named);
    poll_until(&mut server, |s| s.sessions().len() == 1);
    assert!(server.sessions().catalogue().is_empty());
    assert_eq!(server.sessions().get(0).and_then(|s| s.name()), None);
    assert!(server.sessions().is_consistent());

    drop(anonymous);
    poll_until(&mut server, |s| s.sessions().is_empty());
}

#[test]
fn test_duplicate_name_gets_invalid_name() {
    let addr = start_server(1024);
    let mut first = Peer::join(addr, Some("a"));
    let mut second = Peer::join(addr, None);

    second.send(ClientMessage::SetName { name: b"a".to_vec() });
    assert_eq!(
        second.recv(),
        ServerMessage::Error {
            code: ErrorCode::InvalidName
        }
    );

    assert_eq!(first.users(), vec!["a", "1 anonymous"]);
}

#[test]
fn test_departed_user_leaves_the_list() {
    let addr = start_server(1024);
    let mut a = Peer::join(addr, Some("a"));
    let b = Peer::join(addr, Some("b"));
    let _c = Peer::join(addr, Some("c"));

    assert_eq!(a.users(), vec!["a", "b", "c"]);
    drop(b);

    let start = Instant::now();
    let users = loop {
        let users = a.users();
        if !users.iter().any(|u| u == "b") {
            break users;
        }
        assert!(start.elapsed() < RECV_DEADLINE, "b never left: {:?}", users);
        thread::sleep(Duration::from_millis(10));
    };
    assert_eq!(users, vec!["a", "c"]);

    // The name is free again.
    let mut again = Peer::join(addr, Some("b"));
    assert_eq!(again.users(), vec!["a", "c", "b"]);
}

#[test]
fn test_anonymous_broadcast_reaches_everyone_else() {
    let addr = start_server(1024);
    let mut sender = Peer::join(addr, None);
    let mut named = Peer::join(addr, Some("n"));
    let mut anonymous = Peer::join(addr, None);

    sender.send(ClientMessage::Broadcast { text: b"hi".to_vec() });

    let expected = ServerMessage::Text {
        sender: b"anonymous".to_vec(),
        body: b"hi".to_vec(),
    };
    assert_eq!(named.recv(), expected);
    assert_eq!(anonymous.recv(), expected);

    // The sender's next message is the list reply, not its own text.
    assert_eq!(sender.users(), vec!["n", "2 anonymous"]);
}

#[test]
fn test_unicast_to_unknown_target() {
    let addr = start_server(1024);
    let mut sender = Peer::join(addr, Some("s"));
    let mut bystander = Peer::join(addr, Some("b"));

    sender.send(ClientMessage::Unicast {
        target: b"ghost".to_vec(),
        text: b"x".to_vec(),
    });
    assert_eq!(
        sender.recv(),
        ServerMessage::Error {
            code: ErrorCode::InvalidTarget
        }
    );

    assert_eq!(bystander.users(), vec!["s", "b"]);
}

#[test]
fn test_unicast_delivery() {
    let addr = start_server(1024);
    let mut sender = Peer::join(addr, Some("s"));
    let mut target = Peer::join(addr, Some("t"));

    sender.send(ClientMessage::Unicast {
        target: b"t".to_vec(),
        text: b"psst".to_vec(),
    });
    assert_eq!(
        target.recv(),
        ServerMessage::Text {
            sender: b"s".to_vec(),
            body: b"psst".to_vec(),
        }
    );
    assert_eq!(sender.users(), vec!["s", "t"]);
}

#[test]
fn test_split_frame_after_garbage() {
    let addr = start_server(1024);
    let mut peer = Peer::connect(addr);

    let frame = ClientMessage::SetName { name: b"slow".to_vec() }.encode();
    peer.send_raw(b"noise");
    peer.send_raw(&frame[..3]);
    thread::sleep(Duration::from_millis(20));
    peer.send_raw(&frame[3..]);

    assert_eq!(peer.users(), vec!["slow"]);
}

#[test]
fn test_oversized_frame_is_dropped() {
    let addr = start_server(16);
    let mut peer = Peer::join(addr, Some("p"));
    let mut other = Peer::join(addr, None);

    peer.send(ClientMessage::Broadcast {
        text: vec![b'x'; 64],
    });
    thread::sleep(Duration::from_millis(20));
    peer.send(ClientMessage::Broadcast { text: b"ok".to_vec() });

    assert_eq!(
        other.recv(),
        ServerMessage::Text {
            sender: b"p".to_vec(),
            body: b"ok".to_vec(),
        }
    );
}
