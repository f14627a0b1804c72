//! Server and client configuration, parsed from the command line.

use std::net::{SocketAddr, ToSocketAddrs};

use clap::Parser;

use crate::error::{Error, Result};
use crate::protocol::MIN_FRAME_CAPACITY;

/// Default per-connection read buffer, also the largest frame accepted.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;
pub const DEFAULT_PORT: u16 = 9999;
/// Unspecified IPv6 address; on dual-stack hosts it also accepts IPv4 peers.
pub const DEFAULT_HOST: &str = "::";

/// Server configuration
#[derive(Parser, Debug, Clone)]
#[command(name = "murmur_server", version, about = "Multi-user chat server")]
pub struct ServerConfig {
    /// Port to listen on. Use 0 for an ephemeral port.
    pub port: u16,

    /// Address to bind.
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Per-connection read buffer in bytes; larger frames are dropped.
    #[arg(long = "buffer", default_value_t = DEFAULT_BUFFER_CAPACITY)]
    pub buffer_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: DEFAULT_HOST.to_string(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        validate_capacity(self.buffer_capacity)
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        resolve(&self.host, self.port)
    }
}

/// Client configuration
#[derive(Parser, Debug, Clone)]
#[command(name = "murmur_client", version, about = "Terminal client for the murmur chat server")]
pub struct ClientConfig {
    /// Server host name or address.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Read buffer in bytes; larger frames from the server are dropped.
    #[arg(long = "buffer", default_value_t = DEFAULT_BUFFER_CAPACITY)]
    pub buffer_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        validate_capacity(self.buffer_capacity)
    }

    /// Every address the host resolves to, in resolver order.
    pub fn addrs(&self) -> Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port).to_socket_addrs()?.collect();
        if addrs.is_empty() {
            return Err(Error::Config(format!("{} resolves to nothing", self.host)));
        }
        Ok(addrs)
    }
}

fn validate_capacity(capacity: usize) -> Result<()> {
    if capacity < MIN_FRAME_CAPACITY {
        return Err(Error::Config(format!(
            "buffer capacity {} is below the minimum frame size {}",
            capacity, MIN_FRAME_CAPACITY
        )));
    }
    Ok(())
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| Error::Config(format!("{} resolves to nothing", host)))
}
