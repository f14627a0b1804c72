//! Murmur - multi-user chat over a marker-delimited binary protocol
//!
//! Arsitektur:
//! - `protocol`: message enums and their wire form, one marker alphabet per direction
//! - `core`: bounded frame reassembly and the name catalogue
//! - `network`: mio-based server and client engines, single-threaded
//! - `config`: command-line configuration for both binaries

pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod protocol;
#[cfg(unix)]
pub mod shutdown;

pub use error::{Error, Result};
