//! Core module: per-connection buffering and server bookkeeping
//!
//! Prinsip desain:
//! - Bounded: every read buffer has a fixed capacity
//! - Index-based: the catalogue refers to sessions by position, never by pointer
//! - Socket-agnostic: everything here works against the `Connection` trait

mod catalogue;
mod read_buffer;

pub use catalogue::Catalogue;
pub use read_buffer::{FrameReader, ReadOutcome};
