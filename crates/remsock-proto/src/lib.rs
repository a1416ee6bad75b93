//! # remsock-proto
//!
//! Wire protocol for the remote BSD sockets service.
//!
//! The socket stack lives in a separate privileged server process; this crate
//! defines everything that crosses the IPC boundary: the operation-code
//! table, the little-endian command header layout, directional buffer
//! descriptors, reply decoding, the buffer-size configuration record (and
//! the transfer-memory sizing derived from it), the ioctl request-code
//! classification, and the fixed-layout payload structures.
//!
//! This crate is pure: no I/O, no transport, no `unsafe`. The session and
//! dispatch layers live in `remsock-client`.

pub mod buffer;
pub mod command;
pub mod config;
pub mod ioctl;
pub mod opcode;
pub mod reply;
pub mod types;

pub use buffer::{RxBuf, TxBuf};
pub use command::{CommandWriter, Request, REQUEST_MAGIC};
pub use config::BufferConfig;
pub use opcode::OpCode;
pub use reply::{Reply, ReplyError, SessionReply, REPLY_MAGIC};
