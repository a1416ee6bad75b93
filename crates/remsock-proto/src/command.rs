//! Command encoding.
//!
//! Every request starts with the same fixed header: the protocol magic,
//! then the operation code, then operation-specific scalar arguments. All
//! scalars are little-endian and packed in the documented per-operation
//! order with no implicit padding. [`CommandWriter`] produces the header
//! bytes; [`Request`] pairs them with the ordered buffer descriptors and
//! the transport attachments (handle copies, the process-id flag).

use crate::buffer::{RxBuf, TxBuf};
use crate::opcode::OpCode;

/// Magic constant opening every command header (ASCII "SFCI").
pub const REQUEST_MAGIC: u64 = 0x4943_4653;

/// Byte offset of the first operation-specific scalar in a command header.
pub const HEADER_FIXED_LEN: usize = 16;

/// Little-endian scalar writer for command headers.
///
/// Construction writes the magic and operation code; the per-operation
/// scalars follow through the `put_*` methods in wire order.
#[derive(Debug)]
pub struct CommandWriter {
    buf: Vec<u8>,
}

impl CommandWriter {
    /// Starts a header for `opcode`.
    pub fn new(opcode: OpCode) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&REQUEST_MAGIC.to_le_bytes());
        buf.extend_from_slice(&opcode.value().to_le_bytes());
        Self { buf }
    }

    #[inline]
    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    #[inline]
    pub fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn put_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Appends raw bytes (pre-encoded embedded structures).
    #[inline]
    pub fn put_bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    /// Current header length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        false // the magic and opcode are always present
    }

    /// Finishes the header.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// A fully assembled outbound request.
///
/// `tx` and `rx` are ordered; their order is the wire contract. The
/// transport realizes each descriptor (inline vs. transfer memory) as it
/// sees fit, attaches the caller's process id when `send_pid` is set, and
/// copies the listed handles into the message.
#[derive(Debug)]
pub struct Request<'a> {
    /// Encoded command header (magic, opcode, scalars).
    pub header: Vec<u8>,
    /// Send descriptors, in wire order.
    pub tx: Vec<TxBuf<'a>>,
    /// Receive descriptors, in wire order.
    pub rx: Vec<RxBuf>,
    /// Kernel handles copied into the message (transfer memory at
    /// registration; nothing else today).
    pub copy_handles: Vec<u32>,
    /// Ask the transport to attach the caller's process id.
    pub send_pid: bool,
}

impl<'a> Request<'a> {
    /// Request with the given header and no descriptors.
    pub fn new(header: Vec<u8>) -> Self {
        Self {
            header,
            tx: Vec::new(),
            rx: Vec::new(),
            copy_handles: Vec::new(),
            send_pid: false,
        }
    }

    /// Operation code recovered from the header, if well-formed.
    pub fn opcode_value(&self) -> Option<u64> {
        let bytes = self.header.get(8..16)?;
        Some(u64::from_le_bytes(bytes.try_into().ok()?))
    }
}
