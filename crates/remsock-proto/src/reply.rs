//! Reply decoding.
//!
//! Two reply shapes exist. Operation replies carry the common result header
//! `{ magic, status, ret, errno }` plus operation-specific trailing scalars
//! (the returned address length, the returned sysctl value length). Session
//! replies (register-client, start-monitor) carry only `{ magic, status }`
//! plus trailers.
//!
//! The status field is the transport-level outcome and gates everything
//! else: `ret` and `errno` are meaningful only when status is 0. That
//! decision belongs to the dispatch layer; this module only extracts fields.

use thiserror::Error;

/// Magic constant opening every reply (ASCII "SFCO").
pub const REPLY_MAGIC: u64 = 0x4F43_4653;

/// Header length of an operation reply: magic, status, ret, errno.
pub const REPLY_HEADER_LEN: usize = 24;

/// Header length of a session reply: magic, status.
pub const SESSION_REPLY_HEADER_LEN: usize = 16;

/// Reply decoding failure. The dispatch layer treats any of these like a
/// transport-level failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplyError {
    #[error("reply truncated: got {got} bytes, need {need}")]
    Truncated { got: usize, need: usize },
    #[error("bad reply magic {0:#x}")]
    BadMagic(u64),
    #[error("missing trailing field at byte offset {0}")]
    MissingTrailer(usize),
}

fn read_u64(raw: &[u8], offset: usize) -> Option<u64> {
    let bytes = raw.get(offset..offset + 8)?;
    Some(u64::from_le_bytes(bytes.try_into().ok()?))
}

fn read_u32(raw: &[u8], offset: usize) -> Option<u32> {
    let bytes = raw.get(offset..offset + 4)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

fn check_magic(raw: &[u8], header_len: usize) -> Result<(), ReplyError> {
    if raw.len() < header_len {
        return Err(ReplyError::Truncated {
            got: raw.len(),
            need: header_len,
        });
    }
    let magic = read_u64(raw, 0).expect("length checked above");
    if magic != REPLY_MAGIC {
        return Err(ReplyError::BadMagic(magic));
    }
    Ok(())
}

/// Decoded operation reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Transport-level status; 0 is success.
    pub status: u64,
    /// POSIX return value. Trustworthy only when `status == 0`; may itself
    /// be -1 with a meaningful `errno` (the normal POSIX failure path).
    pub ret: i32,
    /// Server-reported errno value.
    pub errno: i32,
    trailer: Vec<u8>,
}

impl Reply {
    /// Parses the common result header and retains any trailing bytes.
    pub fn parse(raw: &[u8]) -> Result<Self, ReplyError> {
        check_magic(raw, REPLY_HEADER_LEN)?;
        Ok(Self {
            status: read_u64(raw, 8).expect("length checked"),
            ret: read_u32(raw, 16).expect("length checked") as i32,
            errno: read_u32(raw, 20).expect("length checked") as i32,
            trailer: raw[REPLY_HEADER_LEN..].to_vec(),
        })
    }

    /// Trailing `u32` at `index` (in units of 4 bytes past the header).
    pub fn trailing_u32(&self, index: usize) -> Result<u32, ReplyError> {
        let offset = 4 * index;
        read_u32(&self.trailer, offset)
            .ok_or(ReplyError::MissingTrailer(REPLY_HEADER_LEN + offset))
    }

    /// Trailing `u64` at `index` (in units of 8 bytes past the header).
    pub fn trailing_u64(&self, index: usize) -> Result<u64, ReplyError> {
        let offset = 8 * index;
        read_u64(&self.trailer, offset)
            .ok_or(ReplyError::MissingTrailer(REPLY_HEADER_LEN + offset))
    }
}

/// Decoded session-management reply (register-client, start-monitor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReply {
    /// Transport-level status; 0 is success.
    pub status: u64,
    trailer: Vec<u8>,
}

impl SessionReply {
    pub fn parse(raw: &[u8]) -> Result<Self, ReplyError> {
        check_magic(raw, SESSION_REPLY_HEADER_LEN)?;
        Ok(Self {
            status: read_u64(raw, 8).expect("length checked"),
            trailer: raw[SESSION_REPLY_HEADER_LEN..].to_vec(),
        })
    }

    /// Trailing `u64` at `index` (the register-client reply carries the
    /// assigned client id at index 0).
    pub fn trailing_u64(&self, index: usize) -> Result<u64, ReplyError> {
        let offset = 8 * index;
        read_u64(&self.trailer, offset)
            .ok_or(ReplyError::MissingTrailer(SESSION_REPLY_HEADER_LEN + offset))
    }
}

/// Test-side reply builders. Kept here so both the proto unit tests and the
/// client integration tests assemble replies the same way.
pub mod build {
    use super::REPLY_MAGIC;

    /// Operation reply with the given status/ret/errno and trailing bytes.
    pub fn reply(status: u64, ret: i32, errno: i32, trailer: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(24 + trailer.len());
        out.extend_from_slice(&REPLY_MAGIC.to_le_bytes());
        out.extend_from_slice(&status.to_le_bytes());
        out.extend_from_slice(&ret.to_le_bytes());
        out.extend_from_slice(&errno.to_le_bytes());
        out.extend_from_slice(trailer);
        out
    }

    /// Session reply with the given status and trailing bytes.
    pub fn session_reply(status: u64, trailer: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + trailer.len());
        out.extend_from_slice(&REPLY_MAGIC.to_le_bytes());
        out.extend_from_slice(&status.to_le_bytes());
        out.extend_from_slice(trailer);
        out
    }
}
