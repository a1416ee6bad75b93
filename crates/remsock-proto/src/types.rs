//! Fixed-layout payload structures.
//!
//! These are the structures that travel through buffer descriptors rather
//! than the command header: the `select` fd sets, the `poll` entry, the
//! `select` timeout, and the two ioctl header structures whose embedded
//! fields size a second wire buffer. Each has a manual little-endian byte
//! codec; padding bytes are written as zero and ignored on read.

// ---------------------------------------------------------------------------
// Timeval
// ---------------------------------------------------------------------------

/// `select` timeout, 16 bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timeval {
    pub tv_sec: i64,
    pub tv_usec: i64,
}

impl Timeval {
    pub const SIZE: usize = 16;

    pub fn new(tv_sec: i64, tv_usec: i64) -> Self {
        Self { tv_sec, tv_usec }
    }
}

// ---------------------------------------------------------------------------
// FdSet
// ---------------------------------------------------------------------------

/// Number of descriptors an [`FdSet`] can track.
///
/// The service is derived from a BSD stack with the stock 1024-descriptor
/// set; the 128-byte wire size below follows from it.
pub const FD_SETSIZE: usize = 1024;

const FD_WORDS: usize = FD_SETSIZE / 64;

/// Descriptor set for `select`, 128 bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdSet {
    bits: [u64; FD_WORDS],
}

impl Default for FdSet {
    fn default() -> Self {
        Self::new()
    }
}

impl FdSet {
    pub const SIZE: usize = FD_SETSIZE / 8;

    /// Empty set.
    pub fn new() -> Self {
        Self {
            bits: [0; FD_WORDS],
        }
    }

    /// Adds `fd` to the set. Out-of-range descriptors are ignored, matching
    /// the usual `FD_SET` contract of being a no-op outside the set bounds.
    pub fn set(&mut self, fd: usize) {
        if fd < FD_SETSIZE {
            self.bits[fd / 64] |= 1 << (fd % 64);
        }
    }

    /// Removes `fd` from the set.
    pub fn clear(&mut self, fd: usize) {
        if fd < FD_SETSIZE {
            self.bits[fd / 64] &= !(1 << (fd % 64));
        }
    }

    /// Returns `true` if `fd` is in the set.
    pub fn contains(&self, fd: usize) -> bool {
        fd < FD_SETSIZE && self.bits[fd / 64] & (1 << (fd % 64)) != 0
    }

    /// Empties the set.
    pub fn zero(&mut self) {
        self.bits = [0; FD_WORDS];
    }

    /// Wire encoding.
    pub fn as_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        for (i, word) in self.bits.iter().enumerate() {
            out[8 * i..8 * i + 8].copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    /// Decodes a full wire image.
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let mut bits = [0u64; FD_WORDS];
        for (i, word) in bits.iter_mut().enumerate() {
            *word = u64::from_le_bytes(bytes[8 * i..8 * i + 8].try_into().unwrap());
        }
        Self { bits }
    }

    /// Overlays reply bytes onto the set, clamped to what the server sent.
    pub fn write_back(&mut self, bytes: &[u8]) {
        let mut image = self.as_bytes();
        let n = bytes.len().min(Self::SIZE);
        image[..n].copy_from_slice(&bytes[..n]);
        *self = Self::from_bytes(&image);
    }
}

// ---------------------------------------------------------------------------
// PollFd
// ---------------------------------------------------------------------------

/// Data available to read.
pub const POLLIN: i16 = 0x0001;
/// Urgent data available.
pub const POLLPRI: i16 = 0x0002;
/// Writing will not block.
pub const POLLOUT: i16 = 0x0004;
/// Error condition (revents only).
pub const POLLERR: i16 = 0x0008;
/// Hang up (revents only).
pub const POLLHUP: i16 = 0x0010;
/// Invalid descriptor (revents only).
pub const POLLNVAL: i16 = 0x0020;

/// One `poll` entry, 8 bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollFd {
    pub fd: i32,
    pub events: i16,
    pub revents: i16,
}

impl PollFd {
    pub const SIZE: usize = 8;

    pub fn new(fd: i32, events: i16) -> Self {
        Self {
            fd,
            events,
            revents: 0,
        }
    }

    pub fn as_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.fd.to_le_bytes());
        out[4..6].copy_from_slice(&self.events.to_le_bytes());
        out[6..8].copy_from_slice(&self.revents.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            fd: i32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            events: i16::from_le_bytes(bytes[4..6].try_into().unwrap()),
            revents: i16::from_le_bytes(bytes[6..8].try_into().unwrap()),
        }
    }
}

// ---------------------------------------------------------------------------
// IfConf
// ---------------------------------------------------------------------------

/// Interface-list ioctl header, 16 bytes on the wire (4 bytes of padding
/// after `ifc_len`, then the server-side buffer pointer carried verbatim).
///
/// `ifc_len` sizes the second wire buffer of the `SIOCGIFCONF` request. It
/// is read from caller-owned memory and trusted as-is; see the ioctl module
/// docs for the trust boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IfConf {
    /// Byte length of the interface request list.
    pub ifc_len: i32,
    /// Pointer-sized field the server interprets; opaque to this client.
    pub ifc_buf: u64,
}

impl IfConf {
    pub const SIZE: usize = 16;

    pub fn as_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.ifc_len.to_le_bytes());
        out[8..16].copy_from_slice(&self.ifc_buf.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            ifc_len: i32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            ifc_buf: u64::from_le_bytes(bytes[8..16].try_into().unwrap()),
        }
    }

    /// Overlays reply bytes, clamped to what the server sent.
    pub fn write_back(&mut self, bytes: &[u8]) {
        let mut image = self.as_bytes();
        let n = bytes.len().min(Self::SIZE);
        image[..n].copy_from_slice(&bytes[..n]);
        *self = Self::from_bytes(&image);
    }
}

// ---------------------------------------------------------------------------
// IfMediaReq
// ---------------------------------------------------------------------------

/// Media-request ioctl header, 48 bytes on the wire (4 bytes of padding
/// before `ifm_ulist`).
///
/// `ifm_count` sizes the media-word list: the second wire buffer of the
/// `SIOCGIFMEDIA`/`SIOCGIFXMEDIA` requests carries `8 * ifm_count` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IfMediaReq {
    /// Interface name, NUL-padded.
    pub ifm_name: [u8; 16],
    pub ifm_current: i32,
    pub ifm_mask: i32,
    pub ifm_status: i32,
    pub ifm_active: i32,
    /// Number of entries the media-word list can hold.
    pub ifm_count: i32,
    /// Pointer-sized field the server interprets; opaque to this client.
    pub ifm_ulist: u64,
}

impl IfMediaReq {
    pub const SIZE: usize = 48;

    pub fn as_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..16].copy_from_slice(&self.ifm_name);
        out[16..20].copy_from_slice(&self.ifm_current.to_le_bytes());
        out[20..24].copy_from_slice(&self.ifm_mask.to_le_bytes());
        out[24..28].copy_from_slice(&self.ifm_status.to_le_bytes());
        out[28..32].copy_from_slice(&self.ifm_active.to_le_bytes());
        out[32..36].copy_from_slice(&self.ifm_count.to_le_bytes());
        out[40..48].copy_from_slice(&self.ifm_ulist.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            ifm_name: bytes[0..16].try_into().unwrap(),
            ifm_current: i32::from_le_bytes(bytes[16..20].try_into().unwrap()),
            ifm_mask: i32::from_le_bytes(bytes[20..24].try_into().unwrap()),
            ifm_status: i32::from_le_bytes(bytes[24..28].try_into().unwrap()),
            ifm_active: i32::from_le_bytes(bytes[28..32].try_into().unwrap()),
            ifm_count: i32::from_le_bytes(bytes[32..36].try_into().unwrap()),
            ifm_ulist: u64::from_le_bytes(bytes[40..48].try_into().unwrap()),
        }
    }

    /// Overlays reply bytes, clamped to what the server sent.
    pub fn write_back(&mut self, bytes: &[u8]) {
        let mut image = self.as_bytes();
        let n = bytes.len().min(Self::SIZE);
        image[..n].copy_from_slice(&bytes[..n]);
        *self = Self::from_bytes(&image);
    }
}
