//! Directional buffer descriptors.
//!
//! Every piece of caller memory exposed to the remote side is described by
//! one descriptor: a send descriptor (`TxBuf`) the server reads from, or a
//! receive descriptor (`RxBuf`) the server writes into. Descriptors are
//! supplied per operation in a fixed order, and that order is the wire
//! contract: the server pairs them up positionally.
//!
//! A descriptor's declared wire length is independent of the backing slice.
//! For most operations the two coincide, but the ioctl multi-buffer requests
//! derive the wire length from a field inside caller-owned memory, and the
//! address/option receive buffers declare the caller-supplied maximum rather
//! than the storage size. The declared length is what goes on the wire; the
//! transport never reads or writes past the backing storage it is handed.
//!
//! How a descriptor is realized on the wire (inline command buffer vs. the
//! session's transfer-memory region) is the transport's choice, made per
//! descriptor based on size. This layer only states direction and length.

/// A send descriptor: memory the server reads.
#[derive(Debug, Clone, Copy)]
pub struct TxBuf<'a> {
    /// Backing bytes.
    pub data: &'a [u8],
    /// Length advertised on the wire. Usually `data.len()`; see module docs
    /// for the cases where it legally differs.
    pub declared: usize,
    /// Descriptor flags word from the wire contract. Zero except where an
    /// operation mandates otherwise (the `sendto` address descriptor).
    pub flags: u32,
}

impl<'a> TxBuf<'a> {
    /// Descriptor covering `data` exactly.
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            declared: data.len(),
            flags: 0,
        }
    }

    /// Descriptor with an explicit wire length.
    #[inline]
    pub fn with_len(data: &'a [u8], declared: usize) -> Self {
        Self {
            data,
            declared,
            flags: 0,
        }
    }

    /// Descriptor covering `data` with a non-default flags word.
    #[inline]
    pub fn flagged(data: &'a [u8], flags: u32) -> Self {
        Self {
            data,
            declared: data.len(),
            flags,
        }
    }

    /// Placeholder descriptor: null on the wire, zero length.
    #[inline]
    pub fn empty() -> Self {
        Self {
            data: &[],
            declared: 0,
            flags: 0,
        }
    }

    /// Returns `true` if this is a zero-length placeholder.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.declared == 0
    }
}

/// A receive descriptor: capacity the server may write into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxBuf {
    /// Maximum number of bytes the server may produce for this slot.
    pub capacity: usize,
    /// Descriptor flags word, zero for every current operation.
    pub flags: u32,
}

impl RxBuf {
    /// Descriptor with the given capacity.
    #[inline]
    pub fn new(capacity: usize) -> Self {
        Self { capacity, flags: 0 }
    }

    /// Placeholder descriptor: null on the wire, zero capacity.
    #[inline]
    pub fn empty() -> Self {
        Self {
            capacity: 0,
            flags: 0,
        }
    }

    /// Returns `true` if this is a zero-capacity placeholder.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.capacity == 0
    }
}
