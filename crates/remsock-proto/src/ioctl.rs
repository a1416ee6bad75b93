//! Ioctl request-code classification.
//!
//! A request code encodes, in its own bits, how the single caller argument
//! is shaped: a length field (bits 16..29) and direction bits (`IOC_IN`:
//! the server reads the buffer, `IOC_OUT`: the server writes it, both: the
//! same buffer travels in both directions). Two named request codes break
//! the pattern and carry a second buffer whose wire length comes from a
//! field *inside* the first buffer: the interface-list request sizes it
//! from `IfConf::ifc_len`, the media requests from `8 * ifm_count`.
//!
//! Those derived lengths are read from caller-owned memory and are trusted
//! as-is. This is a deliberate caller-trust boundary, not a validated
//! invariant: clamping or rejecting them here would change what the remote
//! service observes. The backing storage handed to the transport is never
//! overrun regardless; only the advertised wire length follows the caller's
//! field.

use crate::types::{IfConf, IfMediaReq};

// ---------------------------------------------------------------------------
// Request-code bit layout (BSD _IO/_IOR/_IOW/_IOWR encoding)
// ---------------------------------------------------------------------------

/// Mask for the parameter-length bit-field.
pub const IOCPARM_MASK: u32 = 0x1FFF;
/// No parameter at all.
pub const IOC_VOID: u32 = 0x2000_0000;
/// The server writes the parameter buffer.
pub const IOC_OUT: u32 = 0x4000_0000;
/// The server reads the parameter buffer.
pub const IOC_IN: u32 = 0x8000_0000;
/// Both directions, one buffer.
pub const IOC_INOUT: u32 = IOC_IN | IOC_OUT;

/// Parameter length encoded in a request code.
#[inline]
pub const fn iocparm_len(request: u32) -> usize {
    ((request >> 16) & IOCPARM_MASK) as usize
}

/// Builds a request code from direction bits, group, number and length.
pub const fn ioc(inout: u32, group: u8, num: u8, len: usize) -> u32 {
    inout | (((len as u32) & IOCPARM_MASK) << 16) | ((group as u32) << 8) | num as u32
}

// ---------------------------------------------------------------------------
// Named multi-buffer request codes
// ---------------------------------------------------------------------------

/// Get the interface configuration list.
pub const SIOCGIFCONF: u32 = ioc(IOC_INOUT, b'i', 36, IfConf::SIZE);
/// Get the media types of an interface.
pub const SIOCGIFMEDIA: u32 = ioc(IOC_INOUT, b'i', 56, IfMediaReq::SIZE);
/// Extended variant of [`SIOCGIFMEDIA`].
pub const SIOCGIFXMEDIA: u32 = ioc(IOC_INOUT, b'i', 139, IfMediaReq::SIZE);

/// Wire length of the media-word list for a given `ifm_count`.
///
/// The count is reinterpreted as an unsigned size before multiplying, so a
/// negative count wraps instead of failing (trust boundary as per the
/// module docs).
#[inline]
pub const fn media_ulist_len(count: i32) -> usize {
    (count as usize).wrapping_mul(8)
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Shape of an ioctl request's payload, decided by the request code alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlClass {
    /// `SIOCGIFCONF`: header + list buffer sized by `ifc_len`.
    InterfaceConfig,
    /// `SIOCGIFMEDIA`/`SIOCGIFXMEDIA`: header + list sized by `ifm_count`.
    MediaRequest,
    /// Everything else: one buffer (or none), shaped by the code's bits.
    Generic {
        /// Server reads the buffer (`IOC_IN`).
        read: bool,
        /// Server writes the buffer (`IOC_OUT`).
        write: bool,
        /// Wire length from the code's length bit-field.
        len: usize,
    },
}

/// Classifies a request code.
pub fn classify(request: u32) -> IoctlClass {
    match request {
        SIOCGIFCONF => IoctlClass::InterfaceConfig,
        SIOCGIFMEDIA | SIOCGIFXMEDIA => IoctlClass::MediaRequest,
        _ => IoctlClass::Generic {
            read: request & IOC_IN != 0,
            write: request & IOC_OUT != 0,
            len: iocparm_len(request),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parm_len_extraction() {
        assert_eq!(iocparm_len(ioc(IOC_IN, b'x', 1, 0)), 0);
        assert_eq!(iocparm_len(ioc(IOC_IN, b'x', 1, 4)), 4);
        assert_eq!(iocparm_len(ioc(IOC_OUT, b'x', 1, 0x1FFF)), 0x1FFF);
    }

    #[test]
    fn ioc_places_group_and_number() {
        let code = ioc(IOC_IN, b'i', 36, 16);
        assert_eq!(code & 0xFF, 36);
        assert_eq!((code >> 8) & 0xFF, b'i' as u32);
        assert_eq!(code & IOC_IN, IOC_IN);
    }

    #[test]
    fn named_codes_classify_as_multibuffer() {
        assert_eq!(classify(SIOCGIFCONF), IoctlClass::InterfaceConfig);
        assert_eq!(classify(SIOCGIFMEDIA), IoctlClass::MediaRequest);
        assert_eq!(classify(SIOCGIFXMEDIA), IoctlClass::MediaRequest);
    }

    #[test]
    fn generic_directions_follow_bits() {
        let inonly = ioc(IOC_IN, b'f', 1, 8);
        let outonly = ioc(IOC_OUT, b'f', 2, 8);
        let both = ioc(IOC_INOUT, b'f', 3, 12);
        let void = ioc(IOC_VOID, b'f', 4, 0);
        assert_eq!(
            classify(inonly),
            IoctlClass::Generic {
                read: true,
                write: false,
                len: 8
            }
        );
        assert_eq!(
            classify(outonly),
            IoctlClass::Generic {
                read: false,
                write: true,
                len: 8
            }
        );
        assert_eq!(
            classify(both),
            IoctlClass::Generic {
                read: true,
                write: true,
                len: 12
            }
        );
        assert_eq!(
            classify(void),
            IoctlClass::Generic {
                read: false,
                write: false,
                len: 0
            }
        );
    }

    #[test]
    fn media_list_length_is_eight_per_entry() {
        assert_eq!(media_ulist_len(0), 0);
        assert_eq!(media_ulist_len(1), 8);
        assert_eq!(media_ulist_len(7), 56);
    }
}
