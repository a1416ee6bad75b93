//! Operation codes.
//!
//! The numeric values are the wire contract with the sockets service and
//! must never be renumbered. Codes 0 and 1 are session-management commands
//! issued once at initialization; the rest map one-to-one onto the public
//! POSIX-shaped operations.

/// Operation code carried in the second `u64` of every command header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum OpCode {
    /// Bind this process to a server-side session, handing over the
    /// transfer-memory region and buffer configuration.
    RegisterClient = 0,
    /// Start session monitoring for a registered client id.
    StartMonitor = 1,
    Socket = 2,
    /// `socket` variant exempt from the per-process socket quota.
    SocketExempt = 3,
    Open = 4,
    Select = 5,
    Poll = 6,
    Sysctl = 7,
    Recv = 8,
    RecvFrom = 9,
    Send = 10,
    SendTo = 11,
    Accept = 12,
    Bind = 13,
    Connect = 14,
    GetPeerName = 15,
    GetSockName = 16,
    GetSockOpt = 17,
    Listen = 18,
    Ioctl = 19,
    Fcntl = 20,
    SetSockOpt = 21,
    Shutdown = 22,
    /// Shut down every socket owned by the session.
    ShutdownAllSockets = 23,
    Write = 24,
    Read = 25,
    Close = 26,
    DuplicateSocket = 27,
}

impl OpCode {
    /// Wire value of this operation code.
    #[inline]
    pub const fn value(self) -> u64 {
        self as u64
    }
}
