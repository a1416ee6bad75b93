//! # remsock-client
//!
//! Client for a privileged BSD sockets service reached over synchronous
//! IPC. Application code calls POSIX-shaped operations (`socket`, `bind`,
//! `connect`, `send`, `recv`, `select`, `poll`, `ioctl`, ...) on a
//! [`Session`]; each call marshals its arguments into a command buffer and
//! directional buffer descriptors, performs exactly one round trip over the
//! session's control channel, and translates the reply back into a POSIX
//! return value plus a thread-local errno.
//!
//! The IPC transport itself is an external collaborator supplied through
//! the traits in [`ipc`]: service-name resolution, command dispatch, and
//! transfer-memory allocation. [`Session::initialize`] wires them together:
//! it connects a control and a monitor channel, negotiates a shared
//! transfer-memory region sized from a [`BufferConfig`], registers the
//! client, and starts session monitoring.
//!
//! Two failure domains are kept disjoint. Transport-level failures (broken
//! channel, non-success reply status) surface as `-1` with errno
//! [`errno::EPIPE`]; failures reported by the remote socket implementation
//! surface as `-1` with the server's errno and are indistinguishable from a
//! local POSIX error by design.

pub mod errno;
pub mod ipc;
pub mod ops;
pub mod session;

pub use ipc::{Channel, Connector, IpcError, Response, TransferMemory};
pub use ops::{IoctlArg, F_GETFL, F_SETFL};
pub use remsock_proto as proto;
pub use remsock_proto::BufferConfig;
pub use session::{Session, SessionError, SERVICE_PRIVILEGED, SERVICE_USER};
