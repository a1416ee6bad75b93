//! Transport collaborator interfaces.
//!
//! The low-level IPC machinery lives outside this crate: resolving a
//! service name to a connected channel, pushing a prepared command (header,
//! buffer descriptors, handles, the process-id flag) through a synchronous
//! call, and allocating page-aligned shared memory. These traits are the
//! contract this client consumes; the embedding runtime implements them,
//! and the test suite substitutes recording doubles.

use remsock_proto::command::Request;
use thiserror::Error;

/// Transport-level failure, below the protocol layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IpcError {
    #[error("service not found: {0}")]
    ServiceNotFound(String),
    #[error("channel closed")]
    ChannelClosed,
    #[error("transport error {0:#x}")]
    Transport(u64),
}

/// What the transport hands back from one dispatch.
#[derive(Debug, Clone, Default)]
pub struct Response {
    /// Raw reply bytes (parsed by the reply decoder).
    pub raw: Vec<u8>,
    /// Bytes the server produced for each receive descriptor, positionally
    /// matched to the request's `rx` list, each at most the declared
    /// capacity. Missing entries mean the server wrote nothing.
    pub outputs: Vec<Vec<u8>>,
}

/// A connected channel to the service, used for synchronous request/reply.
pub trait Channel {
    /// Sends one prepared command and returns the decoded reply buffer, or
    /// a transport-level failure. Exactly one round trip, no retries.
    fn dispatch(&self, request: &Request<'_>) -> Result<Response, IpcError>;
}

/// A shared memory block registered with the server as the session's
/// transfer-memory region. Released when dropped.
pub trait TransferMemory {
    /// Kernel handle copied into the register-client message.
    fn handle(&self) -> u32;
    /// Region size in bytes.
    fn size(&self) -> usize;
}

/// Entry point into the embedding IPC runtime.
pub trait Connector {
    type Chan: Channel;
    type Tmem: TransferMemory;

    /// Resolves a service name to a connected channel.
    fn connect(&self, service: &str) -> Result<Self::Chan, IpcError>;

    /// Allocates a page-aligned shared memory block of `size` bytes.
    fn create_transfer_memory(&self, size: usize) -> Result<Self::Tmem, IpcError>;
}
