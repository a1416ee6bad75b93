//! Session establishment and teardown.
//!
//! A session owns two channels to the sockets service (control and
//! monitor), the shared transfer-memory region bulk payloads flow through,
//! and the server-assigned client id. At most one session is live per
//! process; every public operation is a method on [`Session`], so the
//! "initialized before use" rule holds by construction, and the liveness
//! flag below turns a second initialization into a clean error instead.

use parking_lot::Mutex;
use remsock_proto::command::{CommandWriter, Request};
use remsock_proto::config::BufferConfig;
use remsock_proto::opcode::OpCode;
use remsock_proto::reply::{ReplyError, SessionReply};
use thiserror::Error;

use crate::ipc::{Channel, Connector, IpcError, TransferMemory};

/// Privileged service name, tried first.
pub const SERVICE_PRIVILEGED: &str = "bsd:s";
/// Unprivileged fallback service name.
pub const SERVICE_USER: &str = "bsd:u";

static SESSION_LIVE: Mutex<bool> = Mutex::new(false);

/// Session initialization failure.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a session is already live in this process")]
    AlreadyInitialized,
    #[error("ipc: {0}")]
    Ipc(#[from] IpcError),
    #[error("malformed session reply: {0}")]
    MalformedReply(#[from] ReplyError),
    #[error("{step} rejected with status {status:#x}")]
    Rejected { step: &'static str, status: u64 },
}

/// A live session with the remote sockets service.
///
/// Dropping the session closes both channels, releases the transfer-memory
/// region and clears the process-wide liveness flag; [`Session::shutdown`]
/// does the same explicitly. Session state is read-only after
/// initialization, so operations may be issued from multiple threads;
/// serializing them (or not) is the transport's business.
pub struct Session<C: Connector> {
    // Field order is drop order: monitor, control, then the region.
    /// Held open for the session lifetime; the server watches it to detect
    /// client death.
    _monitor: C::Chan,
    pub(crate) control: C::Chan,
    tmem: C::Tmem,
    client_id: u64,
}

impl<C: Connector> Session<C> {
    /// Establishes the process-wide session.
    ///
    /// Resolves the privileged service name, falling back to the
    /// unprivileged one; opens a second channel to the same name for
    /// monitoring; allocates transfer memory of
    /// [`BufferConfig::transfer_memory_size`] bytes; registers the client
    /// (handing over the region and the configuration) and starts
    /// monitoring under the returned client id.
    ///
    /// Fails with [`SessionError::AlreadyInitialized`] while another
    /// session is live. Any mid-sequence failure tears down everything
    /// acquired so far before the error is returned; there is no internal
    /// retry and nothing partially initialized is ever left behind.
    pub fn initialize(connector: &C, config: &BufferConfig) -> Result<Self, SessionError> {
        {
            let mut live = SESSION_LIVE.lock();
            if *live {
                return Err(SessionError::AlreadyInitialized);
            }
            *live = true;
        }

        // Partially acquired channels and memory are dropped (and thereby
        // released) on the error path out of bring_up.
        match Self::bring_up(connector, config) {
            Ok(session) => Ok(session),
            Err(err) => {
                *SESSION_LIVE.lock() = false;
                Err(err)
            }
        }
    }

    fn bring_up(connector: &C, config: &BufferConfig) -> Result<Self, SessionError> {
        let (control, service) = match connector.connect(SERVICE_PRIVILEGED) {
            Ok(chan) => (chan, SERVICE_PRIVILEGED),
            Err(_) => (connector.connect(SERVICE_USER)?, SERVICE_USER),
        };
        let monitor = connector.connect(service)?;

        let tmem = connector.create_transfer_memory(config.transfer_memory_size())?;

        let client_id = register_client(&control, &tmem, config)?;
        start_monitor(&monitor, client_id)?;

        Ok(Self {
            _monitor: monitor,
            control,
            tmem,
            client_id,
        })
    }

    /// Server-assigned client id bound to this session.
    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    /// Size of the negotiated transfer-memory region.
    pub fn transfer_memory_size(&self) -> usize {
        self.tmem.size()
    }

    /// Tears the session down. Equivalent to dropping it; spelled out so
    /// call sites can make the finalization explicit.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl<C: Connector> Drop for Session<C> {
    fn drop(&mut self) {
        *SESSION_LIVE.lock() = false;
    }
}

/// Register-client (opcode 0): binds this process to a server-side session.
///
/// The header carries the buffer configuration, a reserved placeholder the
/// kernel overwrites with the caller's process id, and the transfer-memory
/// size; the message itself carries the process id and a copy of the
/// region's handle. The reply trailer is the assigned client id.
fn register_client<Ch: Channel, Tm: TransferMemory>(
    control: &Ch,
    tmem: &Tm,
    config: &BufferConfig,
) -> Result<u64, SessionError> {
    let mut w = CommandWriter::new(OpCode::RegisterClient);
    config.encode_into(&mut w);
    w.put_u64(0); // process-id placeholder, patched in flight
    w.put_u64(tmem.size() as u64);

    let mut req = Request::new(w.finish());
    req.send_pid = true;
    req.copy_handles.push(tmem.handle());

    let resp = control.dispatch(&req)?;
    let reply = SessionReply::parse(&resp.raw)?;
    if reply.status != 0 {
        return Err(SessionError::Rejected {
            step: "register-client",
            status: reply.status,
        });
    }
    Ok(reply.trailing_u64(0)?)
}

/// Start-monitor (opcode 1): begins session monitoring for `client_id` on
/// the monitor channel.
fn start_monitor<Ch: Channel>(monitor: &Ch, client_id: u64) -> Result<(), SessionError> {
    let mut w = CommandWriter::new(OpCode::StartMonitor);
    w.put_u64(client_id);

    let mut req = Request::new(w.finish());
    req.send_pid = true;

    let resp = monitor.dispatch(&req)?;
    let reply = SessionReply::parse(&resp.raw)?;
    if reply.status != 0 {
        return Err(SessionError::Rejected {
            step: "start-monitor",
            status: reply.status,
        });
    }
    Ok(())
}
