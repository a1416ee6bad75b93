//! Shared test doubles: a scripted, recording IPC transport.
//!
//! `MockConnector` implements the transport traits over a single shared
//! state cell. Every dispatched request is recorded (header bytes, the
//! descriptor lists with their declared lengths and flags, handles, the
//! process-id flag); replies are popped from a script queue, defaulting to
//! a bare success reply when the queue runs dry.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use remsock_client::ipc::{Channel, Connector, IpcError, Response, TransferMemory};
use remsock_client::proto::command::Request;
use remsock_client::proto::reply::build;
use remsock_client::{BufferConfig, Session};

// The session liveness flag is process-wide, so tests that initialize a
// session must not overlap.
static SESSION_GUARD: Mutex<()> = Mutex::new(());

pub fn session_lock() -> MutexGuard<'static, ()> {
    SESSION_GUARD.lock()
}

/// One recorded send descriptor: a copy of the backing bytes plus the
/// declared wire length and flags word.
#[derive(Debug, Clone)]
pub struct TxRecord {
    pub data: Vec<u8>,
    pub declared: usize,
    pub flags: u32,
}

/// One recorded receive descriptor.
#[derive(Debug, Clone)]
pub struct RxRecord {
    pub capacity: usize,
    pub flags: u32,
}

/// Everything the mock saw for one dispatched request.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub service: String,
    pub header: Vec<u8>,
    pub tx: Vec<TxRecord>,
    pub rx: Vec<RxRecord>,
    pub copy_handles: Vec<u32>,
    pub send_pid: bool,
}

impl Recorded {
    /// Operation code from the recorded header.
    pub fn opcode(&self) -> u64 {
        u64::from_le_bytes(self.header[8..16].try_into().unwrap())
    }

    /// Header bytes past the magic and operation code.
    pub fn scalars(&self) -> &[u8] {
        &self.header[16..]
    }
}

#[derive(Default)]
pub struct MockState {
    /// Errors to hand out from `connect`, one per call; an empty queue
    /// means every connect succeeds.
    pub connect_errors: VecDeque<IpcError>,
    /// Service names passed to `connect`, in order.
    pub connects: Vec<String>,
    /// Scripted replies, popped per dispatch. Empty queue: bare success.
    pub responses: VecDeque<Result<Response, IpcError>>,
    /// Every dispatched request, in order, across all channels.
    pub requests: Vec<Recorded>,
    /// Sizes passed to `create_transfer_memory`, in order.
    pub tmem_sizes: Vec<usize>,
    /// Transfer-memory blocks currently alive (created minus dropped).
    pub live_tmem: usize,
}

#[derive(Clone, Default)]
pub struct MockConnector {
    pub state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one reply.
    pub fn script(&self, response: Result<Response, IpcError>) {
        self.state.lock().responses.push_back(response);
    }

    /// Number of requests dispatched so far.
    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Clone of the most recently dispatched request.
    pub fn last_request(&self) -> Recorded {
        self.state
            .lock()
            .requests
            .last()
            .expect("no request dispatched")
            .clone()
    }
}

pub struct MockChannel {
    service: String,
    state: Arc<Mutex<MockState>>,
}

impl Channel for MockChannel {
    fn dispatch(&self, request: &Request<'_>) -> Result<Response, IpcError> {
        let mut state = self.state.lock();
        state.requests.push(Recorded {
            service: self.service.clone(),
            header: request.header.clone(),
            tx: request
                .tx
                .iter()
                .map(|t| TxRecord {
                    data: t.data.to_vec(),
                    declared: t.declared,
                    flags: t.flags,
                })
                .collect(),
            rx: request
                .rx
                .iter()
                .map(|r| RxRecord {
                    capacity: r.capacity,
                    flags: r.flags,
                })
                .collect(),
            copy_handles: request.copy_handles.clone(),
            send_pid: request.send_pid,
        });
        state.responses.pop_front().unwrap_or_else(|| {
            Ok(Response {
                raw: build::reply(0, 0, 0, &[]),
                outputs: Vec::new(),
            })
        })
    }
}

pub struct MockTmem {
    handle: u32,
    size: usize,
    state: Arc<Mutex<MockState>>,
}

impl TransferMemory for MockTmem {
    fn handle(&self) -> u32 {
        self.handle
    }

    fn size(&self) -> usize {
        self.size
    }
}

impl Drop for MockTmem {
    fn drop(&mut self) {
        self.state.lock().live_tmem -= 1;
    }
}

impl Connector for MockConnector {
    type Chan = MockChannel;
    type Tmem = MockTmem;

    fn connect(&self, service: &str) -> Result<MockChannel, IpcError> {
        let mut state = self.state.lock();
        state.connects.push(service.to_string());
        if let Some(err) = state.connect_errors.pop_front() {
            return Err(err);
        }
        Ok(MockChannel {
            service: service.to_string(),
            state: Arc::clone(&self.state),
        })
    }

    fn create_transfer_memory(&self, size: usize) -> Result<MockTmem, IpcError> {
        let mut state = self.state.lock();
        state.tmem_sizes.push(size);
        state.live_tmem += 1;
        // Distinct fake handle per allocation.
        let handle = 0x5400 + state.tmem_sizes.len() as u32;
        Ok(MockTmem {
            handle,
            size,
            state: Arc::clone(&self.state),
        })
    }
}

/// Client id handed out by [`new_session`]'s scripted registration reply.
pub const TEST_CLIENT_ID: u64 = 7;

/// Scripted reply: success with the given return value and errno.
pub fn ok_reply(ret: i32, errno: i32) -> Result<Response, IpcError> {
    Ok(Response {
        raw: build::reply(0, ret, errno, &[]),
        outputs: Vec::new(),
    })
}

/// Scripted reply with trailing bytes and receive-buffer contents.
pub fn ok_reply_with(
    ret: i32,
    errno: i32,
    trailer: &[u8],
    outputs: Vec<Vec<u8>>,
) -> Result<Response, IpcError> {
    Ok(Response {
        raw: build::reply(0, ret, errno, trailer),
        outputs,
    })
}

/// Scripted session-management success reply.
pub fn session_ok(trailer: &[u8]) -> Result<Response, IpcError> {
    Ok(Response {
        raw: build::session_reply(0, trailer),
        outputs: Vec::new(),
    })
}

/// Scripted session-management rejection.
pub fn session_rejected(status: u64) -> Result<Response, IpcError> {
    Ok(Response {
        raw: build::session_reply(status, &[]),
        outputs: Vec::new(),
    })
}

/// Initializes a session over the mock, scripting the registration and
/// monitor replies. Callers must hold [`session_lock`].
pub fn new_session(conn: &MockConnector) -> Session<MockConnector> {
    conn.script(session_ok(&TEST_CLIENT_ID.to_le_bytes()));
    conn.script(session_ok(&[]));
    Session::initialize(conn, &BufferConfig::default()).expect("session init")
}
