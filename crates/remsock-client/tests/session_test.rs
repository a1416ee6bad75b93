//! Session establishment against the scripted transport.

mod common;

use common::{
    new_session, session_ok, session_rejected, MockConnector, TEST_CLIENT_ID,
};
use remsock_client::{
    BufferConfig, IpcError, Session, SessionError, SERVICE_PRIVILEGED, SERVICE_USER,
};

#[test]
fn connects_privileged_service_for_both_channels() {
    let _guard = common::session_lock();
    let conn = MockConnector::new();
    let session = new_session(&conn);

    assert_eq!(session.client_id(), TEST_CLIENT_ID);
    let state = conn.state.lock();
    assert_eq!(state.connects, vec![SERVICE_PRIVILEGED, SERVICE_PRIVILEGED]);
}

#[test]
fn falls_back_to_user_service() {
    let _guard = common::session_lock();
    let conn = MockConnector::new();
    conn.state
        .lock()
        .connect_errors
        .push_back(IpcError::ServiceNotFound(SERVICE_PRIVILEGED.into()));
    let _session = new_session(&conn);

    // Both channels end up on the fallback name.
    let state = conn.state.lock();
    assert_eq!(
        state.connects,
        vec![SERVICE_PRIVILEGED, SERVICE_USER, SERVICE_USER]
    );
}

#[test]
fn transfer_memory_sized_from_config() {
    let _guard = common::session_lock();
    let conn = MockConnector::new();
    let session = new_session(&conn);

    assert_eq!(session.transfer_memory_size(), 0x234000);
    assert_eq!(conn.state.lock().tmem_sizes, vec![0x234000]);
}

#[test]
fn register_client_wire_layout() {
    let _guard = common::session_lock();
    let conn = MockConnector::new();
    let _session = new_session(&conn);

    let state = conn.state.lock();
    let reg = &state.requests[0];
    assert_eq!(reg.opcode(), 0);
    assert!(reg.send_pid);
    assert_eq!(reg.copy_handles, vec![0x5401]);

    // 32-byte configuration, then the process-id placeholder, then the
    // transfer-memory size.
    let scalars = reg.scalars();
    assert_eq!(scalars.len(), 48);
    let cfg = BufferConfig::default();
    assert_eq!(&scalars[0..4], &cfg.version.to_le_bytes());
    assert_eq!(&scalars[4..8], &cfg.tcp_tx_buf_size.to_le_bytes());
    assert_eq!(&scalars[28..32], &cfg.sb_efficiency.to_le_bytes());
    assert_eq!(&scalars[32..40], &0u64.to_le_bytes());
    assert_eq!(&scalars[40..48], &0x234000u64.to_le_bytes());
}

#[test]
fn start_monitor_carries_client_id() {
    let _guard = common::session_lock();
    let conn = MockConnector::new();
    let _session = new_session(&conn);

    let state = conn.state.lock();
    let mon = &state.requests[1];
    assert_eq!(mon.opcode(), 1);
    assert!(mon.send_pid);
    assert_eq!(mon.scalars(), &TEST_CLIENT_ID.to_le_bytes());
}

#[test]
fn second_initialize_is_rejected_while_live() {
    let _guard = common::session_lock();
    let conn = MockConnector::new();
    let _session = new_session(&conn);

    let connects_before = conn.state.lock().connects.len();
    let second = Session::initialize(&conn, &BufferConfig::default());
    assert!(matches!(second, Err(SessionError::AlreadyInitialized)));
    // Rejected before touching the transport.
    assert_eq!(conn.state.lock().connects.len(), connects_before);
}

#[test]
fn initialize_allowed_again_after_drop() {
    let _guard = common::session_lock();
    let conn = MockConnector::new();
    let session = new_session(&conn);
    session.shutdown();
    let _second = new_session(&conn);
}

#[test]
fn drop_releases_transfer_memory() {
    let _guard = common::session_lock();
    let conn = MockConnector::new();
    let session = new_session(&conn);
    assert_eq!(conn.state.lock().live_tmem, 1);
    drop(session);
    assert_eq!(conn.state.lock().live_tmem, 0);
}

#[test]
fn register_client_rejection_tears_everything_down() {
    let _guard = common::session_lock();
    let conn = MockConnector::new();
    conn.script(session_rejected(0x4EE));

    let result = Session::initialize(&conn, &BufferConfig::default());
    assert!(matches!(
        result,
        Err(SessionError::Rejected {
            step: "register-client",
            status: 0x4EE,
        })
    ));
    assert_eq!(conn.state.lock().live_tmem, 0);

    // The liveness flag was cleared on the way out.
    let _session = new_session(&conn);
}

#[test]
fn start_monitor_rejection_tears_everything_down() {
    let _guard = common::session_lock();
    let conn = MockConnector::new();
    conn.script(session_ok(&TEST_CLIENT_ID.to_le_bytes()));
    conn.script(session_rejected(0xF601));

    let result = Session::initialize(&conn, &BufferConfig::default());
    assert!(matches!(
        result,
        Err(SessionError::Rejected {
            step: "start-monitor",
            ..
        })
    ));
    assert_eq!(conn.state.lock().live_tmem, 0);
    let _session = new_session(&conn);
}

#[test]
fn connect_failure_propagates_and_unlocks() {
    let _guard = common::session_lock();
    let conn = MockConnector::new();
    {
        let mut state = conn.state.lock();
        state
            .connect_errors
            .push_back(IpcError::ServiceNotFound(SERVICE_PRIVILEGED.into()));
        state
            .connect_errors
            .push_back(IpcError::ServiceNotFound(SERVICE_USER.into()));
    }

    let result = Session::initialize(&conn, &BufferConfig::default());
    assert!(matches!(result, Err(SessionError::Ipc(_))));
    let _session = new_session(&conn);
}

#[test]
fn malformed_registration_reply_is_an_error() {
    let _guard = common::session_lock();
    let conn = MockConnector::new();
    conn.script(Ok(remsock_client::Response {
        raw: vec![0u8; 4],
        outputs: Vec::new(),
    }));

    let result = Session::initialize(&conn, &BufferConfig::default());
    assert!(matches!(result, Err(SessionError::MalformedReply(_))));
    let _session = new_session(&conn);
}
