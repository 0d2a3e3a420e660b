//! Tests for the Connection engine
//!
//! These tests verify:
//! - Clean disconnect vs truncated frames on a real socket
//! - Queued send/receive ordering
//! - Worker start/stop state transitions
//! - Orderly shutdown visible to the peer

use std::io::Write;
use std::net::{Shutdown, TcpListener, TcpStream};
use std::thread;

use mpl::network::{Connection, WorkerState};
use mpl::{Message, MessageType, MplError};

// =============================================================================
// Helper Functions
// =============================================================================

fn socket_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let client = thread::spawn(move || TcpStream::connect(addr).unwrap());
    let (server, _) = listener.accept().unwrap();
    (client.join().unwrap(), server)
}

fn connection_pair() -> (Connection, Connection) {
    let (a, b) = socket_pair();
    (Connection::new(a, true).unwrap(), Connection::new(b, true).unwrap())
}

// =============================================================================
// Synchronous Path
// =============================================================================

#[test]
fn test_clean_close_reads_as_disconnect() {
    let (raw, other) = socket_pair();
    let conn = Connection::new(other, true).unwrap();

    raw.shutdown(Shutdown::Write).unwrap();

    let msg = conn.receive_now().unwrap();
    assert_eq!(msg.msg_type(), MessageType::Disconnect);
}

#[test]
fn test_truncated_frame_is_protocol_error() {
    let (mut raw, other) = socket_pair();
    let conn = Connection::new(other, true).unwrap();

    // Header declares 10 bytes, only 3 follow
    raw.write_all(&[0x01, 0x00, 0x00, 0x00, 0x0A, b'a', b'b', b'c']).unwrap();
    drop(raw);

    let result = conn.receive_now();
    assert!(matches!(result, Err(MplError::Protocol(_))));
}

#[test]
fn test_send_now_receive_now() {
    let (a, b) = connection_pair();

    a.send_now(&Message::text("direct", MessageType::Text)).unwrap();
    let msg = b.receive_now().unwrap();

    assert_eq!(msg.as_str(), Some("direct"));
    assert_eq!(msg.msg_type(), MessageType::Text);
}

#[test]
fn test_direct_io_rejected_while_workers_run() {
    let (a, b) = connection_pair();
    a.start_workers(true, true).unwrap();

    assert!(matches!(
        a.send_now(&Message::default()),
        Err(MplError::Connection(_))
    ));
    assert!(matches!(a.receive_now(), Err(MplError::Connection(_))));

    let peer = thread::spawn(move || {
        let msg = b.receive_now().unwrap();
        b.shutdown(None);
        msg
    });

    a.shutdown(None);
    assert!(peer.join().unwrap().is_disconnect());
}

// =============================================================================
// Worker Lifecycle
// =============================================================================

#[test]
fn test_worker_states() {
    let (a, b) = connection_pair();
    assert_eq!(a.send_state(), WorkerState::Stopped);
    assert_eq!(a.recv_state(), WorkerState::Stopped);

    a.start_sending().unwrap();
    a.start_receiving().unwrap();
    assert_eq!(a.send_state(), WorkerState::Running);
    assert_eq!(a.recv_state(), WorkerState::Running);

    // Starting twice is a no-op
    a.start_sending().unwrap();
    assert!(a.is_sending());

    a.stop_sending();
    assert_eq!(a.send_state(), WorkerState::Stopped);

    // Receive worker exits once the peer closes
    b.shutdown(None);
    a.stop_receiving();
    assert_eq!(a.recv_state(), WorkerState::Stopped);
    assert!(a.get_message().is_disconnect());
}

#[test]
fn test_stop_without_start_is_noop() {
    let (a, _b) = connection_pair();
    a.stop_sending();
    a.stop_receiving();
    assert!(!a.is_sending());
    assert!(!a.is_receiving());
}

// =============================================================================
// Queued Path
// =============================================================================

#[test]
fn test_queued_messages_arrive_in_order() {
    let (a, b) = connection_pair();
    a.start_workers(true, false).unwrap();
    b.start_workers(false, true).unwrap();

    for i in 0..200 {
        a.post_message(Message::text(format!("msg {}", i), MessageType::Text));
    }

    for i in 0..200 {
        let msg = b.get_message();
        assert_eq!(msg.as_str(), Some(format!("msg {}", i).as_str()));
    }

    a.shutdown(None);
    assert!(b.get_message().is_disconnect());
    b.shutdown(None);
}

#[test]
fn test_stop_sending_flushes_queue_first() {
    let (a, b) = connection_pair();
    a.start_sending().unwrap();

    for i in 0..50 {
        a.post_message(Message::new(vec![i as u8; 1024], MessageType::Binary));
    }
    a.stop_sending();
    a.shutdown_send();

    // Sentinel never reaches the wire; all 50 frames do
    for i in 0..50 {
        let msg = b.receive_now().unwrap();
        assert_eq!(msg.msg_type(), MessageType::Binary);
        assert_eq!(msg.content()[0], i as u8);
    }
    assert!(b.receive_now().unwrap().is_disconnect());
}

#[test]
fn test_receive_worker_injects_disconnect_on_error() {
    let (mut raw, other) = socket_pair();
    let conn = Connection::new(other, true).unwrap();
    conn.start_receiving().unwrap();

    raw.write_all(&[0x01, 0x00, 0x00]).unwrap();
    drop(raw);

    assert!(conn.get_message().is_disconnect());
    conn.stop_receiving();
    assert!(conn.last_error().unwrap().contains("Incomplete header"));
}

#[test]
fn test_orderly_shutdown_both_sides() {
    let (a, b) = connection_pair();
    a.start_workers(true, true).unwrap();
    b.start_workers(true, true).unwrap();

    a.post_message(Message::text("last words", MessageType::End));

    let peer = thread::spawn(move || {
        let first = b.get_message();
        let second = b.get_message();
        b.shutdown(None);
        (first, second)
    });

    a.shutdown(None);
    assert!(a.is_closed());
    assert!(a.get_message().is_disconnect());

    let (first, second) = peer.join().unwrap();
    assert_eq!(first.as_str(), Some("last words"));
    assert!(second.is_disconnect());
}

#[test]
fn test_shutdown_joins_listener() {
    let (a, b) = connection_pair();
    a.start_workers(true, true).unwrap();

    let inbox = a.recv_queue();
    let listener = thread::spawn(move || {
        let msg = inbox.dequeue();
        assert_eq!(msg.as_str(), Some("before close"));
    });

    b.send_now(&Message::text("before close", MessageType::Text)).unwrap();
    b.shutdown(None);

    a.shutdown(Some(listener));
    assert!(a.last_error().is_none());
}
