//! Server Tests
//!
//! End-to-end tests driving a real listener over loopback TCP.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use rustore::{
    Client, Config, PutStatus, RemoveStatus, Server, ServerState, ShutdownHandle, ShutdownPolicy,
};

type ServerThread = thread::JoinHandle<rustore::Result<()>>;

fn local_config() -> Config {
    Config::builder().listen_addr("127.0.0.1:0").build()
}

/// Bind on an ephemeral port and run the server on its own thread
fn start(config: Config) -> (SocketAddr, ShutdownHandle, ServerThread) {
    let server = Server::bind(config).unwrap();
    let addr = server.local_addr();
    let handle = server.shutdown_handle();
    let join = thread::spawn(move || server.run());
    (addr, handle, join)
}

fn stop(handle: &ShutdownHandle, join: ServerThread) {
    handle.shutdown();
    join.join().unwrap().unwrap();
    assert_eq!(handle.state(), ServerState::Stopped);
}

fn wait_for_state(handle: &ShutdownHandle, state: ServerState) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while handle.state() != state {
        assert!(Instant::now() < deadline, "server never reached {:?}", state);
        thread::sleep(Duration::from_millis(10));
    }
}

/// True once the server has closed its end of `stream`
fn closed_by_server(stream: &mut TcpStream) -> bool {
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let mut buf = [0u8; 16];
    match stream.read(&mut buf) {
        Ok(0) => true,
        Ok(_) => false,
        Err(e) => !matches!(
            e.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        ),
    }
}

// =============================================================================
// Operation Tests
// =============================================================================

#[test]
fn test_put_get_remove_list_disconnect() {
    let (addr, handle, join) = start(local_config());
    let mut client = Client::connect(addr).unwrap();
    assert_eq!(client.peer_addr(), addr.to_string());

    assert_eq!(client.put("x", &[1, 2, 3]).unwrap(), PutStatus::Success);
    assert_eq!(client.get("x").unwrap().as_deref(), Some(&[1u8, 2, 3][..]));
    assert_eq!(client.remove("x").unwrap(), RemoveStatus::Success);
    assert_eq!(client.get("x").unwrap(), None);
    assert!(client.list().unwrap().is_empty());
    client.disconnect().unwrap();

    stop(&handle, join);
}

#[test]
fn test_duplicate_put_keeps_stream_in_sync() {
    let (addr, handle, join) = start(local_config());
    let mut client = Client::connect(addr).unwrap();

    assert_eq!(client.put("k", b"first").unwrap(), PutStatus::Success);
    assert_eq!(
        client.put("k", b"second, and longer").unwrap(),
        PutStatus::KeyAlreadyExists
    );
    assert_eq!(client.get("k").unwrap().as_deref(), Some(&b"first"[..]));
    assert_eq!(client.list().unwrap(), vec!["k".to_string()]);
    client.disconnect().unwrap();

    stop(&handle, join);
}

#[test]
fn test_zero_length_and_binary_objects() {
    let (addr, handle, join) = start(local_config());
    let mut client = Client::connect(addr).unwrap();

    let binary: Vec<u8> = (0..=255).cycle().take(100_000).collect();

    assert_eq!(client.put("empty", b"").unwrap(), PutStatus::Success);
    assert_eq!(client.put("binary", &binary).unwrap(), PutStatus::Success);

    assert_eq!(client.get("empty").unwrap().as_deref(), Some(&b""[..]));
    assert_eq!(client.get("binary").unwrap().as_deref(), Some(&binary[..]));
    client.disconnect().unwrap();

    stop(&handle, join);
}

#[test]
fn test_remove_absent_key() {
    let (addr, handle, join) = start(local_config());
    let mut client = Client::connect(addr).unwrap();

    client.put("kept", b"v").unwrap();
    assert_eq!(client.remove("ghost").unwrap(), RemoveStatus::KeyNotExists);
    assert_eq!(client.list().unwrap(), vec!["kept".to_string()]);
    client.disconnect().unwrap();

    stop(&handle, join);
}

#[test]
fn test_list_three_keys_and_empty_key() {
    let (addr, handle, join) = start(local_config());
    let mut client = Client::connect(addr).unwrap();

    for key in ["b", "c", "a"] {
        client.put(key, key.as_bytes()).unwrap();
    }
    let mut keys = client.list().unwrap();
    keys.sort();
    assert_eq!(keys, vec!["a", "b", "c"]);

    for key in ["a", "b", "c"] {
        client.remove(key).unwrap();
    }
    client.put("", b"nameless").unwrap();
    assert_eq!(client.list().unwrap(), vec![String::new()]);
    client.disconnect().unwrap();

    stop(&handle, join);
}

#[test]
fn test_clients_share_one_store() {
    let (addr, handle, join) = start(local_config());
    let mut writer = Client::connect(addr).unwrap();
    let mut reader = Client::connect(addr).unwrap();

    writer.put("shared", b"hello").unwrap();
    assert_eq!(reader.get("shared").unwrap().as_deref(), Some(&b"hello"[..]));
    assert_eq!(
        reader.put("shared", b"other").unwrap(),
        PutStatus::KeyAlreadyExists
    );

    writer.disconnect().unwrap();
    reader.disconnect().unwrap();
    stop(&handle, join);
}

#[test]
fn test_concurrent_clients_one_put_wins() {
    let (addr, handle, join) = start(local_config());

    let workers: Vec<_> = (0..8u8)
        .map(|i| {
            thread::spawn(move || {
                let mut client = Client::connect(addr).unwrap();
                let status = client.put("race", &[i]).unwrap();
                client.disconnect().unwrap();
                status
            })
        })
        .collect();

    let wins = workers
        .into_iter()
        .map(|w| w.join().unwrap())
        .filter(|s| *s == PutStatus::Success)
        .count();
    assert_eq!(wins, 1);

    stop(&handle, join);
}

#[test]
fn test_file_round_trip() {
    let (addr, handle, join) = start(local_config());
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("upload.bin");
    let target = dir.path().join("download.bin");
    std::fs::write(&source, b"file contents \x00\xFF").unwrap();

    let mut client = Client::connect(addr).unwrap();
    assert_eq!(client.put_file("doc", &source).unwrap(), PutStatus::Success);
    assert!(client.get_file("doc", &target).unwrap());
    assert_eq!(std::fs::read(&target).unwrap(), b"file contents \x00\xFF");

    let missing = dir.path().join("missing.bin");
    assert!(!client.get_file("nope", &missing).unwrap());
    assert!(!missing.exists());
    client.disconnect().unwrap();

    stop(&handle, join);
}

// =============================================================================
// Framing & Error Handling Tests
// =============================================================================

#[test]
fn test_frame_split_across_writes() {
    let (addr, handle, join) = start(local_config());
    let mut raw = TcpStream::connect(addr).unwrap();
    raw.set_nodelay(true).unwrap();

    // PUT "ab" -> [9, 9], dribbled out in pieces
    let frame = [0, 0, 0, 1, 0, 0, 0, 2, b'a', b'b', 0, 0, 0, 2, 9, 9];
    for chunk in frame.chunks(3) {
        raw.write_all(chunk).unwrap();
        thread::sleep(Duration::from_millis(20));
    }

    let mut status = [0u8; 4];
    raw.read_exact(&mut status).unwrap();
    assert_eq!(status, [0, 0, 0, 0]);

    raw.write_all(&[0, 0, 0, 5]).unwrap();
    assert!(closed_by_server(&mut raw));
    drop(raw);

    let mut client = Client::connect(addr).unwrap();
    assert_eq!(client.get("ab").unwrap().as_deref(), Some(&[9u8, 9][..]));
    client.disconnect().unwrap();

    stop(&handle, join);
}

#[test]
fn test_unknown_opcode_closes_only_that_connection() {
    let (addr, handle, join) = start(local_config());
    let mut bystander = Client::connect(addr).unwrap();
    bystander.put("safe", b"1").unwrap();

    let mut raw = TcpStream::connect(addr).unwrap();
    raw.write_all(&[0, 0, 0, 42]).unwrap();
    assert!(closed_by_server(&mut raw));

    assert_eq!(bystander.get("safe").unwrap().as_deref(), Some(&b"1"[..]));
    let mut newcomer = Client::connect(addr).unwrap();
    assert_eq!(newcomer.list().unwrap(), vec!["safe".to_string()]);

    bystander.disconnect().unwrap();
    newcomer.disconnect().unwrap();
    drop(raw);
    stop(&handle, join);
}

#[test]
fn test_stalled_frame_times_out() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .read_timeout_ms(100)
        .build();
    let (addr, handle, join) = start(config);

    let mut raw = TcpStream::connect(addr).unwrap();
    // PUT opcode and a key length, then nothing
    raw.write_all(&[0, 0, 0, 1, 0, 0, 0, 3]).unwrap();
    assert!(closed_by_server(&mut raw));
    drop(raw);

    stop(&handle, join);
}

#[test]
fn test_stall_inside_opcode_times_out() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .read_timeout_ms(100)
        .build();
    let (addr, handle, join) = start(config);

    let mut raw = TcpStream::connect(addr).unwrap();
    // Half an opcode, then nothing
    raw.write_all(&[0, 0]).unwrap();
    assert!(closed_by_server(&mut raw));
    drop(raw);

    // A drained stop only returns once that handler has gone
    stop(&handle, join);
    assert_eq!(handle.open_connections(), 0);
}

#[test]
fn test_idle_connection_is_not_timed_out() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .read_timeout_ms(50)
        .build();
    let (addr, handle, join) = start(config);

    let mut client = Client::connect(addr).unwrap();
    thread::sleep(Duration::from_millis(200));
    assert_eq!(client.put("late", b"ok").unwrap(), PutStatus::Success);
    client.disconnect().unwrap();

    stop(&handle, join);
}

#[test]
fn test_oversized_payload_fails_the_call() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .max_payload_size(8)
        .build();
    let (addr, handle, join) = start(config);

    let mut client = Client::connect(addr).unwrap();
    assert!(client.put("big", &[0u8; 64]).is_err());

    let mut client = Client::connect(addr).unwrap();
    assert_eq!(client.put("small", &[1u8; 8]).unwrap(), PutStatus::Success);
    assert_eq!(client.list().unwrap(), vec!["small".to_string()]);
    client.disconnect().unwrap();

    stop(&handle, join);
}

#[test]
fn test_truncated_frame_leaves_store_untouched() {
    let (addr, handle, join) = start(local_config());

    {
        let mut raw = TcpStream::connect(addr).unwrap();
        // PUT "k" declaring 10 data bytes but sending 2
        raw.write_all(&[0, 0, 0, 1, 0, 0, 0, 1, b'k', 0, 0, 0, 10, 1, 2])
            .unwrap();
    }

    let mut client = Client::connect(addr).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while handle.open_connections() > 1 {
        assert!(Instant::now() < deadline);
        thread::sleep(Duration::from_millis(10));
    }
    assert!(client.list().unwrap().is_empty());
    client.disconnect().unwrap();

    stop(&handle, join);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_bind_fails_when_port_taken() {
    let first = Server::bind(local_config()).unwrap();
    let taken = first.local_addr().to_string();

    let config = Config::builder().listen_addr(taken).build();
    assert!(Server::bind(config).is_err());
}

#[test]
fn test_shutdown_without_clients() {
    let (addr, handle, join) = start(local_config());
    wait_for_state(&handle, ServerState::Accepting);
    assert_eq!(handle.local_addr(), addr);

    stop(&handle, join);
    assert!(Client::connect(addr).is_err());
}

#[test]
fn test_drain_waits_for_open_clients() {
    let (addr, handle, join) = start(local_config());
    let mut client = Client::connect(addr).unwrap();
    client.put("k", b"v").unwrap();

    handle.shutdown();
    wait_for_state(&handle, ServerState::Draining);

    // Still served while draining
    assert_eq!(client.get("k").unwrap().as_deref(), Some(&b"v"[..]));
    assert!(!join.is_finished());

    client.disconnect().unwrap();
    join.join().unwrap().unwrap();
    assert_eq!(handle.state(), ServerState::Stopped);
}

#[test]
fn test_abort_policy_closes_open_clients() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .shutdown_policy(ShutdownPolicy::Abort)
        .build();
    let (addr, handle, join) = start(config);

    let mut client = Client::connect(addr).unwrap();
    client.put("k", b"v").unwrap();

    stop(&handle, join);
    assert_eq!(handle.open_connections(), 0);
    assert!(client.get("k").is_err());
}

#[test]
fn test_abort_connections_on_demand() {
    let (addr, handle, join) = start(local_config());

    let mut client = Client::connect(addr).unwrap();
    client.put("k", b"v").unwrap();
    assert_eq!(handle.abort_connections(), 1);
    assert!(client.list().is_err());

    stop(&handle, join);
}

#[test]
fn test_connection_limit() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .max_connections(1)
        .build();
    let (addr, handle, join) = start(config);

    let mut first = Client::connect(addr).unwrap();
    first.put("k", b"v").unwrap();

    let mut second = Client::connect(addr).unwrap();
    assert!(second.list().is_err());

    assert_eq!(first.list().unwrap(), vec!["k".to_string()]);
    first.disconnect().unwrap();

    stop(&handle, join);
}
