//! Reachability probing and byte relay over loopback.

use std::io::{Cursor, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use grid_tunnel::bridge;
use grid_tunnel::job::ResolvedEndpoint;
use grid_tunnel::signal::Interrupt;
use grid_tunnel::timeout::Deadline;

fn loopback(port: u16) -> ResolvedEndpoint {
    ResolvedEndpoint {
        node: "127.0.0.1".to_string(),
        port,
    }
}

/// Reserve a loopback port and release it again.
fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn probes_fail_until_the_listener_appears() {
    let port = free_port();
    let server = thread::spawn(move || {
        // Come up after roughly three probe intervals.
        thread::sleep(Duration::from_millis(700));
        let listener = TcpListener::bind(("127.0.0.1", port)).unwrap();
        thread::sleep(Duration::from_millis(1000));
        drop(listener);
    });

    let deadline = Deadline::new(Duration::from_secs(10));
    let failed = bridge::wait_reachable(
        &loopback(port),
        &deadline,
        Duration::from_millis(250),
        &Interrupt::new(),
    )
    .unwrap();

    assert!((1..=5).contains(&failed), "got {failed} failed probes");
    server.join().unwrap();
}

#[test]
fn relay_passes_bytes_both_directions_unaltered() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (mut peer, _) = listener.accept().unwrap();
        let mut upstream = Vec::new();
        // Read until the client half-closes, then echo with a suffix.
        peer.read_to_end(&mut upstream).unwrap();
        peer.write_all(&upstream).unwrap();
        peer.write_all(b" and back").unwrap();
        upstream
    });

    let stream = TcpStream::connect(addr).unwrap();
    let mut downstream = Vec::new();
    let copied = bridge::relay(
        stream,
        Cursor::new(b"through the tunnel".to_vec()),
        &mut downstream,
    )
    .unwrap();

    let upstream = server.join().unwrap();
    assert_eq!(upstream, b"through the tunnel");
    assert_eq!(downstream, b"through the tunnel and back");
    assert_eq!(copied, downstream.len() as u64);
}

#[test]
fn relay_with_no_input_still_receives() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (mut peer, _) = listener.accept().unwrap();
        let mut upstream = Vec::new();
        peer.read_to_end(&mut upstream).unwrap();
        assert!(upstream.is_empty());
        peer.write_all(b"ready").unwrap();
    });

    let stream = TcpStream::connect(addr).unwrap();
    let mut downstream = Vec::new();
    bridge::relay(stream, Cursor::new(Vec::new()), &mut downstream).unwrap();

    server.join().unwrap();
    assert_eq!(downstream, b"ready");
}
