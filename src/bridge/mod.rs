//! Tunnel bridge: reachability probing and the raw byte relay.
//!
//! Once the session job is running, the node's listener may still take a
//! few seconds to come up. The bridge probes TCP connectivity once per
//! interval until the deadline elapses, then relays bytes between the
//! caller's stdin/stdout and the socket with no framing or buffering of
//! its own beyond the copy buffer.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use crate::error::TunnelError;
use crate::job::ResolvedEndpoint;
use crate::signal::Interrupt;
use crate::timeout::Deadline;

/// Per-attempt connect timeout for a single probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

fn resolve(endpoint: &ResolvedEndpoint) -> io::Result<SocketAddr> {
    (endpoint.node.as_str(), endpoint.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address for {}", endpoint.node),
            )
        })
}

/// Probe `endpoint` once per `interval` until it accepts a connection,
/// discarding each probe stream. Returns the number of failed probes, or
/// a timeout error when the deadline elapses first.
pub fn wait_reachable(
    endpoint: &ResolvedEndpoint,
    deadline: &Deadline,
    interval: Duration,
    interrupt: &Interrupt,
) -> Result<u32, TunnelError> {
    let mut failed = 0u32;
    loop {
        if interrupt.is_raised() {
            return Err(TunnelError::Interrupted);
        }
        if deadline.expired() {
            return Err(TunnelError::ReachabilityTimeout {
                node: endpoint.node.clone(),
                port: endpoint.port,
                seconds: deadline.budget_seconds(),
            });
        }

        match resolve(endpoint).and_then(|addr| TcpStream::connect_timeout(&addr, PROBE_TIMEOUT)) {
            Ok(stream) => {
                drop(stream);
                return Ok(failed);
            }
            Err(_) => failed += 1,
        }
        interrupt.sleep(interval);
    }
}

/// Open the tunnel connection after a successful probe.
pub fn connect(endpoint: &ResolvedEndpoint) -> Result<TcpStream, TunnelError> {
    let addr = resolve(endpoint)?;
    Ok(TcpStream::connect(addr)?)
}

/// Relay bytes between `input`/`output` and the socket until either side
/// closes. Returns the number of bytes copied from the socket to
/// `output`.
pub fn relay<R, W>(stream: TcpStream, input: R, mut output: W) -> io::Result<u64>
where
    R: Read + Send + 'static,
    W: Write,
{
    let mut socket_writer = stream.try_clone()?;
    // The upstream direction runs on a helper thread and half-closes the
    // socket at input EOF. Not joined: it may still be blocked on a read
    // after the peer side has finished.
    thread::spawn(move || {
        let mut input = input;
        let _ = io::copy(&mut input, &mut socket_writer);
        let _ = socket_writer.shutdown(Shutdown::Write);
    });

    let mut socket_reader = stream;
    let copied = io::copy(&mut socket_reader, &mut output)?;
    output.flush()?;
    let _ = socket_reader.shutdown(Shutdown::Read);
    Ok(copied)
}
