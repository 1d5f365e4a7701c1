use crate::error::{BridgeError, Result};
use std::io::ErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Blocking MPD session over TCP
pub type Session = mpd::Client<TcpStream>;

/// Dial the daemon and complete the handshake
///
/// `timeout` bounds the TCP connect and every later read and write on the
/// session. Blocks the calling thread.
pub fn open(host: &str, port: u16, timeout: Duration) -> Result<Session> {
    let addr = format!("{}:{}", host, port);
    tracing::debug!("Connecting to {}", addr);

    let stream = dial(&addr, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    let session = mpd::Client::new(stream)?;
    tracing::debug!("Connected to MPD {:?} at {}", session.version, addr);
    Ok(session)
}

/// Try each resolved address in turn, keeping the last failure
fn dial(addr: &str, timeout: Duration) -> Result<TcpStream> {
    let mut last_error = None;

    for socket_addr in addr.to_socket_addrs()? {
        match TcpStream::connect_timeout(&socket_addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }

    Err(match last_error {
        Some(e) if e.kind() == ErrorKind::ConnectionRefused => BridgeError::ConnectionRefused {
            addr: addr.to_string(),
            source: e,
        },
        Some(e) if e.kind() == ErrorKind::TimedOut => BridgeError::Timeout,
        Some(e) => BridgeError::Io(e),
        None => BridgeError::Io(std::io::Error::new(
            ErrorKind::NotFound,
            format!("{} did not resolve", addr),
        )),
    })
}
