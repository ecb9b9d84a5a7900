use std::io;
use std::net::UdpSocket;

use crate::codec::MAX_DATAGRAM_BYTES;

/// Loopback-only UDP transport. Every peer this daemon ever talks to is
/// `127.0.0.1:<port>`; port numbers double as node identities (§3), so the
/// transport's send/recv surface is expressed purely in terms of ports.
pub struct UdpTransport {
    sock: UdpSocket,
}

impl UdpTransport {
    pub fn bind(local_port: u16) -> io::Result<Self> {
        let sock = UdpSocket::bind(("127.0.0.1", local_port))?;
        Ok(Self { sock })
    }

    /// Blocks until a datagram arrives. Must be called with no lock held
    /// (§5): callers decode first, then acquire the shared-state mutex.
    pub fn recv_blocking(&self) -> io::Result<(Vec<u8>, u16)> {
        let mut buf = vec![0_u8; MAX_DATAGRAM_BYTES + 1];
        loop {
            match self.sock.recv_from(&mut buf) {
                Ok((n, addr)) => {
                    let mut payload = buf[..n].to_vec();
                    payload.truncate(n);
                    return Ok((payload, addr.port()));
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    pub fn send(&self, payload: &[u8], to_port: u16) -> io::Result<usize> {
        self.sock.send_to(payload, ("127.0.0.1", to_port))
    }

    pub fn try_clone(&self) -> io::Result<Self> {
        Ok(Self {
            sock: self.sock.try_clone()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_and_receive_roundtrip() {
        let a = UdpTransport::bind(0).unwrap();
        let a_port = a.sock.local_addr().unwrap().port();
        let b = UdpTransport::bind(0).unwrap();

        b.send(b"hello", a_port).unwrap();
        let (payload, sender) = a.recv_blocking().unwrap();
        assert_eq!(payload, b"hello");
        assert_eq!(sender, b.sock.local_addr().unwrap().port());
    }
}
