//! The stateless reference server: echoes each request with a reply stamp.

use std::net::{ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use socket2::{Domain, Socket, Type};
use tracing::{debug, trace, warn};

use crate::error::CreateError;
use crate::platform::local_time_us;
use crate::wire::{self, Packet};

/// A running reference server. Dropping it stops the accept loop.
pub struct Server {
    socket: UdpSocket,
    stop: Arc<AtomicBool>,
}

impl Server {
    /// Binds `addr` with address reuse enabled.
    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, CreateError> {
        let bind_addr = addr
            .to_socket_addrs()
            .map_err(CreateError::Resolve)?
            .next()
            .ok_or(CreateError::NoAddress)?;
        let domain = if bind_addr.is_ipv6() {
            Domain::IPV6
        } else {
            Domain::IPV4
        };
        let socket = Socket::new(domain, Type::DGRAM, None).map_err(CreateError::Socket)?;
        socket
            .set_reuse_address(true)
            .map_err(CreateError::Configure)?;
        socket.bind(&bind_addr.into()).map_err(CreateError::Bind)?;
        socket
            .set_read_timeout(Some(std::time::Duration::from_millis(200)))
            .map_err(CreateError::Configure)?;
        Ok(Server {
            socket: socket.into(),
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.socket.local_addr()
    }

    /// A handle that, when signaled, breaks [`Server::run`] out of its loop.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Runs the echo loop until `stop_handle()` is set, logging dropped
    /// datagrams at `trace`/`debug` rather than treating them as errors.
    pub fn run(&self) {
        let mut buf = [0u8; wire::SIZE];
        while !self.stop.load(Ordering::Relaxed) {
            let (n, peer) = match self.socket.recv_from(&mut buf) {
                Ok(v) => v,
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    warn!("recv failed: {e}");
                    continue;
                }
            };
            let request = match Packet::from_bytes(&buf[..n]) {
                Ok(p) => p,
                Err(e) => {
                    debug!("dropping malformed datagram from {peer}: {e}");
                    continue;
                }
            };
            if request.is_reply() {
                debug!("dropping reply datagram from {peer}");
                continue;
            }
            let reply = request.into_reply(local_time_us());
            trace!("replying to {peer}");
            if let Err(e) = self.socket.send_to(&reply.to_bytes(), peer) {
                warn!("reply send to {peer} failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_datagrams_already_flagged_reply() {
        let req = Packet::request(1).into_reply(2);
        assert!(req.is_reply());
    }
}
