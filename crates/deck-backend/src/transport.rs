//! Transport seam between the bridge and the backend service.
//!
//! The bridge only needs two primitives: fire-and-forget sends for playback
//! commands and request/reply roundtrips for queries. [`TcpTransport`]
//! implements them over a long-lived framed TCP connection; tests substitute
//! an in-memory transport.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use deck_proto::FrameKind;

/// How the bridge talks to the backend service.
pub trait Transport {
    /// Fire-and-forget command; no reply is read.
    fn send(&mut self, kind: FrameKind, payload: &[u8]) -> Result<()>;

    /// Request/reply roundtrip; returns the reply frame.
    fn request(&mut self, kind: FrameKind, payload: &[u8]) -> Result<(FrameKind, Vec<u8>)>;
}

/// Framed TCP connection to the backend service.
///
/// The version prelude is exchanged once at connect time; a mismatch fails the
/// connection immediately rather than surfacing as garbled frames later.
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpTransport {
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
    pub const IO_TIMEOUT: Duration = Duration::from_secs(5);

    /// Connect to `addr` (for example `"127.0.0.1:8090"`) and handshake.
    pub fn connect(addr: &str) -> Result<Self> {
        let peer = addr
            .to_socket_addrs()
            .with_context(|| format!("resolve {addr}"))?
            .next()
            .ok_or_else(|| anyhow!("no address for {addr}"))?;

        let mut stream = TcpStream::connect_timeout(&peer, Self::CONNECT_TIMEOUT)
            .with_context(|| format!("connect {peer}"))?;
        stream.set_nodelay(true).ok();
        stream.set_read_timeout(Some(Self::IO_TIMEOUT)).ok();
        stream.set_write_timeout(Some(Self::IO_TIMEOUT)).ok();

        deck_proto::write_prelude(&mut stream).context("write prelude")?;
        deck_proto::read_prelude(&mut stream).context("read prelude")?;

        tracing::debug!(peer = %peer, "backend connected");
        Ok(Self { stream, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, kind: FrameKind, payload: &[u8]) -> Result<()> {
        deck_proto::write_frame(&mut self.stream, kind, payload)
            .with_context(|| format!("send {kind:?}"))
    }

    fn request(&mut self, kind: FrameKind, payload: &[u8]) -> Result<(FrameKind, Vec<u8>)> {
        deck_proto::write_frame(&mut self.stream, kind, payload)
            .with_context(|| format!("send {kind:?}"))?;
        deck_proto::read_frame(&mut self.stream).with_context(|| format!("reply to {kind:?}"))
    }
}
