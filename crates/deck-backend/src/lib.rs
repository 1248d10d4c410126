//! Client for the out-of-process playlist and search service.
//!
//! [`BackendBridge`] exposes one method per remote operation, speaking the
//! framed protocol from `deck-proto` over an injected [`Transport`]. The
//! transport seam keeps the bridge testable without a live service.

pub mod bridge;
pub mod transport;

pub use bridge::BackendBridge;
pub use transport::{TcpTransport, Transport};
