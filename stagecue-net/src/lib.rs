//! Remote command port (component E): length-prefixed JSON framing, the
//! wire protocol, and the TCP server that arbitrates remote operators
//! against the local console through the kernel's priority arbiter.

pub mod framing;
pub mod protocol;
pub mod server;

pub use protocol::{ClientId, ClientMessage, ServerMessage};
pub use server::NetServer;
