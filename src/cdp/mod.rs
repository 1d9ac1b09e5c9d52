//! Chrome DevTools Protocol plumbing
//!
//! A minimal hand-rolled CDP client: WebSocket transport, browser connection,
//! per-page sessions, and the wire types for the commands we use.

pub mod connection;
pub mod transport;
pub mod types;

pub use connection::{Connection, Session};
pub use transport::{CdpMessage, Transport};
pub use types::{MouseButton, MouseEventType};
