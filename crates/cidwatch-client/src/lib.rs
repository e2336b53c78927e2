//! # cidwatch-client
//!
//! One live connection to the stream and the loop that keeps it alive.
//!
//! - [`Transport`] / [`Connector`]: the byte pipe and its factory, with a
//!   WebSocket implementation in [`transport`]
//! - [`Session`]: handshake, keep-alive and delivery forwarding for one
//!   connection attempt
//! - [`DeliveryHandler`]: where deliveries go; must not block
//! - [`Supervisor`]: reconnects forever with exponential backoff

#![deny(unsafe_code)]

pub mod errors;
pub mod session;
pub mod supervisor;
pub mod transport;

pub use errors::{ClientError, Result};
pub use session::{DeliveryHandler, Session, SessionConfig, SessionState};
pub use supervisor::Supervisor;
pub use transport::{Connector, Transport, WsConnector, WsTransport};
