//! # cidwatch-wire
//!
//! The text-plus-payload framing of the NATS client protocol, limited to the
//! frames a read-only subscriber needs.
//!
//! - [`Frame`]: a decoded inbound unit (`INFO`, `PING`, `PONG`, `-ERR`,
//!   `MSG`/`HMSG` deliveries)
//! - [`FrameCodec`]: a [`tokio_util::codec::Decoder`] that carries the pending
//!   payload obligation between calls
//! - [`FrameReader`]: owns the receive buffer; push chunks in, get frames out
//! - [`ClientCommand`]: outbound control lines (`CONNECT`, `SUB`, `PING`,
//!   `PONG`)

#![deny(unsafe_code)]

pub mod codec;
pub mod command;
pub mod errors;
pub mod frame;

pub use codec::{DEFAULT_MAX_PAYLOAD_BYTES, FrameCodec, FrameReader};
pub use command::{Auth, ClientCommand, ConnectOptions};
pub use errors::{Result, WireError};
pub use frame::{Delivery, Frame};

/// Line terminator used by every control line and after every payload.
pub const CRLF: &[u8; 2] = b"\r\n";
