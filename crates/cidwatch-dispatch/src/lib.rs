//! # cidwatch-dispatch
//!
//! What happens to a delivery after the session hands it off.
//!
//! - [`MessageHandler`]: decodes the body, writes `message` records, runs
//!   validation, and dispatches identifiers; plugs into the session as its
//!   [`cidwatch_client::DeliveryHandler`]
//! - [`Dispatcher`]: per-identifier pin and gateway fetch tasks
//! - [`PinService`] / [`GatewayFetcher`]: collaborator seams, with `reqwest`
//!   implementations

#![deny(unsafe_code)]

pub mod collaborators;
pub mod fanout;
pub mod gateways;
pub mod message;
pub mod validation;

pub use collaborators::{
    FetchResponse, GatewayFetcher, PinResponse, PinService, PinataClient, ReqwestGatewayFetcher,
};
pub use fanout::{DispatchTicket, Dispatcher};
pub use gateways::{gateway_url, gateway_urls};
pub use message::MessageHandler;
pub use validation::{Validator, Violation};

/// First `max_chars` characters of `text`.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
