//! # cidwatch-core
//!
//! Foundation types shared by every cidwatch crate:
//!
//! - **Identifiers**: [`Identifier`] newtype and [`extract_identifiers`], which
//!   pulls content identifiers out of a decoded message body
//! - **Outcomes**: [`DispatchOutcome`], the immutable record of one downstream
//!   action (pin or gateway fetch) taken for one identifier
//! - **Backoff**: [`Backoff`] and [`calculate_backoff_delay`] for the reconnect
//!   loop

#![deny(unsafe_code)]

pub mod backoff;
pub mod identifier;
pub mod outcome;

pub use backoff::{Backoff, BackoffConfig, calculate_backoff_delay};
pub use identifier::{Identifier, MessageBody, extract_identifiers, extract_from_image};
pub use outcome::{ActionKind, DispatchOutcome};
