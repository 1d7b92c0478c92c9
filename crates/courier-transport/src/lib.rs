//! Gateway transports for the courier daemon.
//!
//! This crate provides:
//! - ConnectionManager: environment/protocol selection and the bounded
//!   connect retry loop
//! - BinaryConnection: the persistent framed protocol and its write+detect
//!   error-inference algorithm
//! - RequestConnection: the stateless per-message HTTP protocol with
//!   provider-token or certificate authentication
//! - FeedbackClient: bulk reader for the gateway's invalid-token feed

mod binary;
mod connection;
mod error;
mod feedback;
mod http;
mod token;

pub use binary::BinaryConnection;
pub use connection::{Connection, ConnectionManager, SendOutcome};
pub use error::{ConnectionError, ConnectionResult};
pub use feedback::{FeedbackClient, FeedbackRecord};
pub use http::RequestConnection;
pub use token::ProviderToken;

#[cfg(test)]
pub(crate) mod fixtures;
