//! Network layer for the campus portal.
//!
//! This module provides:
//! - `Transport`: the request/response seam the session logic talks to
//! - `HttpTransport`: reqwest implementation with one cookie jar per realm
//! - `ApiError`: the error taxonomy every core operation reports
//!
//! No request is retried here. Retry policy belongs to the caller.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod transport;

#[cfg(test)]
pub(crate) mod fake;

pub use client::HttpTransport;
pub use error::ApiError;
pub use transport::{Method, Realm, Request, Response, Transport};
