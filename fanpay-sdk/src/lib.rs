//! Shared API objects for the fanpay money-movement engine.
//!
//! This crate holds everything both sides of the wire agree on: request and
//! response objects, stable error codes, the service-API body signature
//! scheme and the admin secret verification. HTTP clients are available
//! behind the `client` feature.

pub mod config;
pub mod objects;
pub mod signature;

#[cfg(feature = "client")]
pub mod client;
