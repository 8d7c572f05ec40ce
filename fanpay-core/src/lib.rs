#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod access;
pub mod config;
pub mod engine;
pub mod entities;
pub mod error;
pub mod fees;
pub mod framework;
pub mod gateway;
pub mod ledger;
pub mod oplog;
pub mod operator;
pub mod processors;
pub mod store;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use engine::Engine;
pub use error::EngineError;
