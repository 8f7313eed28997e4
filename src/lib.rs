//! topdog - a three-tier demo service with a concurrent health checker
//!
//! The interesting part lives in [`health`]: probes run in parallel under a
//! deadline, panics are contained, and a scheduled runner keeps a snapshot
//! fresh for the `/health` endpoint.

pub mod error;
pub mod health;
pub mod probes;
pub mod query;
pub mod server;

pub use error::{Result, TopdogError};
