//! Minimal HTTP origin server terminating both TCP and UDP.
//!
//! The request-handling engine lives in [`handler`]; [`server`] holds the two
//! transport front-ends that feed it raw bytes.

pub mod backend;
pub mod config;
pub mod console;
pub mod handler;
pub mod http;
pub mod logger;
pub mod security;
pub mod server;
