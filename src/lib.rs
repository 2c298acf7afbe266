//! src/lib.rs
// make public to other binaries (main, test)
pub mod authentication;
pub mod cache;
pub mod configuration;
pub mod constants;
pub mod domain;
pub mod email_client;
pub mod fetch;
pub mod middleware;
pub mod routes;
pub mod shutdown;
pub mod startup;
pub mod telemetry;
pub mod utils;

#[cfg(test)]
mod test_support;
