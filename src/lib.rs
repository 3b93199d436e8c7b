//! Postr gateway - request admission for the postr REST API
//!
//! Authenticates each request by API key to a caller identity, then applies
//! a per-identity token bucket before the request reaches business handlers.

pub mod config;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod ratelimit;
