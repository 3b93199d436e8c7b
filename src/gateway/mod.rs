//! Request admission gateway.
//!
//! Every inbound request is authenticated to a caller identity and then
//! charged against that identity's token bucket before it reaches a handler.

mod admission;
mod middleware;
mod rejection;
mod server;

pub use admission::AdmissionGateway;
pub use middleware::{authenticate, rate_limit, CallerIdentity, API_KEY_HEADER};
pub use rejection::{ErrorBody, Rejection};
pub use server::{router, HttpServer};
