//! Rate limiting logic and state management.

mod bucket;
mod registry;

pub use bucket::{Quota, TokenBucket};
pub use registry::LimiterRegistry;
