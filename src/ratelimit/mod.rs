//! Rate limiting state management.

mod store;

pub use store::RateLimitStore;
