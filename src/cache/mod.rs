//! Caching subsystem.
//!
//! - [`Fingerprint`]: deterministic request key (kind + locale + payload
//!   prefix).
//! - [`ResponseCache`]: TTL cache with insertion-order eviction that also
//!   collapses concurrent computations for the same fingerprint into one.
//!   See [`response`] module docs for the lifecycle of entries and
//!   in-flight registrations.

pub mod fingerprint;
pub mod response;

pub use fingerprint::{DEFAULT_PREFIX_CHARS, Fingerprint};
pub use response::{CacheConfig, ResponseCache};
