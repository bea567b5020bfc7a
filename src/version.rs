//! Version metadata stamped into serialized headers.

/// Semantic version of the producer, written into every new header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fixed width in bytes of the version field on the wire.
pub const MAX_LEN: usize = 16;

const _: () = assert!(VERSION.len() <= MAX_LEN);
