//! Byte sources and sinks for the codec drivers.
//!
//! Both directions come in two modes: a contiguous in-memory buffer, and an
//! ordered channel of byte chunks for streaming between tasks.

mod sink;
mod source;

pub use sink::ByteSink;
pub use source::ByteSource;

/// Read-side inactivity window for channel sources.
pub(crate) const READ_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);
