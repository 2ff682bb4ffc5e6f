//! LLSN — a pure-Rust codec for Allyst's low-level serialization notation.
//!
//! LLSN is a self-describing, schema-implicit binary interchange format for
//! structured records. A record is an ordered tree of typed values —
//! scalars, dates, strings, blobs, file references, nested records, and
//! nested arrays, any of which may be nullable — encoded around
//! variable-length integers and an implicit type tree that tags the first
//! occurrence of each structural position and omits the tag on every
//! sibling sharing the same shape.
//!
//! # Architecture
//!
//! - **`types`** — the dynamic value tree (`Value`, `Record`, `Date`, file data)
//! - **`wire`** — primitive codecs (tags, VarInt, date, float)
//! - **`stream`** — byte sources and sinks (buffer and chunk-channel modes)
//! - **`codec`** — type tree, null-flag bitmaps, tail deferral, and the
//!   encoder/decoder drivers
//!
//! # Example
//!
//! ```no_run
//! use llsn::{decode, encode, DecodeOptions, EncodeOptions, Record, Value};
//!
//! # async fn run() -> Result<(), llsn::LlsnError> {
//! let record = Record::new().field(33i64).field("hello");
//! let packet = encode(&record, &EncodeOptions::new().threshold(512)).await?;
//! let back = decode(&packet, &DecodeOptions::new()).await?;
//! assert_eq!(back.get(1).and_then(Value::as_str), Some("hello"));
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod options;
pub mod stream;
pub mod types;
pub mod wire;

pub use codec::{
    decode, decode_from_channel, encode, encode_cursor, encode_to_channel, EncodeCursor, Slot,
    BLOB_MAX_BYTES, STRING_MAX_BYTES, VERSION,
};
pub use error::LlsnError;
pub use options::{DecodeOptions, EncodeOptions};
pub use stream::{ByteSink, ByteSource};
pub use types::{Date, FileData, Kind, Record, Value};
