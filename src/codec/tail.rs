//! Tail deferral of oversize payloads.
//!
//! When a packet threshold is set, string, blob, and file bodies longer
//! than the threshold are not written inline; only their length prefix (and
//! file name) is. The bodies follow the main packet body in the order the
//! values appeared, and the decoder drains them back in the same order.

use crate::types::FileData;

/// An encode-side deferred payload, borrowed from the value under encode.
pub(crate) enum TailEntry<'a> {
    Str(&'a str),
    Blob(&'a [u8]),
    File { file: &'a FileData, length: u64 },
}

/// A decode-side placeholder: where the payload belongs in the produced
/// record (as a path of field/element indices from the root) and how many
/// bytes of the tail region it owns.
pub(crate) struct TailSlot {
    pub path: Vec<u64>,
    pub length: u64,
}
