//! The encoder driver.
//!
//! Iterative traversal with an explicit frame stack; nesting depth costs
//! heap, not call stack. The type tree advances in lockstep with the value
//! walk and decides where tag bytes appear.

use bytes::{Bytes, BytesMut};

use super::cursor::{EncodeCursor, Slot};
use super::nullmap;
use super::tail::TailEntry;
use super::tree::TypeTree;
use super::{BLOB_MAX_BYTES, FILE_CHUNK, STRING_MAX_BYTES, VERSION};
use crate::error::LlsnError;
use crate::stream::ByteSink;
use crate::types::{FileData, Kind};
use crate::wire::{date, float, tag, varint};

struct Frame<'a> {
    cursor: &'a dyn EncodeCursor,
    i: u64,
    n: u64,
    nullflags: Option<Vec<u8>>,
}

/// Encodes one record into the sink: preamble, body, tail.
pub(crate) async fn encode_value(
    root: &dyn EncodeCursor,
    sink: &mut ByteSink,
    threshold: u16,
) -> Result<(), LlsnError> {
    let threshold = threshold & 0x0fff;
    let mut tree = TypeTree::new();
    let mut tt = tree.root();
    let mut tail: Vec<TailEntry<'_>> = Vec::new();
    let mut stack: Vec<Frame<'_>> = Vec::new();
    let mut in_array = false;

    let mut cursor = root;
    let mut i: u64 = 0;
    let mut n: u64 = root.count();
    let mut nullflags: Option<Vec<u8>> = None;

    tracing::trace!(threshold, fields = n, "encoding record");

    // Preamble: version nibble, 12-bit threshold, root field count.
    sink.write(Bytes::copy_from_slice(&[
        ((threshold >> 8) as u8 & 0x0f) | (VERSION << 4),
        threshold as u8,
    ]))
    .await?;
    write_unumber(sink, n).await?;

    loop {
        if i >= n {
            let Some(frame) = stack.pop() else { break };
            cursor = frame.cursor;
            i = frame.i;
            n = frame.n;
            nullflags = frame.nullflags;
            tt = tree.parent_next(tt);
            if stack.is_empty() {
                in_array = false;
            }
            continue;
        }

        if let Some(flags) = &nullflags {
            let group = flags[(i / 8) as usize];
            if i % 8 == 0 {
                sink.write_u8(group).await?;
            }
            if group & (1 << (7 - (i % 8))) != 0 {
                // Flagged null: no tag, no payload.
                tt = tree.advance(tt);
                i += 1;
                continue;
            }
        }

        match cursor.slot(i) {
            Slot::Number(v) => {
                tt = tag_or_advance(&mut tree, tt, sink, tag::NUMBER).await?;
                write_number(sink, v).await?;
            }

            Slot::UNumber(v) => {
                tt = tag_or_advance(&mut tree, tt, sink, tag::UNUMBER).await?;
                write_unumber(sink, v).await?;
            }

            Slot::Float(v) => {
                tt = tag_or_advance(&mut tree, tt, sink, tag::FLOAT).await?;
                let mut buf = BytesMut::new();
                float::encode_float(&mut buf, v);
                sink.write(buf.freeze()).await?;
            }

            Slot::Bool(v) => {
                tt = tag_or_advance(&mut tree, tt, sink, tag::BOOL).await?;
                sink.write_u8(u8::from(v)).await?;
            }

            Slot::Date(d) => {
                tt = tag_or_advance(&mut tree, tt, sink, tag::DATE).await?;
                let mut buf = BytesMut::new();
                date::encode_date(&mut buf, &d);
                sink.write(buf.freeze()).await?;
            }

            Slot::Str(s) => {
                let length = s.len() as u64;
                if length > STRING_MAX_BYTES {
                    return Err(LlsnError::Limit(format!(
                        "string of {length} bytes exceeds the {STRING_MAX_BYTES} byte limit"
                    )));
                }
                tt = tag_or_advance(&mut tree, tt, sink, tag::STRING).await?;
                write_unumber(sink, length).await?;
                if threshold > 0 && length > u64::from(threshold) {
                    tail.push(TailEntry::Str(s));
                } else {
                    sink.write(Bytes::copy_from_slice(s.as_bytes())).await?;
                }
            }

            Slot::Blob(b) => {
                let length = b.len() as u64;
                if length > BLOB_MAX_BYTES {
                    return Err(LlsnError::Limit(format!(
                        "blob of {length} bytes exceeds the {BLOB_MAX_BYTES} byte limit"
                    )));
                }
                tt = tag_or_advance(&mut tree, tt, sink, tag::BLOB).await?;
                write_unumber(sink, length).await?;
                if threshold > 0 && length > u64::from(threshold) {
                    tail.push(TailEntry::Blob(b));
                } else {
                    sink.write(Bytes::copy_from_slice(b)).await?;
                }
            }

            Slot::File(file) => {
                tt = tag_or_advance(&mut tree, tt, sink, tag::FILE).await?;
                let meta = tokio::fs::metadata(file.path()).await?;
                let length = meta.len();
                let name = file.name();
                if name.len() as u64 > STRING_MAX_BYTES {
                    return Err(LlsnError::Limit("file name exceeds the string limit".into()));
                }
                write_unumber(sink, length).await?;
                write_unumber(sink, name.len() as u64).await?;
                sink.write(Bytes::copy_from_slice(name.as_bytes())).await?;
                if threshold > 0 && length > u64::from(threshold) {
                    tail.push(TailEntry::File { file, length });
                } else {
                    copy_file(file, length, sink).await?;
                }
            }

            Slot::Struct(fields) => {
                let count = fields.count();
                stack.push(Frame {
                    cursor,
                    i: i + 1,
                    n,
                    nullflags: nullflags.take(),
                });

                if tree.is_undefined(tt) {
                    sink.write_u8(tag::STRUCT).await?;
                    write_unumber(sink, count).await?;
                    tree.set_field_count(tt, count);
                } else if tree.field_count(tt) == 0 {
                    // Shape was introduced by a null; the count is still owed.
                    write_unumber(sink, count).await?;
                    tree.set_field_count(tt, count);
                } else {
                    if tree.field_count(tt) != count {
                        return Err(LlsnError::UnsupportedType(format!(
                            "record with {count} fields at a position inferred with {}",
                            tree.field_count(tt)
                        )));
                    }
                    nullflags = Some(nullmap::struct_flags(fields));
                }
                tt = tree.child(tt, tag::STRUCT);

                cursor = fields;
                i = 0;
                n = count;
                continue;
            }

            Slot::Array(elems) => {
                let count = elems.count();
                let defined = !tree.is_undefined(tt);
                stack.push(Frame {
                    cursor,
                    i: i + 1,
                    n,
                    nullflags: nullflags.take(),
                });

                let flags = nullmap::array_flags(elems, in_array || defined);
                in_array = true;

                if defined {
                    tt = tree.child_self_linked(tt, tree.tag(tt));
                } else {
                    let t = if flags.is_some() {
                        tag::ARRAYN
                    } else {
                        tag::ARRAY
                    };
                    sink.write_u8(t).await?;
                    tt = tree.child_self_linked(tt, t);
                }
                write_unumber(sink, count).await?;

                nullflags = flags;
                cursor = elems;
                i = 0;
                n = count;
                continue;
            }

            Slot::Null(kind) => {
                if tree.is_undefined(tt) {
                    sink.write_u8(tag::null(kind)).await?;
                    match kind {
                        // A null container still stakes out its child
                        // subtree so later siblings inherit the shape.
                        Kind::Struct => {
                            let _ = tree.child(tt, tag::STRUCT);
                            tt = tree.advance(tt);
                        }
                        Kind::Array | Kind::ArrayN => {
                            let _ = tree.child_self_linked(tt, tag::base(kind));
                            tt = tree.advance(tt);
                        }
                        // A null of unknown kind leaves the position open.
                        Kind::Undefined => tt = tree.advance(tt),
                        _ => tt = tree.advance_with(tt, tag::base(kind)),
                    }
                } else {
                    tt = tree.advance(tt);
                }
            }
        }

        i += 1;
    }

    if !tail.is_empty() {
        tracing::trace!(payloads = tail.len(), "draining tail");
        for entry in &tail {
            match entry {
                TailEntry::Str(s) => sink.write(Bytes::copy_from_slice(s.as_bytes())).await?,
                TailEntry::Blob(b) => sink.write(Bytes::copy_from_slice(b)).await?,
                TailEntry::File { file, length } => copy_file(file, *length, sink).await?,
            }
        }
    }

    Ok(())
}

/// Emits the tag byte if this position is not yet inferred, then moves to
/// the next position either way.
async fn tag_or_advance(
    tree: &mut TypeTree,
    tt: super::tree::NodeId,
    sink: &mut ByteSink,
    t: u8,
) -> Result<super::tree::NodeId, LlsnError> {
    if tree.is_undefined(tt) {
        sink.write_u8(t).await?;
        Ok(tree.advance_with(tt, t))
    } else {
        Ok(tree.advance(tt))
    }
}

async fn write_unumber(sink: &mut ByteSink, value: u64) -> Result<(), LlsnError> {
    let mut buf = BytesMut::new();
    varint::encode_unumber(&mut buf, value);
    sink.write(buf.freeze()).await
}

async fn write_number(sink: &mut ByteSink, value: i64) -> Result<(), LlsnError> {
    let mut buf = BytesMut::new();
    varint::encode_number(&mut buf, value);
    sink.write(buf.freeze()).await
}

/// Streams exactly `length` bytes of the file body into the sink.
async fn copy_file(file: &FileData, length: u64, sink: &mut ByteSink) -> Result<(), LlsnError> {
    use tokio::io::AsyncReadExt;

    let mut src = tokio::fs::File::open(file.path()).await?;
    let mut chunk = vec![0u8; FILE_CHUNK];
    let mut remaining = length;
    while remaining > 0 {
        let want = (remaining.min(FILE_CHUNK as u64)) as usize;
        let read = src.read(&mut chunk[..want]).await?;
        if read == 0 {
            return Err(LlsnError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "file body shorter than its recorded length",
            )));
        }
        sink.write(Bytes::copy_from_slice(&chunk[..read])).await?;
        remaining -= read as u64;
    }
    Ok(())
}
