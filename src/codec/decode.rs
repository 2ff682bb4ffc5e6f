//! The decoder driver.
//!
//! Mirrors the encoder: an explicit frame stack builds the value tree
//! bottom-up while the type tree replays the same inference the encoder
//! ran, so tag bytes are consumed exactly where the encoder emitted them.

use std::path::Path;

use super::tail::TailSlot;
use super::tree::TypeTree;
use super::{BLOB_MAX_BYTES, FILE_CHUNK, STRING_MAX_BYTES, VERSION};
use crate::error::LlsnError;
use crate::stream::ByteSource;
use crate::types::{FileData, Kind, Record, Value};
use crate::wire::{date, float, tag, varint};

enum Shape {
    Struct,
    Array,
    ArrayN,
}

struct Frame {
    shape: Shape,
    items: Vec<Value>,
    n: u64,
    /// Current null-flag group byte, refilled every eight items.
    flags: Option<u8>,
    /// Index of this container within its parent, for tail patch paths.
    slot_in_parent: u64,
}

impl Frame {
    fn new(shape: Shape, n: u64, flags: Option<u8>, slot_in_parent: u64) -> Self {
        Self {
            shape,
            items: Vec::with_capacity(n.min(1024) as usize),
            n,
            flags,
            slot_in_parent,
        }
    }

    fn into_value(self) -> Value {
        match self.shape {
            Shape::Struct => Value::Struct(Record { fields: self.items }),
            Shape::Array => Value::Array(self.items),
            Shape::ArrayN => Value::ArrayN(self.items),
        }
    }
}

/// Decodes one packet from the source into a record.
pub(crate) async fn decode_value(
    src: &mut ByteSource,
    tempdir: &Path,
) -> Result<Record, LlsnError> {
    let head = src.read(2).await?;
    let version = head[0] >> 4;
    if version != VERSION {
        return Err(LlsnError::UnsupportedVersion(version));
    }
    let threshold = (u16::from(head[0] & 0x0f) << 8) | u16::from(head[1]);
    let root_n = varint::decode_unumber(src).await?;

    tracing::trace!(threshold, fields = root_n, "decoding packet");

    let mut tree = TypeTree::new();
    let mut tt = tree.root();
    let mut tail: Vec<TailSlot> = Vec::new();
    let mut stack: Vec<Frame> = vec![Frame::new(Shape::Struct, root_n, None, 0)];

    let root = loop {
        let (i, n) = match stack.last() {
            Some(frame) => (frame.items.len() as u64, frame.n),
            None => return Err(LlsnError::malformed("decoder stack underflow")),
        };

        if i >= n {
            let done = match stack.pop() {
                Some(frame) => frame.into_value(),
                None => return Err(LlsnError::malformed("decoder stack underflow")),
            };
            match stack.last_mut() {
                Some(parent) => {
                    parent.items.push(done);
                    tt = tree.parent_next(tt);
                    continue;
                }
                None => break done,
            }
        }

        if stack.last().is_some_and(|f| f.flags.is_some()) {
            if i > 0 && i % 8 == 0 {
                let refreshed = src.read_u8().await?;
                if let Some(frame) = stack.last_mut() {
                    frame.flags = Some(refreshed);
                }
            }
            let group = stack.last().and_then(|f| f.flags).unwrap_or(0);
            if group & (1 << (7 - (i % 8))) != 0 {
                let kind = tag::kind(tree.tag(tt)).unwrap_or(Kind::Undefined);
                push_value(&mut stack, Value::Null(kind));
                tt = tree.advance(tt);
                continue;
            }
        }

        let was_defined = !tree.is_undefined(tt);
        let t = if was_defined {
            tree.tag(tt)
        } else {
            src.read_u8().await?
        };

        match t {
            tag::STRUCT => {
                let (count, flags) = if !was_defined || tree.field_count(tt) == 0 {
                    // First occurrence of the shape (or a shape introduced
                    // by a null): the field count is on the wire and nulls
                    // are tagged inline.
                    let count = varint::decode_unumber(src).await?;
                    tree.set_field_count(tt, count);
                    (count, None)
                } else {
                    (tree.field_count(tt), Some(src.read_u8().await?))
                };
                stack.push(Frame::new(Shape::Struct, count, flags, i));
                tt = tree.child(tt, tag::STRUCT);
                continue;
            }

            tag::STRUCT_NULL => {
                let _ = tree.child(tt, tag::STRUCT);
                push_value(&mut stack, Value::Null(Kind::Struct));
                tt = tree.advance(tt);
            }

            tag::ARRAY | tag::ARRAYN => {
                let count = varint::decode_unumber(src).await?;
                let flags = if (t == tag::ARRAYN || was_defined) && count > 0 {
                    Some(src.read_u8().await?)
                } else {
                    None
                };
                let shape = if t == tag::ARRAYN {
                    Shape::ArrayN
                } else {
                    Shape::Array
                };
                stack.push(Frame::new(shape, count, flags, i));
                tt = tree.child_self_linked(tt, t);
                continue;
            }

            tag::ARRAY_NULL | tag::ARRAYN_NULL => {
                let (base, kind) = if t == tag::ARRAY_NULL {
                    (tag::ARRAY, Kind::Array)
                } else {
                    (tag::ARRAYN, Kind::ArrayN)
                };
                let _ = tree.child_self_linked(tt, base);
                push_value(&mut stack, Value::Null(kind));
                tt = tree.advance(tt);
            }

            tag::NUMBER => {
                let v = varint::decode_number(src).await?;
                push_value(&mut stack, Value::Number(v));
                tt = tree.advance_with(tt, tag::NUMBER);
            }

            tag::UNUMBER => {
                let v = varint::decode_unumber(src).await?;
                push_value(&mut stack, Value::UNumber(v));
                tt = tree.advance_with(tt, tag::UNUMBER);
            }

            tag::FLOAT => {
                let v = float::decode_float(src).await?;
                push_value(&mut stack, Value::Float(v));
                tt = tree.advance_with(tt, tag::FLOAT);
            }

            tag::BOOL => {
                let v = src.read_u8().await? == 1;
                push_value(&mut stack, Value::Bool(v));
                tt = tree.advance_with(tt, tag::BOOL);
            }

            tag::DATE => {
                let v = date::decode_date(src).await?;
                push_value(&mut stack, Value::Date(v));
                tt = tree.advance_with(tt, tag::DATE);
            }

            tag::STRING => {
                let length = varint::decode_unumber(src).await?;
                if length > STRING_MAX_BYTES {
                    return Err(LlsnError::Limit(format!(
                        "string of {length} bytes exceeds the {STRING_MAX_BYTES} byte limit"
                    )));
                }
                if threshold > 0 && length > u64::from(threshold) {
                    tail.push(TailSlot {
                        path: current_path(&stack),
                        length,
                    });
                    push_value(&mut stack, Value::String(String::new()));
                } else {
                    let s = read_string(src, length).await?;
                    push_value(&mut stack, Value::String(s));
                }
                tt = tree.advance_with(tt, tag::STRING);
            }

            tag::BLOB => {
                let length = varint::decode_unumber(src).await?;
                if length > BLOB_MAX_BYTES {
                    return Err(LlsnError::Limit(format!(
                        "blob of {length} bytes exceeds the {BLOB_MAX_BYTES} byte limit"
                    )));
                }
                if threshold > 0 && length > u64::from(threshold) {
                    tail.push(TailSlot {
                        path: current_path(&stack),
                        length,
                    });
                    push_value(&mut stack, Value::Blob(Vec::new()));
                } else {
                    let data = src.read(to_usize(length)?).await?;
                    push_value(&mut stack, Value::Blob(data.to_vec()));
                }
                tt = tree.advance_with(tt, tag::BLOB);
            }

            tag::FILE => {
                let length = varint::decode_unumber(src).await?;
                let name_len = varint::decode_unumber(src).await?;
                if name_len > STRING_MAX_BYTES {
                    return Err(LlsnError::Limit("file name exceeds the string limit".into()));
                }
                let name = read_string(src, name_len).await?;

                let tmp = tempfile::Builder::new()
                    .prefix("llsndecode_")
                    .tempfile_in(tempdir)
                    .map_err(LlsnError::Io)?
                    .into_temp_path();
                tracing::debug!(name = %name, length, tmp = %tmp.display(), "spilling file payload");

                if threshold > 0 && length > u64::from(threshold) {
                    tail.push(TailSlot {
                        path: current_path(&stack),
                        length,
                    });
                } else {
                    write_file(src, &tmp, length).await?;
                }
                push_value(&mut stack, Value::File(FileData::decoded(name, length, tmp)));
                tt = tree.advance_with(tt, tag::FILE);
            }

            tag::NUMBER_NULL
            | tag::UNUMBER_NULL
            | tag::FLOAT_NULL
            | tag::BOOL_NULL
            | tag::DATE_NULL
            | tag::STRING_NULL
            | tag::BLOB_NULL
            | tag::FILE_NULL => {
                let kind = match t {
                    tag::NUMBER_NULL => Kind::Number,
                    tag::UNUMBER_NULL => Kind::UNumber,
                    tag::FLOAT_NULL => Kind::Float,
                    tag::BOOL_NULL => Kind::Bool,
                    tag::DATE_NULL => Kind::Date,
                    tag::STRING_NULL => Kind::String,
                    tag::BLOB_NULL => Kind::Blob,
                    _ => Kind::File,
                };
                push_value(&mut stack, Value::Null(kind));
                // The null still pins the slot's non-null type.
                tt = tree.advance_with(tt, tag::base(kind));
            }

            tag::UNDEFINED_NULL => {
                push_value(&mut stack, Value::Null(Kind::Undefined));
                tt = tree.advance(tt);
            }

            tag::POINTER | tag::POINTER_NULL => {
                return Err(LlsnError::UnsupportedType(
                    "pointer tags are reserved for host extensions".into(),
                ));
            }

            other => {
                return Err(LlsnError::malformed(format!(
                    "unknown type tag: 0x{other:02x}"
                )));
            }
        }
    };

    let mut record = match root {
        Value::Struct(record) => record,
        _ => return Err(LlsnError::malformed("packet root is not a record")),
    };

    if !tail.is_empty() {
        tracing::trace!(payloads = tail.len(), "draining tail");
        for slot in &tail {
            match value_at_path(&mut record, &slot.path)? {
                Value::String(s) => *s = read_string(src, slot.length).await?,
                Value::Blob(b) => {
                    let data = src.read(to_usize(slot.length)?).await?;
                    *b = data.to_vec();
                }
                Value::File(file) => {
                    let path = file.path().to_path_buf();
                    write_file(src, &path, slot.length).await?;
                }
                _ => return Err(LlsnError::malformed("tail placeholder type mismatch")),
            }
        }
    }

    Ok(record)
}

fn push_value(stack: &mut [Frame], value: Value) {
    if let Some(frame) = stack.last_mut() {
        frame.items.push(value);
    }
}

/// The index path from the root record to the position about to be filled.
fn current_path(stack: &[Frame]) -> Vec<u64> {
    let mut path: Vec<u64> = stack.iter().skip(1).map(|f| f.slot_in_parent).collect();
    if let Some(frame) = stack.last() {
        path.push(frame.items.len() as u64);
    }
    path
}

fn value_at_path<'v>(record: &'v mut Record, path: &[u64]) -> Result<&'v mut Value, LlsnError> {
    let (first, rest) = path
        .split_first()
        .ok_or_else(|| LlsnError::malformed("empty tail patch path"))?;
    let mut current = record
        .fields
        .get_mut(*first as usize)
        .ok_or_else(|| LlsnError::malformed("tail patch path out of range"))?;
    for idx in rest {
        let next = match current {
            Value::Struct(r) => r.fields.get_mut(*idx as usize),
            Value::Array(v) | Value::ArrayN(v) => v.get_mut(*idx as usize),
            _ => None,
        };
        current = next.ok_or_else(|| LlsnError::malformed("tail patch path out of range"))?;
    }
    Ok(current)
}

async fn read_string(src: &mut ByteSource, length: u64) -> Result<String, LlsnError> {
    let data = src.read(to_usize(length)?).await?;
    String::from_utf8(data.to_vec())
        .map_err(|e| LlsnError::Encoding(format!("invalid UTF-8 string: {e}")))
}

/// Streams `length` bytes from the source into the file at `path`.
async fn write_file(src: &mut ByteSource, path: &Path, length: u64) -> Result<(), LlsnError> {
    use tokio::io::AsyncWriteExt;

    let mut out = tokio::fs::File::create(path).await?;
    let mut remaining = length;
    while remaining > 0 {
        let take = (remaining.min(FILE_CHUNK as u64)) as usize;
        let chunk = src.read(take).await?;
        out.write_all(&chunk).await?;
        remaining -= take as u64;
    }
    out.flush().await?;
    Ok(())
}

fn to_usize(length: u64) -> Result<usize, LlsnError> {
    usize::try_from(length)
        .map_err(|_| LlsnError::Encoding(format!("length {length} overflows this platform")))
}
