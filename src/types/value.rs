//! The LLSN value tree.

use std::fmt;

use super::{Date, FileData};

/// A value in an LLSN record.
///
/// `Array` elements are homogeneous with no null entries; `ArrayN` elements
/// are homogeneous but individual entries may be [`Value::Null`]. A null
/// carries the [`Kind`] of the value it stands in for, so the encoder can
/// emit the matching null tag when the null is the first occupant of a
/// structural position.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(i64),
    UNumber(u64),
    Float(f64),
    Bool(bool),
    String(String),
    Blob(Vec<u8>),
    File(FileData),
    Date(Date),
    Struct(Record),
    Array(Vec<Value>),
    ArrayN(Vec<Value>),
    Null(Kind),
}

/// The non-null type space, plus `Undefined` for positions whose type was
/// never inferred (a null decoded before any sibling carried a value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Undefined,
    Number,
    UNumber,
    Float,
    Bool,
    String,
    Blob,
    File,
    Date,
    Struct,
    Array,
    ArrayN,
}

/// An ordered sequence of fields.
///
/// Field order is the wire order; names never reach the wire, so fields are
/// addressed by position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub fields: Vec<Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append.
    pub fn field(mut self, value: impl Into<Value>) -> Self {
        self.fields.push(value.into());
        self
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.fields.push(value.into());
    }

    pub fn get(&self, i: usize) -> Option<&Value> {
        self.fields.get(i)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Value {
    /// The kind of this value.
    pub fn kind(&self) -> Kind {
        match self {
            Self::Number(_) => Kind::Number,
            Self::UNumber(_) => Kind::UNumber,
            Self::Float(_) => Kind::Float,
            Self::Bool(_) => Kind::Bool,
            Self::String(_) => Kind::String,
            Self::Blob(_) => Kind::Blob,
            Self::File(_) => Kind::File,
            Self::Date(_) => Kind::Date,
            Self::Struct(_) => Kind::Struct,
            Self::Array(_) => Kind::Array,
            Self::ArrayN(_) => Kind::ArrayN,
            Self::Null(k) => *k,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }

    /// Returns the value as an i64, if it is a `Number` variant.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a u64, if it is a `UNumber` variant.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UNumber(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a string reference, if it is a `String` variant.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Struct(r) => Some(r),
            _ => None,
        }
    }

    /// Returns the elements of an `Array` or `ArrayN` variant.
    pub fn as_elements(&self) -> Option<&[Value]> {
        match self {
            Self::Array(v) | Self::ArrayN(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileData> {
        match self {
            Self::File(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&Date> {
        match self {
            Self::Date(d) => Some(d),
            _ => None,
        }
    }
}

// -- Convenience conversions --

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Number(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UNumber(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Blob(b)
    }
}

impl From<Date> for Value {
    fn from(d: Date) -> Self {
        Self::Date(d)
    }
}

impl From<FileData> for Value {
    fn from(f: FileData) -> Self {
        Self::File(f)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Self::Struct(r)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::UNumber(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Blob(b) => write!(f, "<{} bytes>", b.len()),
            Self::File(d) => write!(f, "<file {} ({} bytes)>", d.name(), d.len()),
            Self::Date(d) => write!(f, "{d}"),
            Self::Struct(r) => {
                write!(f, "{{")?;
                for (i, field) in r.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, "}}")
            }
            Self::Array(items) | Self::ArrayN(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Null(_) => write!(f, "null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        assert_eq!(Value::Number(-7).as_i64(), Some(-7));
        assert_eq!(Value::UNumber(7).as_u64(), Some(7));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert_eq!(Value::Number(1).as_str(), None);
        assert!(Value::Null(Kind::String).is_null());
    }

    #[test]
    fn record_builder() {
        let r = Record::new().field(1i64).field("two").field(true);
        assert_eq!(r.len(), 3);
        assert_eq!(r.get(1).and_then(Value::as_str), Some("two"));
    }

    #[test]
    fn display() {
        let v = Value::Struct(Record::new().field(1i64).field(Value::Array(vec![
            Value::Bool(true),
            Value::Bool(false),
        ])));
        assert_eq!(v.to_string(), "{1, [true, false]}");
    }
}
