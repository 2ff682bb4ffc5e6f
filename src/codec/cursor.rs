//! The shape cursor the encoder traverses.
//!
//! This is the explicit polymorphism point that replaces runtime
//! reflection: the driver sees an ordered sequence of typed slots and never
//! the host representation behind them. [`Record`] and `Vec<Value>` implement
//! it for the dynamic value tree; a host can implement it directly over its
//! own record types to encode without building a `Value` tree first.

use crate::types::{Date, FileData, Kind, Record, Value};

/// Borrowed view of one value position.
pub enum Slot<'a> {
    Number(i64),
    UNumber(u64),
    Float(f64),
    Bool(bool),
    Str(&'a str),
    Blob(&'a [u8]),
    Date(Date),
    File(&'a FileData),
    /// A nested record; the cursor yields its fields.
    Struct(&'a dyn EncodeCursor),
    /// An array; the cursor yields its elements. Whether the wire form is
    /// ARRAY or ARRAYN is decided by the driver from the elements and the
    /// position, not declared here.
    Array(&'a dyn EncodeCursor),
    /// An absent value of the given kind.
    Null(Kind),
}

/// An ordered sequence of value slots: the fields of a record or the
/// elements of an array.
///
/// Implementations must be `Sync`: the encoder holds cursors across await
/// points, and encode futures are expected to be `Send`.
pub trait EncodeCursor: Sync {
    /// Number of slots.
    fn count(&self) -> u64;

    /// The slot at position `i`. Only called with `i < count()`.
    fn slot(&self, i: u64) -> Slot<'_>;
}

impl EncodeCursor for Record {
    fn count(&self) -> u64 {
        self.fields.len() as u64
    }

    fn slot(&self, i: u64) -> Slot<'_> {
        self.fields[i as usize].slot()
    }
}

impl EncodeCursor for Vec<Value> {
    fn count(&self) -> u64 {
        self.len() as u64
    }

    fn slot(&self, i: u64) -> Slot<'_> {
        self[i as usize].slot()
    }
}

impl Value {
    fn slot(&self) -> Slot<'_> {
        match self {
            Value::Number(v) => Slot::Number(*v),
            Value::UNumber(v) => Slot::UNumber(*v),
            Value::Float(v) => Slot::Float(*v),
            Value::Bool(v) => Slot::Bool(*v),
            Value::String(s) => Slot::Str(s),
            Value::Blob(b) => Slot::Blob(b),
            Value::Date(d) => Slot::Date(*d),
            Value::File(f) => Slot::File(f),
            Value::Struct(r) => Slot::Struct(r),
            Value::Array(v) | Value::ArrayN(v) => Slot::Array(v),
            Value::Null(k) => Slot::Null(*k),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_cursor_yields_fields_in_order() {
        let r = Record::new().field(1i64).field("x").field(Value::Null(Kind::Bool));
        assert_eq!(r.count(), 3);
        assert!(matches!(r.slot(0), Slot::Number(1)));
        assert!(matches!(r.slot(1), Slot::Str("x")));
        assert!(matches!(r.slot(2), Slot::Null(Kind::Bool)));
    }

    #[test]
    fn both_array_variants_expose_elements() {
        let plain = Value::Array(vec![Value::Bool(true)]);
        let nullable = Value::ArrayN(vec![Value::Null(Kind::Bool)]);
        assert!(matches!(plain.slot(), Slot::Array(c) if c.count() == 1));
        assert!(matches!(nullable.slot(), Slot::Array(c) if c.count() == 1));
    }
}
