//! The LLSN streaming codec.
//!
//! - **`cursor`** — the shape cursor the encoder traverses
//! - **`tree`** — inferred type tree (tag suppression on repeated shapes)
//! - **`nullmap`** — per-group null-flag bitmaps
//! - **`tail`** — deferral of oversize payloads to the packet tail
//! - **`encode`** / **`decode`** — the iterative drivers

mod cursor;
mod decode;
mod encode;
mod nullmap;
mod tail;
mod tree;

use bytes::Bytes;
use tokio::sync::mpsc;

pub use cursor::{EncodeCursor, Slot};

use crate::error::LlsnError;
use crate::options::{DecodeOptions, EncodeOptions};
use crate::stream::{ByteSink, ByteSource};
use crate::types::Record;

/// Encoder version carried in the packet's high nibble.
pub const VERSION: u8 = 1;

/// Hard limit on STRING payloads.
pub const STRING_MAX_BYTES: u64 = 10_485_760;

/// Hard limit on BLOB payloads.
pub const BLOB_MAX_BYTES: u64 = 4_294_967_296;

/// Granularity for streaming file bodies.
pub(crate) const FILE_CHUNK: usize = 64 * 1024;

/// Encodes a record into a single buffer.
pub async fn encode(record: &Record, options: &EncodeOptions) -> Result<Bytes, LlsnError> {
    let mut sink = ByteSink::buffer();
    encode::encode_value(record, &mut sink, options.threshold).await?;
    Ok(sink.into_bytes())
}

/// Encodes a record as a stream of chunks. The channel is closed exactly
/// once when encoding finishes, on success and on error alike.
pub async fn encode_to_channel(
    record: &Record,
    chunks: mpsc::Sender<Bytes>,
    options: &EncodeOptions,
) -> Result<(), LlsnError> {
    let mut sink = ByteSink::channel(chunks);
    encode::encode_value(record, &mut sink, options.threshold).await
}

/// Encodes through an arbitrary [`EncodeCursor`] into the given sink. This
/// is the lower-level entry the convenience wrappers build on; hosts with
/// their own record representation can call it directly.
pub async fn encode_cursor(
    cursor: &dyn EncodeCursor,
    sink: &mut ByteSink,
    options: &EncodeOptions,
) -> Result<(), LlsnError> {
    encode::encode_value(cursor, sink, options.threshold).await
}

/// Decodes a complete packet held in memory.
pub async fn decode(
    packet: impl AsRef<[u8]>,
    options: &DecodeOptions,
) -> Result<Record, LlsnError> {
    let mut src = ByteSource::from_bytes(packet);
    decode::decode_value(&mut src, &options.tempdir).await
}

/// Decodes a packet arriving as a stream of chunks. The receiver is
/// released when the call returns, on success and on error alike; a source
/// closed before the packet is complete yields [`LlsnError::Malformed`].
pub async fn decode_from_channel(
    chunks: mpsc::Receiver<Bytes>,
    options: &DecodeOptions,
) -> Result<Record, LlsnError> {
    let mut src = ByteSource::from_channel(chunks);
    decode::decode_value(&mut src, &options.tempdir).await
}


#[cfg(test)]
mod reference {
    //! The reference record and its exact encoded form at threshold 4.

    use super::*;
    use crate::types::{Date, FileData, Kind, Value};

    const HELLO: &str = "Hello World. 你好世界. مرحبا بالعالم. こんにちは世界. Γειά Σου Κόσμε. העלא וועלט. Привет Мир.";

    const DEMO_TEXT: &str =
        "This is demo file. This is demo file. This is demo file. This is demo file.";

    const DEMO_BLOB: [u8; 13] = [8, 8, 8, 8, 8, 9, 9, 9, 9, 9, 7, 7, 7];

    const SIGNED_NUMBERS: [i64; 34] = [
        -64,
        -63,
        63,
        64,
        -8192,
        -8191,
        8191,
        8192,
        -1_048_576,
        -1_048_575,
        1_048_575,
        1_048_576,
        -134_217_728,
        -134_217_727,
        134_217_727,
        134_217_728,
        -17_179_869_184,
        -17_179_869_183,
        17_179_869_183,
        17_179_869_184,
        -2_199_023_255_552,
        -2_199_023_255_551,
        2_199_023_255_551,
        2_199_023_255_552,
        -281_474_976_710_656,
        -281_474_976_710_655,
        281_474_976_710_655,
        281_474_976_710_656,
        -36_028_797_018_963_968,
        -36_028_797_018_963_967,
        36_028_797_018_963_967,
        36_028_797_018_963_968,
        -9_223_372_036_854_775_807,
        9_223_372_036_854_775_807,
    ];

    const UNSIGNED_NUMBERS: [u64; 17] = [
        127,
        128,
        16_383,
        16_384,
        2_097_151,
        2_097_152,
        268_435_455,
        268_435_456,
        34_359_738_367,
        34_359_738_368,
        4_398_046_511_103,
        4_398_046_511_104,
        562_949_953_421_311,
        562_949_953_421_312,
        72_057_594_037_927_935,
        72_057_594_037_927_936,
        18_446_744_073_709_551_615,
    ];

    /// Packet bytes up to the tail region; the tail is the hello string,
    /// the blob, and the demo file body, in order of appearance.
    const BODY: [u8; 409] = [
        16, 4, 19, 1, 33, 254, 12, 131, 120, 9, 3, 7, 1, 0, 1, 2, 6, 224, 47, 239, 220, 3, 128,
        146, 6, 7, 223, 71, 195, 137, 234, 96, 0, 249, 8, 2, 1, 0, 247, 9, 5, 8, 2, 1, 0, 247, 64,
        0, 64, 0, 64, 0, 64, 0, 246, 10, 4, 32, 8, 2, 1, 23, 8, 2, 1, 24, 247, 0, 25, 0, 22, 2, 1,
        21, 247, 64, 26, 10, 10, 223, 10, 5, 208, 8, 2, 1, 27, 247, 64, 28, 64, 4, 160, 64, 29, 0,
        30, 2, 1, 31, 247, 4, 13, 5, 75, 12, 108, 108, 115, 110, 116, 101, 115, 116, 102, 105,
        108, 101, 250, 9, 34, 1, 191, 192, 65, 63, 128, 64, 223, 224, 0, 160, 1, 159, 255, 192,
        32, 0, 239, 240, 0, 0, 208, 0, 1, 207, 255, 255, 224, 16, 0, 0, 247, 248, 0, 0, 0, 232, 0,
        0, 1, 231, 255, 255, 255, 240, 8, 0, 0, 0, 251, 252, 0, 0, 0, 0, 244, 0, 0, 0, 1, 243,
        255, 255, 255, 255, 248, 4, 0, 0, 0, 0, 253, 254, 0, 0, 0, 0, 0, 250, 0, 0, 0, 0, 1, 249,
        255, 255, 255, 255, 255, 252, 2, 0, 0, 0, 0, 0, 254, 255, 0, 0, 0, 0, 0, 0, 253, 0, 0, 0,
        0, 0, 1, 252, 255, 255, 255, 255, 255, 255, 254, 1, 0, 0, 0, 0, 0, 0, 255, 255, 128, 0, 0,
        0, 0, 0, 0, 254, 128, 0, 0, 0, 0, 0, 1, 254, 127, 255, 255, 255, 255, 255, 255, 255, 0,
        128, 0, 0, 0, 0, 0, 0, 255, 128, 0, 0, 0, 0, 0, 0, 1, 255, 127, 255, 255, 255, 255, 255,
        255, 255, 9, 17, 12, 127, 128, 128, 191, 255, 192, 64, 0, 223, 255, 255, 224, 32, 0, 0,
        239, 255, 255, 255, 240, 16, 0, 0, 0, 247, 255, 255, 255, 255, 248, 8, 0, 0, 0, 0, 251,
        255, 255, 255, 255, 255, 252, 4, 0, 0, 0, 0, 0, 253, 255, 255, 255, 255, 255, 255, 254, 2,
        0, 0, 0, 0, 0, 0, 254, 255, 255, 255, 255, 255, 255, 255, 255, 1, 0, 0, 0, 0, 0, 0, 0,
        255, 255, 255, 255, 255, 255, 255, 255, 255, 10, 5, 168, 10, 3, 0, 12, 131, 120, 131, 120,
        131, 120, 4, 224, 131, 120,
    ];

    fn expected_packet() -> Vec<u8> {
        let mut packet = BODY.to_vec();
        packet.extend_from_slice(HELLO.as_bytes());
        packet.extend_from_slice(&DEMO_BLOB);
        packet.extend_from_slice(DEMO_TEXT.as_bytes());
        packet
    }

    /// A record field holding a two-field sub-record: a number and an
    /// optional nested record.
    fn node(v: i64, child: Value) -> Value {
        Value::Struct(Record::new().field(v).field(child))
    }

    fn leaf(v: i64) -> Value {
        node(v, Value::Null(Kind::Struct))
    }

    fn reference_record(file_path: &std::path::Path) -> Record {
        let date = Date {
            year: 2015,
            month: 4,
            day: 15,
            hour: 16,
            minute: 56,
            second: 39,
            millisecond: 678,
            tz_hour: 0,
            tz_minute: 0,
        };

        let two_dim = Value::ArrayN(vec![
            Value::Null(Kind::ArrayN),
            Value::Null(Kind::ArrayN),
            Value::ArrayN(vec![
                Value::Null(Kind::Struct),
                Value::Null(Kind::Struct),
                leaf(27),
                Value::Null(Kind::Struct),
                leaf(28),
            ]),
            Value::Null(Kind::ArrayN),
            Value::Null(Kind::ArrayN),
            Value::Null(Kind::ArrayN),
            Value::Null(Kind::ArrayN),
            Value::Null(Kind::ArrayN),
            Value::ArrayN(vec![
                Value::Null(Kind::Struct),
                leaf(29),
                Value::Null(Kind::Struct),
                node(30, leaf(31)),
            ]),
            Value::Null(Kind::ArrayN),
        ]);

        let unumber_grid = Value::ArrayN(vec![
            Value::Null(Kind::ArrayN),
            Value::ArrayN(vec![
                Value::UNumber(888),
                Value::UNumber(888),
                Value::UNumber(888),
            ]),
            Value::Null(Kind::ArrayN),
            Value::ArrayN(vec![
                Value::Null(Kind::UNumber),
                Value::Null(Kind::UNumber),
                Value::Null(Kind::UNumber),
                Value::UNumber(888),
            ]),
            Value::Null(Kind::ArrayN),
        ]);

        Record::new()
            .field(33i64)
            .field(Value::Null(Kind::Number))
            .field(888u64)
            .field(Value::Array(vec![
                Value::Bool(true),
                Value::Bool(false),
                Value::Bool(true),
            ]))
            .field(3.141596)
            .field(HELLO)
            .field(date)
            .field(Value::Null(Kind::Date))
            .field(leaf(0))
            .field(Value::Array(vec![
                leaf(0),
                leaf(0),
                leaf(0),
                leaf(0),
                leaf(0),
            ]))
            .field(Value::Null(Kind::Array))
            .field(Value::ArrayN(vec![
                node(23, leaf(24)),
                node(25, node(22, leaf(21))),
                Value::Null(Kind::Struct),
                leaf(26),
            ]))
            .field(two_dim)
            .field(Value::Blob(DEMO_BLOB.to_vec()))
            .field(FileData::from_path(file_path))
            .field(Value::Null(Kind::File))
            .field(Value::Array(
                SIGNED_NUMBERS.iter().map(|&v| Value::Number(v)).collect(),
            ))
            .field(Value::Array(
                UNSIGNED_NUMBERS.iter().map(|&v| Value::UNumber(v)).collect(),
            ))
            .field(unumber_grid)
    }

    fn demo_file() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llsntestfile");
        std::fs::write(&path, DEMO_TEXT).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn reference_record_encodes_bit_exactly() {
        let (_guard, path) = demo_file();
        let record = reference_record(&path);
        let packet = encode(&record, &EncodeOptions::new().threshold(4))
            .await
            .unwrap();
        assert_eq!(packet.to_vec(), expected_packet());
    }

    #[tokio::test]
    async fn reference_packet_decodes_field_by_field() {
        let (_guard, path) = demo_file();
        let source = reference_record(&path);
        let dir = tempfile::tempdir().unwrap();
        let decoded = decode(expected_packet(), &DecodeOptions::new().tempdir(dir.path()))
            .await
            .unwrap();

        assert_eq!(decoded.len(), 19);
        // Scalars, including the tailed string.
        assert_eq!(decoded.get(0), source.get(0));
        assert_eq!(decoded.get(1), Some(&Value::Null(Kind::Number)));
        assert_eq!(decoded.get(2), source.get(2));
        assert_eq!(decoded.get(3), source.get(3));
        assert_eq!(decoded.get(4), source.get(4));
        assert_eq!(decoded.get(5).and_then(Value::as_str), Some(HELLO));
        assert_eq!(decoded.get(6), source.get(6));
        assert_eq!(decoded.get(7), Some(&Value::Null(Kind::Date)));
        // Shape-inferred records.
        assert_eq!(decoded.get(8), source.get(8));
        assert_eq!(decoded.get(9), source.get(9));
        assert_eq!(decoded.get(10), Some(&Value::Null(Kind::Array)));
        assert_eq!(decoded.get(11), source.get(11));
        // The tailed blob.
        assert_eq!(
            decoded.get(13).and_then(Value::as_blob),
            Some(&DEMO_BLOB[..])
        );
        // The tailed file body.
        let file = decoded.get(14).and_then(Value::as_file).unwrap();
        assert_eq!(file.name(), "llsntestfile");
        assert_eq!(file.read().await.unwrap(), DEMO_TEXT.as_bytes());
        assert_eq!(decoded.get(15), Some(&Value::Null(Kind::File)));
        // Number tables.
        assert_eq!(decoded.get(16), source.get(16));
        assert_eq!(decoded.get(17), source.get(17));
        // The nested unsigned grid: nulls decoded before the element type
        // was inferred come back as untyped nulls, so compare piecewise.
        let grid = decoded.get(18).and_then(Value::as_elements).unwrap();
        assert_eq!(grid.len(), 5);
        assert!(grid[0].is_null() && grid[2].is_null() && grid[4].is_null());
        assert_eq!(
            grid[1].as_elements().unwrap(),
            &[
                Value::UNumber(888),
                Value::UNumber(888),
                Value::UNumber(888)
            ]
        );
        let sparse = grid[3].as_elements().unwrap();
        assert!(sparse[0].is_null() && sparse[1].is_null() && sparse[2].is_null());
        assert_eq!(sparse[3], Value::UNumber(888));
    }

    #[tokio::test]
    async fn reference_packet_survives_a_decode_encode_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let decoded = decode(expected_packet(), &DecodeOptions::new().tempdir(dir.path()))
            .await
            .unwrap();
        let packet = encode(&decoded, &EncodeOptions::new().threshold(4))
            .await
            .unwrap();
        assert_eq!(packet.to_vec(), expected_packet());
    }

    #[tokio::test]
    async fn reference_packet_decodes_from_single_byte_chunks() {
        let packet = expected_packet();
        let (tx, rx) = mpsc::channel(1);
        let feeder = tokio::spawn(async move {
            for byte in packet {
                if tx.send(Bytes::copy_from_slice(&[byte])).await.is_err() {
                    break;
                }
            }
        });

        let dir = tempfile::tempdir().unwrap();
        let decoded = decode_from_channel(rx, &DecodeOptions::new().tempdir(dir.path()))
            .await
            .unwrap();
        feeder.await.unwrap();
        assert_eq!(decoded.get(0).and_then(Value::as_i64), Some(33));
        assert_eq!(decoded.get(5).and_then(Value::as_str), Some(HELLO));
    }
}
