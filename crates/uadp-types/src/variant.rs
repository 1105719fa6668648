//! Variants and data values.
//!
//! A variant carries one value of any built-in type, scalar or
//! single-dimension array. The encoding byte holds the built-in type id
//! in its low six bits; bit 7 marks an array (an `Int32` element count
//! follows), bit 6 marks array dimensions, which this codec does not
//! support and rejects on decode.
//!
//! Besides the wrapped variant form, scalar values also encode **raw**:
//! the bare value with no encoding byte, used by the raw dataset field
//! encoding. Strings and byte strings under a metadata-provided maximum
//! length are zero-padded to a fixed field width so every raw field has
//! a stable byte span.

use crate::{
    basic::{ByteString, DateTime, Guid, LocalizedText, UaString},
    codec::BinaryCodec,
    cursor::{ReadCursor, WriteCursor},
    errors::{CodecError, Result},
};

const ARRAY_FLAG: u8 = 0x80;
const DIMENSIONS_FLAG: u8 = 0x40;
const TYPE_ID_MASK: u8 = 0x3F;

/// Built-in type identifiers carried in the variant encoding byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum ScalarKind {
    Boolean = 1,
    SByte = 2,
    Byte = 3,
    Int16 = 4,
    UInt16 = 5,
    Int32 = 6,
    UInt32 = 7,
    Int64 = 8,
    UInt64 = 9,
    Float = 10,
    Double = 11,
    String = 12,
    DateTime = 13,
    Guid = 14,
    ByteString = 15,
    StatusCode = 19,
    LocalizedText = 21,
}

impl ScalarKind {
    /// The wire type id.
    #[must_use]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Map a wire type id back; `None` for ids outside the supported set.
    #[must_use]
    pub fn from_id(id: u8) -> Option<Self> {
        Some(match id {
            1 => Self::Boolean,
            2 => Self::SByte,
            3 => Self::Byte,
            4 => Self::Int16,
            5 => Self::UInt16,
            6 => Self::Int32,
            7 => Self::UInt32,
            8 => Self::Int64,
            9 => Self::UInt64,
            10 => Self::Float,
            11 => Self::Double,
            12 => Self::String,
            13 => Self::DateTime,
            14 => Self::Guid,
            15 => Self::ByteString,
            19 => Self::StatusCode,
            21 => Self::LocalizedText,
            _ => return None,
        })
    }
}

/// One value of a built-in type.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum ScalarValue {
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(UaString),
    DateTime(DateTime),
    Guid(Guid),
    ByteString(ByteString),
    StatusCode(u32),
    LocalizedText(LocalizedText),
}

impl ScalarValue {
    /// The type this value belongs to.
    #[must_use]
    pub fn kind(&self) -> ScalarKind {
        match self {
            Self::Boolean(_) => ScalarKind::Boolean,
            Self::SByte(_) => ScalarKind::SByte,
            Self::Byte(_) => ScalarKind::Byte,
            Self::Int16(_) => ScalarKind::Int16,
            Self::UInt16(_) => ScalarKind::UInt16,
            Self::Int32(_) => ScalarKind::Int32,
            Self::UInt32(_) => ScalarKind::UInt32,
            Self::Int64(_) => ScalarKind::Int64,
            Self::UInt64(_) => ScalarKind::UInt64,
            Self::Float(_) => ScalarKind::Float,
            Self::Double(_) => ScalarKind::Double,
            Self::String(_) => ScalarKind::String,
            Self::DateTime(_) => ScalarKind::DateTime,
            Self::Guid(_) => ScalarKind::Guid,
            Self::ByteString(_) => ScalarKind::ByteString,
            Self::StatusCode(_) => ScalarKind::StatusCode,
            Self::LocalizedText(_) => ScalarKind::LocalizedText,
        }
    }

    /// Encoded size of the bare value.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Boolean(v) => v.byte_size(),
            Self::SByte(v) => v.byte_size(),
            Self::Byte(v) => v.byte_size(),
            Self::Int16(v) => v.byte_size(),
            Self::UInt16(v) => v.byte_size(),
            Self::Int32(v) => v.byte_size(),
            Self::UInt32(v) | Self::StatusCode(v) => v.byte_size(),
            Self::Int64(v) => v.byte_size(),
            Self::UInt64(v) => v.byte_size(),
            Self::Float(v) => v.byte_size(),
            Self::Double(v) => v.byte_size(),
            Self::String(v) => v.byte_size(),
            Self::DateTime(v) => v.byte_size(),
            Self::Guid(v) => v.byte_size(),
            Self::ByteString(v) => v.byte_size(),
            Self::LocalizedText(v) => v.byte_size(),
        }
    }

    /// Write the bare value.
    pub fn encode(&self, cur: &mut WriteCursor<'_>) -> Result<()> {
        match self {
            Self::Boolean(v) => v.encode(cur),
            Self::SByte(v) => v.encode(cur),
            Self::Byte(v) => v.encode(cur),
            Self::Int16(v) => v.encode(cur),
            Self::UInt16(v) => v.encode(cur),
            Self::Int32(v) => v.encode(cur),
            Self::UInt32(v) | Self::StatusCode(v) => v.encode(cur),
            Self::Int64(v) => v.encode(cur),
            Self::UInt64(v) => v.encode(cur),
            Self::Float(v) => v.encode(cur),
            Self::Double(v) => v.encode(cur),
            Self::String(v) => v.encode(cur),
            Self::DateTime(v) => v.encode(cur),
            Self::Guid(v) => v.encode(cur),
            Self::ByteString(v) => v.encode(cur),
            Self::LocalizedText(v) => v.encode(cur),
        }
    }

    /// Read a bare value of a known type.
    pub fn decode(kind: ScalarKind, cur: &mut ReadCursor<'_>) -> Result<Self> {
        Ok(match kind {
            ScalarKind::Boolean => Self::Boolean(bool::decode(cur)?),
            ScalarKind::SByte => Self::SByte(i8::decode(cur)?),
            ScalarKind::Byte => Self::Byte(u8::decode(cur)?),
            ScalarKind::Int16 => Self::Int16(i16::decode(cur)?),
            ScalarKind::UInt16 => Self::UInt16(u16::decode(cur)?),
            ScalarKind::Int32 => Self::Int32(i32::decode(cur)?),
            ScalarKind::UInt32 => Self::UInt32(u32::decode(cur)?),
            ScalarKind::Int64 => Self::Int64(i64::decode(cur)?),
            ScalarKind::UInt64 => Self::UInt64(u64::decode(cur)?),
            ScalarKind::Float => Self::Float(f32::decode(cur)?),
            ScalarKind::Double => Self::Double(f64::decode(cur)?),
            ScalarKind::String => Self::String(UaString::decode(cur)?),
            ScalarKind::DateTime => Self::DateTime(DateTime::decode(cur)?),
            ScalarKind::Guid => Self::Guid(Guid::decode(cur)?),
            ScalarKind::ByteString => Self::ByteString(ByteString::decode(cur)?),
            ScalarKind::StatusCode => Self::StatusCode(u32::decode(cur)?),
            ScalarKind::LocalizedText => Self::LocalizedText(LocalizedText::decode(cur)?),
        })
    }

    /// Raw field width under an optional maximum string length.
    ///
    /// Strings and byte strings with `max_string_length > 0` occupy a
    /// fixed `4 + max_string_length` bytes (length prefix plus padded
    /// content). A value longer than the maximum cannot be encoded.
    pub fn raw_byte_size(&self, max_string_length: u32) -> Result<usize> {
        match self {
            Self::String(_) | Self::ByteString(_) if max_string_length > 0 => {
                let len = match self {
                    Self::String(s) => s.len(),
                    Self::ByteString(b) => b.len(),
                    _ => 0,
                };
                if len > max_string_length as usize {
                    return Err(CodecError::Encoding("raw string exceeds its maximum length"));
                }
                Ok(4 + max_string_length as usize)
            },
            _ => Ok(self.byte_size()),
        }
    }

    /// Write the raw field form, zero-padding bounded strings.
    pub fn raw_encode(&self, cur: &mut WriteCursor<'_>, max_string_length: u32) -> Result<()> {
        match self {
            Self::String(_) | Self::ByteString(_) if max_string_length > 0 => {
                let len = match self {
                    Self::String(s) => s.len(),
                    Self::ByteString(b) => b.len(),
                    _ => 0,
                };
                if len > max_string_length as usize {
                    return Err(CodecError::Encoding("raw string exceeds its maximum length"));
                }
                self.encode(cur)?;
                cur.write_zeros(max_string_length as usize - len)
            },
            _ => self.encode(cur),
        }
    }
}

/// A value of any built-in type, or no value at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Variant {
    /// No value; encodes as a single zero byte.
    #[default]
    Empty,
    /// One scalar value.
    Scalar(ScalarValue),
    /// A single-dimension array of homogeneous scalars.
    Array {
        /// Element type
        kind: ScalarKind,
        /// Elements, all of `kind`
        items: Vec<ScalarValue>,
    },
}

impl Variant {
    /// Raw field width; raw form exists for scalar variants only.
    pub fn raw_byte_size(&self, max_string_length: u32) -> Result<usize> {
        match self {
            Self::Empty => Err(CodecError::Encoding("raw field without a value")),
            Self::Scalar(v) => v.raw_byte_size(max_string_length),
            Self::Array { .. } => Err(CodecError::NotImplemented("raw array field")),
        }
    }

    /// Write the raw field form.
    pub fn raw_encode(&self, cur: &mut WriteCursor<'_>, max_string_length: u32) -> Result<()> {
        match self {
            Self::Empty => Err(CodecError::Encoding("raw field without a value")),
            Self::Scalar(v) => v.raw_encode(cur, max_string_length),
            Self::Array { .. } => Err(CodecError::NotImplemented("raw array field")),
        }
    }
}

impl From<ScalarValue> for Variant {
    fn from(v: ScalarValue) -> Self {
        Self::Scalar(v)
    }
}

macro_rules! variant_from {
    ($($t:ty => $variant:ident),*) => {
        $(
            impl From<$t> for Variant {
                fn from(v: $t) -> Self {
                    Self::Scalar(ScalarValue::$variant(v))
                }
            }
        )*
    };
}

variant_from!(bool => Boolean, u16 => UInt16, u32 => UInt32, u64 => UInt64,
              i32 => Int32, f64 => Double);

impl From<&str> for Variant {
    fn from(s: &str) -> Self {
        Self::Scalar(ScalarValue::String(UaString::new(s)))
    }
}

impl BinaryCodec for Variant {
    fn byte_size(&self) -> usize {
        match self {
            Self::Empty => 1,
            Self::Scalar(v) => 1 + v.byte_size(),
            Self::Array { items, .. } => {
                1 + 4 + items.iter().map(ScalarValue::byte_size).sum::<usize>()
            },
        }
    }

    fn encode(&self, cur: &mut WriteCursor<'_>) -> Result<()> {
        match self {
            Self::Empty => cur.write_u8(0),
            Self::Scalar(v) => {
                cur.write_u8(v.kind().id())?;
                v.encode(cur)
            },
            Self::Array { kind, items } => {
                if items.iter().any(|item| item.kind() != *kind) {
                    return Err(CodecError::Encoding("heterogeneous variant array"));
                }
                cur.write_u8(kind.id() | ARRAY_FLAG)?;
                i32::try_from(items.len())
                    .map_err(|_| CodecError::Encoding("variant array longer than Int32::MAX"))?
                    .encode(cur)?;
                for item in items {
                    item.encode(cur)?;
                }
                Ok(())
            },
        }
    }

    fn decode(cur: &mut ReadCursor<'_>) -> Result<Self> {
        let encoding = cur.read_u8()?;
        if encoding == 0 {
            return Ok(Self::Empty);
        }
        if encoding & DIMENSIONS_FLAG != 0 {
            return Err(CodecError::Malformed { what: "variant array dimensions" });
        }
        let kind = ScalarKind::from_id(encoding & TYPE_ID_MASK)
            .ok_or(CodecError::Malformed { what: "variant type id" })?;
        if encoding & ARRAY_FLAG == 0 {
            return Ok(Self::Scalar(ScalarValue::decode(kind, cur)?));
        }
        let len = i32::decode(cur)?;
        // A negative length is the null array; decode it as empty.
        let len = usize::try_from(len).unwrap_or(0);
        let mut items = Vec::new();
        for _ in 0..len {
            items.push(ScalarValue::decode(kind, cur)?);
        }
        Ok(Self::Array { kind, items })
    }
}

const DATA_VALUE_VALUE: u8 = 0x01;
const DATA_VALUE_STATUS: u8 = 0x02;
const DATA_VALUE_SOURCE_TIMESTAMP: u8 = 0x04;
const DATA_VALUE_SERVER_TIMESTAMP: u8 = 0x08;
const DATA_VALUE_SOURCE_PICOSECONDS: u8 = 0x10;
const DATA_VALUE_SERVER_PICOSECONDS: u8 = 0x20;

/// A variant with quality and timing metadata.
///
/// A mask byte names the present members; they follow in the order
/// value, status, source timestamp, source picoseconds, server
/// timestamp, server picoseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataValue {
    /// The value itself
    pub value: Option<Variant>,
    /// Quality status code
    pub status: Option<u32>,
    /// When the source produced the value
    pub source_timestamp: Option<DateTime>,
    /// Sub-10µs part of the source timestamp
    pub source_picoseconds: Option<u16>,
    /// When the server observed the value
    pub server_timestamp: Option<DateTime>,
    /// Sub-10µs part of the server timestamp
    pub server_picoseconds: Option<u16>,
}

impl DataValue {
    /// A data value carrying only a variant.
    #[must_use]
    pub fn from_value(value: impl Into<Variant>) -> Self {
        Self { value: Some(value.into()), ..Self::default() }
    }
}

impl BinaryCodec for DataValue {
    fn byte_size(&self) -> usize {
        1 + self.value.as_ref().map_or(0, BinaryCodec::byte_size)
            + self.status.as_ref().map_or(0, BinaryCodec::byte_size)
            + self.source_timestamp.as_ref().map_or(0, BinaryCodec::byte_size)
            + self.source_picoseconds.as_ref().map_or(0, BinaryCodec::byte_size)
            + self.server_timestamp.as_ref().map_or(0, BinaryCodec::byte_size)
            + self.server_picoseconds.as_ref().map_or(0, BinaryCodec::byte_size)
    }

    fn encode(&self, cur: &mut WriteCursor<'_>) -> Result<()> {
        let mut mask = 0u8;
        if self.value.is_some() {
            mask |= DATA_VALUE_VALUE;
        }
        if self.status.is_some() {
            mask |= DATA_VALUE_STATUS;
        }
        if self.source_timestamp.is_some() {
            mask |= DATA_VALUE_SOURCE_TIMESTAMP;
        }
        if self.source_picoseconds.is_some() {
            mask |= DATA_VALUE_SOURCE_PICOSECONDS;
        }
        if self.server_timestamp.is_some() {
            mask |= DATA_VALUE_SERVER_TIMESTAMP;
        }
        if self.server_picoseconds.is_some() {
            mask |= DATA_VALUE_SERVER_PICOSECONDS;
        }
        cur.write_u8(mask)?;

        if let Some(value) = &self.value {
            value.encode(cur)?;
        }
        if let Some(status) = &self.status {
            status.encode(cur)?;
        }
        if let Some(ts) = &self.source_timestamp {
            ts.encode(cur)?;
        }
        if let Some(picos) = &self.source_picoseconds {
            picos.encode(cur)?;
        }
        if let Some(ts) = &self.server_timestamp {
            ts.encode(cur)?;
        }
        if let Some(picos) = &self.server_picoseconds {
            picos.encode(cur)?;
        }
        Ok(())
    }

    fn decode(cur: &mut ReadCursor<'_>) -> Result<Self> {
        let mask = cur.read_u8()?;
        let mut dv = Self::default();
        if mask & DATA_VALUE_VALUE != 0 {
            dv.value = Some(Variant::decode(cur)?);
        }
        if mask & DATA_VALUE_STATUS != 0 {
            dv.status = Some(u32::decode(cur)?);
        }
        if mask & DATA_VALUE_SOURCE_TIMESTAMP != 0 {
            dv.source_timestamp = Some(DateTime::decode(cur)?);
        }
        if mask & DATA_VALUE_SOURCE_PICOSECONDS != 0 {
            dv.source_picoseconds = Some(u16::decode(cur)?);
        }
        if mask & DATA_VALUE_SERVER_TIMESTAMP != 0 {
            dv.server_timestamp = Some(DateTime::decode(cur)?);
        }
        if mask & DATA_VALUE_SERVER_PICOSECONDS != 0 {
            dv.server_picoseconds = Some(u16::decode(cur)?);
        }
        Ok(dv)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use proptest::prelude::*;

    use super::*;

    fn round_trip<T: BinaryCodec + PartialEq + core::fmt::Debug>(value: &T) -> Vec<u8> {
        let mut buf = vec![0u8; value.byte_size()];
        let mut cur = WriteCursor::new(&mut buf);
        value.encode(&mut cur).unwrap();
        assert_eq!(cur.position(), value.byte_size(), "size/encode disagreement");

        let src = Bytes::from(buf.clone());
        let mut cur = ReadCursor::new(&src);
        assert_eq!(&T::decode(&mut cur).unwrap(), value);
        assert_eq!(cur.position(), src.len(), "decode left trailing bytes");
        buf
    }

    #[test]
    fn empty_variant_is_one_zero_byte() {
        assert_eq!(round_trip(&Variant::Empty), [0]);
    }

    #[test]
    fn uint32_scalar_wire_form() {
        assert_eq!(round_trip(&Variant::from(7u32)), [7, 7, 0, 0, 0]);
    }

    #[test]
    fn array_wire_form() {
        let v = Variant::Array {
            kind: ScalarKind::UInt16,
            items: vec![ScalarValue::UInt16(1), ScalarValue::UInt16(2)],
        };
        assert_eq!(round_trip(&v), [5 | 0x80, 2, 0, 0, 0, 1, 0, 2, 0]);
    }

    #[test]
    fn heterogeneous_array_is_rejected() {
        let v = Variant::Array {
            kind: ScalarKind::UInt16,
            items: vec![ScalarValue::UInt16(1), ScalarValue::Byte(2)],
        };
        let mut buf = [0u8; 32];
        assert_eq!(
            v.encode(&mut WriteCursor::new(&mut buf)).unwrap_err(),
            CodecError::Encoding("heterogeneous variant array")
        );
    }

    #[test]
    fn dimensions_flag_is_rejected() {
        let src = Bytes::from_static(&[7 | 0x40, 0, 0, 0, 0]);
        assert_eq!(
            Variant::decode(&mut ReadCursor::new(&src)).unwrap_err(),
            CodecError::Malformed { what: "variant array dimensions" }
        );
    }

    #[test]
    fn unknown_type_id_is_rejected() {
        let src = Bytes::from_static(&[0x3F]);
        assert_eq!(
            Variant::decode(&mut ReadCursor::new(&src)).unwrap_err(),
            CodecError::Malformed { what: "variant type id" }
        );
    }

    #[test]
    fn data_value_mask_and_order() {
        let dv = DataValue {
            value: Some(Variant::from(0x2A_u32)),
            status: Some(0x8000_0000),
            source_timestamp: Some(DateTime(5)),
            ..DataValue::default()
        };
        let wire = round_trip(&dv);
        assert_eq!(wire[0], 0x01 | 0x02 | 0x04);
    }

    #[test]
    fn raw_string_is_padded_to_fixed_width() {
        let v = ScalarValue::String(UaString::new("ab"));
        assert_eq!(v.raw_byte_size(5).unwrap(), 4 + 5);
        let mut buf = [0xFFu8; 9];
        v.raw_encode(&mut WriteCursor::new(&mut buf), 5).unwrap();
        assert_eq!(buf, [2, 0, 0, 0, b'a', b'b', 0, 0, 0]);
    }

    #[test]
    fn oversized_raw_string_is_rejected() {
        let v = ScalarValue::String(UaString::new("toolong"));
        assert!(v.raw_byte_size(3).is_err());
    }

    #[test]
    fn raw_scalar_has_no_wrapper() {
        let v = Variant::from(0x0102_0304_u32);
        assert_eq!(v.raw_byte_size(0).unwrap(), 4);
        let mut buf = [0u8; 4];
        v.raw_encode(&mut WriteCursor::new(&mut buf), 0).unwrap();
        assert_eq!(buf, [4, 3, 2, 1]);
    }

    fn scalar_strategy() -> impl Strategy<Value = ScalarValue> {
        prop_oneof![
            any::<bool>().prop_map(ScalarValue::Boolean),
            any::<u8>().prop_map(ScalarValue::Byte),
            any::<i16>().prop_map(ScalarValue::Int16),
            any::<u16>().prop_map(ScalarValue::UInt16),
            any::<i32>().prop_map(ScalarValue::Int32),
            any::<u32>().prop_map(ScalarValue::UInt32),
            any::<u64>().prop_map(ScalarValue::UInt64),
            any::<f64>().prop_map(ScalarValue::Double),
            any::<i64>().prop_map(|t| ScalarValue::DateTime(DateTime(t))),
            "[a-z]{0,12}".prop_map(|s| ScalarValue::String(UaString::new(s))),
            prop::collection::vec(any::<u8>(), 0..16)
                .prop_map(|b| ScalarValue::ByteString(ByteString::from(b))),
        ]
    }

    fn variant_strategy() -> impl Strategy<Value = Variant> {
        prop_oneof![
            Just(Variant::Empty),
            scalar_strategy().prop_map(Variant::Scalar),
            prop::collection::vec(any::<u32>(), 0..8).prop_map(|items| Variant::Array {
                kind: ScalarKind::UInt32,
                items: items.into_iter().map(ScalarValue::UInt32).collect(),
            }),
        ]
    }

    proptest! {
        #[test]
        fn variant_round_trip(v in variant_strategy()) {
            // NaN breaks equality; skip those inputs
            if let Variant::Scalar(ScalarValue::Double(d)) = &v {
                prop_assume!(!d.is_nan());
            }
            round_trip(&v);
        }

        #[test]
        fn data_value_round_trip(
            v in prop::option::of(variant_strategy()),
            status in prop::option::of(any::<u32>()),
            ts in prop::option::of(any::<i64>()),
            picos in prop::option::of(any::<u16>()),
        ) {
            if let Some(Variant::Scalar(ScalarValue::Double(d))) = &v {
                prop_assume!(!d.is_nan());
            }
            let dv = DataValue {
                value: v,
                status,
                source_timestamp: ts.map(DateTime),
                source_picoseconds: picos,
                ..DataValue::default()
            };
            round_trip(&dv);
        }
    }
}
