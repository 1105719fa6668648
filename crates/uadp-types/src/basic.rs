//! Nullable strings, GUIDs, timestamps and localized text.

use bytes::Bytes;

use crate::{
    codec::BinaryCodec,
    cursor::{ReadCursor, WriteCursor},
    errors::{CodecError, Result},
};

/// Nullable UTF-8 string.
///
/// The wire form is an `Int32` byte-length prefix followed by the UTF-8
/// bytes; length `-1` is the null string, `0` the empty string. Null and
/// empty are distinct values and both round-trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UaString(Option<String>);

impl UaString {
    /// The null string.
    pub const NULL: Self = Self(None);

    /// A string with content.
    pub fn new(s: impl Into<String>) -> Self {
        Self(Some(s.into()))
    }

    /// True for the null string.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// Borrow the content; `None` for the null string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Content length in bytes; the null string has length 0.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.as_ref().map_or(0, |s| s.len())
    }

    /// True for null or empty content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for UaString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for UaString {
    fn from(s: String) -> Self {
        Self(Some(s))
    }
}

impl BinaryCodec for UaString {
    fn byte_size(&self) -> usize {
        4 + self.len()
    }

    fn encode(&self, cur: &mut WriteCursor<'_>) -> Result<()> {
        match &self.0 {
            None => (-1_i32).encode(cur),
            Some(s) => {
                i32::try_from(s.len())
                    .map_err(|_| CodecError::Encoding("string longer than Int32::MAX"))?
                    .encode(cur)?;
                cur.write_bytes(s.as_bytes())
            },
        }
    }

    fn decode(cur: &mut ReadCursor<'_>) -> Result<Self> {
        let len = i32::decode(cur)?;
        if len < 0 {
            return Ok(Self::NULL);
        }
        let raw = cur.read_slice(len as usize)?;
        let s = core::str::from_utf8(&raw).map_err(|_| CodecError::Malformed { what: "string utf-8" })?;
        Ok(Self::new(s))
    }
}

/// Nullable byte string. Same length-prefixed layout as [`UaString`],
/// with the content held as a zero-copy [`Bytes`] view on decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteString(Option<Bytes>);

impl ByteString {
    /// The null byte string.
    pub const NULL: Self = Self(None);

    /// A byte string with content.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(Some(data.into()))
    }

    /// True for the null byte string.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// Borrow the content; `None` for the null byte string.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.0.as_deref()
    }

    /// Content length in bytes; the null byte string has length 0.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.as_ref().map_or(0, Bytes::len)
    }

    /// True for null or empty content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(data: Vec<u8>) -> Self {
        Self(Some(Bytes::from(data)))
    }
}

impl BinaryCodec for ByteString {
    fn byte_size(&self) -> usize {
        4 + self.len()
    }

    fn encode(&self, cur: &mut WriteCursor<'_>) -> Result<()> {
        match &self.0 {
            None => (-1_i32).encode(cur),
            Some(data) => {
                i32::try_from(data.len())
                    .map_err(|_| CodecError::Encoding("byte string longer than Int32::MAX"))?
                    .encode(cur)?;
                cur.write_bytes(data)
            },
        }
    }

    fn decode(cur: &mut ReadCursor<'_>) -> Result<Self> {
        let len = i32::decode(cur)?;
        if len < 0 {
            return Ok(Self::NULL);
        }
        Ok(Self(Some(cur.read_slice(len as usize)?)))
    }
}

/// 128-bit GUID.
///
/// The first three fields are little-endian scalars, the trailing eight
/// bytes are raw — 16 bytes on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Guid {
    /// First group, 32 bits
    pub data1: u32,
    /// Second group, 16 bits
    pub data2: u16,
    /// Third group, 16 bits
    pub data3: u16,
    /// Trailing eight bytes, raw order
    pub data4: [u8; 8],
}

impl BinaryCodec for Guid {
    fn byte_size(&self) -> usize {
        16
    }

    fn encode(&self, cur: &mut WriteCursor<'_>) -> Result<()> {
        self.data1.encode(cur)?;
        self.data2.encode(cur)?;
        self.data3.encode(cur)?;
        cur.write_bytes(&self.data4)
    }

    fn decode(cur: &mut ReadCursor<'_>) -> Result<Self> {
        Ok(Self {
            data1: u32::decode(cur)?,
            data2: u16::decode(cur)?,
            data3: u16::decode(cur)?,
            data4: cur.read_array()?,
        })
    }
}

/// Timestamp as a count of 100 ns ticks since 1601-01-01 UTC, 8 bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateTime(pub i64);

impl DateTime {
    /// Tick count.
    #[must_use]
    pub fn ticks(self) -> i64 {
        self.0
    }
}

impl BinaryCodec for DateTime {
    fn byte_size(&self) -> usize {
        8
    }

    fn encode(&self, cur: &mut WriteCursor<'_>) -> Result<()> {
        self.0.encode(cur)
    }

    fn decode(cur: &mut ReadCursor<'_>) -> Result<Self> {
        Ok(Self(i64::decode(cur)?))
    }
}

const LOCALIZED_TEXT_LOCALE: u8 = 0x01;
const LOCALIZED_TEXT_TEXT: u8 = 0x02;

/// Human-readable text with an optional locale tag.
///
/// A mask byte names which of the two strings follow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalizedText {
    /// Locale tag, e.g. `en-US`
    pub locale: Option<UaString>,
    /// The text itself
    pub text: Option<UaString>,
}

impl BinaryCodec for LocalizedText {
    fn byte_size(&self) -> usize {
        1 + self.locale.as_ref().map_or(0, BinaryCodec::byte_size)
            + self.text.as_ref().map_or(0, BinaryCodec::byte_size)
    }

    fn encode(&self, cur: &mut WriteCursor<'_>) -> Result<()> {
        let mut mask = 0u8;
        if self.locale.is_some() {
            mask |= LOCALIZED_TEXT_LOCALE;
        }
        if self.text.is_some() {
            mask |= LOCALIZED_TEXT_TEXT;
        }
        cur.write_u8(mask)?;
        if let Some(locale) = &self.locale {
            locale.encode(cur)?;
        }
        if let Some(text) = &self.text {
            text.encode(cur)?;
        }
        Ok(())
    }

    fn decode(cur: &mut ReadCursor<'_>) -> Result<Self> {
        let mask = cur.read_u8()?;
        let locale =
            if mask & LOCALIZED_TEXT_LOCALE != 0 { Some(UaString::decode(cur)?) } else { None };
        let text = if mask & LOCALIZED_TEXT_TEXT != 0 { Some(UaString::decode(cur)?) } else { None };
        Ok(Self { locale, text })
    }
}
