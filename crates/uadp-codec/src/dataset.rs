//! DataSetMessage model and codec.
//!
//! A dataset message is one flag byte (two when the second flag byte is
//! required), the enabled header fields, and a payload whose shape is
//! picked by the message type and the field encoding. Key frames carry
//! every field, delta frames carry `(index, value)` pairs, keep-alives
//! carry nothing. A key frame without fields is a heartbeat and stays
//! header-only on the wire.

use uadp_types::{
    BinaryCodec, CodecError, DataValue, DateTime, ReadCursor, Result, UaString, Variant,
    WriteCursor,
};

use crate::offsets::{NetworkMessageOffset, NetworkMessageOffsetBuffer, OffsetContent};

const FLAGS1_VALID: u8 = 0x01;
const FLAGS1_FIELD_ENCODING_MASK: u8 = 0x06;
const FLAGS1_FIELD_ENCODING_SHIFT: u8 = 1;
const FLAGS1_SEQUENCE_NUMBER: u8 = 0x08;
const FLAGS1_STATUS: u8 = 0x10;
const FLAGS1_CONFIG_MAJOR: u8 = 0x20;
const FLAGS1_CONFIG_MINOR: u8 = 0x40;
const FLAGS1_FLAGS2: u8 = 0x80;

const FLAGS2_MESSAGE_TYPE_MASK: u8 = 0x0F;
const FLAGS2_TIMESTAMP: u8 = 0x10;
const FLAGS2_PICOSECONDS: u8 = 0x20;

/// Cursor advance used when a lone raw key frame arrives without a
/// declared size. Field widths are unknown without metadata, so the
/// decoder skips a fixed span instead of parsing — the raw view still
/// exposes the remainder of the source.
pub const RAW_SIZE_FALLBACK: usize = 1500;

/// How the payload fields are represented on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum FieldEncoding {
    /// Bare variants
    #[default]
    Variant = 0,
    /// Raw values without any wrapper, shaped by metadata
    RawData = 1,
    /// Full data values with status and timestamps
    DataValue = 2,
}

impl FieldEncoding {
    fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            0 => Ok(Self::Variant),
            1 => Ok(Self::RawData),
            2 => Ok(Self::DataValue),
            _ => Err(CodecError::Malformed { what: "data set field encoding" }),
        }
    }
}

/// Dataset message flavor carried in the second flag byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum DataSetMessageType {
    /// All fields of the dataset
    #[default]
    KeyFrame = 0,
    /// Only the fields that changed
    DeltaFrame = 1,
    /// Event fields (not implemented end-to-end)
    Event = 2,
    /// Liveness signal without payload
    KeepAlive = 3,
}

impl DataSetMessageType {
    fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            0 => Ok(Self::KeyFrame),
            1 => Ok(Self::DeltaFrame),
            2 => Ok(Self::Event),
            3 => Ok(Self::KeepAlive),
            _ => Err(CodecError::NotImplemented("unknown data set message type")),
        }
    }
}

/// Enabled header fields of a dataset message.
///
/// The message type itself lives with the payload
/// ([`DataSetMessageData`]); the header holds everything the flag bytes
/// gate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSetMessageHeader {
    /// Message-valid bit of the first flag byte
    pub valid: bool,
    /// Payload field representation
    pub field_encoding: FieldEncoding,
    /// Per-writer sequence number
    pub sequence_number: Option<u16>,
    /// Sample time
    pub timestamp: Option<DateTime>,
    /// Sub-10µs part of the sample time
    pub picoseconds: Option<u16>,
    /// Aggregated status of the payload
    pub status: Option<u16>,
    /// Major version of the dataset configuration
    pub config_version_major: Option<u32>,
    /// Minor version of the dataset configuration
    pub config_version_minor: Option<u32>,
}

impl DataSetMessageHeader {
    /// The second flag byte is required when the message is not a plain
    /// key frame or any of its own fields are present.
    #[must_use]
    pub fn flags2_required(&self, message_type: DataSetMessageType) -> bool {
        message_type != DataSetMessageType::KeyFrame
            || self.timestamp.is_some()
            || self.picoseconds.is_some()
    }

    /// Encoded header size for a message of the given type.
    #[must_use]
    pub fn byte_size(&self, message_type: DataSetMessageType) -> usize {
        let mut size = 1;
        if self.flags2_required(message_type) {
            size += 1;
        }
        size += self.sequence_number.as_ref().map_or(0, BinaryCodec::byte_size);
        size += self.timestamp.as_ref().map_or(0, BinaryCodec::byte_size);
        size += self.picoseconds.as_ref().map_or(0, BinaryCodec::byte_size);
        size += self.status.as_ref().map_or(0, BinaryCodec::byte_size);
        size += self.config_version_major.as_ref().map_or(0, BinaryCodec::byte_size);
        size += self.config_version_minor.as_ref().map_or(0, BinaryCodec::byte_size);
        size
    }

    /// Write the flag bytes and the enabled header fields.
    pub fn encode(&self, message_type: DataSetMessageType, cur: &mut WriteCursor<'_>) -> Result<()> {
        let mut flags1 = (self.field_encoding as u8) << FLAGS1_FIELD_ENCODING_SHIFT;
        if self.valid {
            flags1 |= FLAGS1_VALID;
        }
        if self.sequence_number.is_some() {
            flags1 |= FLAGS1_SEQUENCE_NUMBER;
        }
        if self.status.is_some() {
            flags1 |= FLAGS1_STATUS;
        }
        if self.config_version_major.is_some() {
            flags1 |= FLAGS1_CONFIG_MAJOR;
        }
        if self.config_version_minor.is_some() {
            flags1 |= FLAGS1_CONFIG_MINOR;
        }
        if self.flags2_required(message_type) {
            flags1 |= FLAGS1_FLAGS2;
        }
        cur.write_u8(flags1)?;

        if self.flags2_required(message_type) {
            let mut flags2 = message_type as u8;
            if self.timestamp.is_some() {
                flags2 |= FLAGS2_TIMESTAMP;
            }
            if self.picoseconds.is_some() {
                flags2 |= FLAGS2_PICOSECONDS;
            }
            cur.write_u8(flags2)?;
        }

        if let Some(sequence_number) = &self.sequence_number {
            sequence_number.encode(cur)?;
        }
        if let Some(timestamp) = &self.timestamp {
            timestamp.encode(cur)?;
        }
        if let Some(picoseconds) = &self.picoseconds {
            picoseconds.encode(cur)?;
        }
        if let Some(status) = &self.status {
            status.encode(cur)?;
        }
        if let Some(major) = &self.config_version_major {
            major.encode(cur)?;
        }
        if let Some(minor) = &self.config_version_minor {
            minor.encode(cur)?;
        }
        Ok(())
    }

    /// Read the flag bytes and the enabled header fields.
    ///
    /// Without the second flag byte the message type defaults to
    /// [`DataSetMessageType::KeyFrame`] with no timestamp and no
    /// picoseconds.
    pub fn decode(cur: &mut ReadCursor<'_>) -> Result<(Self, DataSetMessageType)> {
        let flags1 = cur.read_u8()?;
        let field_encoding =
            FieldEncoding::from_bits((flags1 & FLAGS1_FIELD_ENCODING_MASK) >> FLAGS1_FIELD_ENCODING_SHIFT)?;

        let mut header = Self { valid: flags1 & FLAGS1_VALID != 0, field_encoding, ..Self::default() };

        let mut message_type = DataSetMessageType::KeyFrame;
        let mut timestamp_present = false;
        let mut picoseconds_present = false;
        if flags1 & FLAGS1_FLAGS2 != 0 {
            let flags2 = cur.read_u8()?;
            message_type = DataSetMessageType::from_bits(flags2 & FLAGS2_MESSAGE_TYPE_MASK)?;
            timestamp_present = flags2 & FLAGS2_TIMESTAMP != 0;
            picoseconds_present = flags2 & FLAGS2_PICOSECONDS != 0;
        }

        if flags1 & FLAGS1_SEQUENCE_NUMBER != 0 {
            header.sequence_number = Some(u16::decode(cur)?);
        }
        if timestamp_present {
            header.timestamp = Some(DateTime::decode(cur)?);
        }
        if picoseconds_present {
            header.picoseconds = Some(u16::decode(cur)?);
        }
        if flags1 & FLAGS1_STATUS != 0 {
            header.status = Some(u16::decode(cur)?);
        }
        if flags1 & FLAGS1_CONFIG_MAJOR != 0 {
            header.config_version_major = Some(u32::decode(cur)?);
        }
        if flags1 & FLAGS1_CONFIG_MINOR != 0 {
            header.config_version_minor = Some(u32::decode(cur)?);
        }

        Ok((header, message_type))
    }
}

/// Per-field metadata the binary codec consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMetaData {
    /// Fixed width for string-typed raw fields; 0 means unbounded
    pub max_string_length: u32,
}

/// Dataset metadata, reduced to what the raw field encoding needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSetMetaData {
    /// One entry per dataset field, in field order
    pub fields: Vec<FieldMetaData>,
}

/// Payload of a key frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyFrameData {
    /// Typed field values; the encode source for every field encoding.
    /// Empty fields make the message a heartbeat.
    pub fields: Vec<DataValue>,
    /// Zero-copy view of a raw payload captured on decode
    pub raw_fields: Option<bytes::Bytes>,
    /// Field names (used by non-binary encodings of the same model)
    pub field_names: Option<Vec<UaString>>,
    /// Metadata shaping the raw field encoding
    pub meta: Option<DataSetMetaData>,
}

impl KeyFrameData {
    fn max_string_length(&self, field: usize) -> u32 {
        self.meta
            .as_ref()
            .and_then(|m| m.fields.get(field))
            .map_or(0, |f| f.max_string_length)
    }

    fn field_value(&self, field: usize) -> Result<&Variant> {
        self.fields
            .get(field)
            .and_then(|f| f.value.as_ref())
            .ok_or(CodecError::Encoding("key frame field without a value"))
    }
}

/// One changed field of a delta frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaFrameField {
    /// Index of the field within the dataset
    pub index: u16,
    /// The new value
    pub value: DataValue,
}

/// Payload of a delta frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaFrameData {
    /// The changed fields
    pub fields: Vec<DeltaFrameField>,
}

/// Payload of a dataset message; the variant is the message type.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSetMessageData {
    /// Every field (a heartbeat when empty)
    KeyFrame(KeyFrameData),
    /// Changed fields only
    DeltaFrame(DeltaFrameData),
    /// Header-only liveness signal
    KeepAlive,
}

impl Default for DataSetMessageData {
    fn default() -> Self {
        Self::KeyFrame(KeyFrameData::default())
    }
}

/// A single dataset frame: header plus typed payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSetMessage {
    /// Flag-gated header fields
    pub header: DataSetMessageHeader,
    /// Payload, which also fixes the message type
    pub data: DataSetMessageData,
}

impl DataSetMessage {
    /// The message type implied by the payload.
    #[must_use]
    pub fn message_type(&self) -> DataSetMessageType {
        match &self.data {
            DataSetMessageData::KeyFrame(_) => DataSetMessageType::KeyFrame,
            DataSetMessageData::DeltaFrame(_) => DataSetMessageType::DeltaFrame,
            DataSetMessageData::KeepAlive => DataSetMessageType::KeepAlive,
        }
    }

    /// Reset to the zero state, dropping all owned payload data.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Exact encoded size; records mutable-field positions when an
    /// offset buffer is supplied.
    ///
    /// `base` is the byte position of this message within the enclosing
    /// frame, so recorded offsets are frame-absolute.
    pub fn binary_size(
        &self,
        mut offsets: Option<&mut NetworkMessageOffsetBuffer>,
        base: usize,
    ) -> Result<usize> {
        let mut size = 0usize;

        if let Some(buf) = offsets.as_deref_mut() {
            buf.offsets
                .push(NetworkMessageOffset { position: base, content: OffsetContent::FieldEncoding });
        }

        size += 1;
        if self.header.flags2_required(self.message_type()) {
            size += 1;
        }

        if let Some(sequence_number) = self.header.sequence_number {
            if let Some(buf) = offsets.as_deref_mut() {
                buf.offsets.push(NetworkMessageOffset {
                    position: base + size,
                    content: OffsetContent::DataSetSequenceNumber(sequence_number),
                });
            }
            size += sequence_number.byte_size();
        }
        size += self.header.timestamp.as_ref().map_or(0, BinaryCodec::byte_size);
        size += self.header.picoseconds.as_ref().map_or(0, BinaryCodec::byte_size);
        size += self.header.status.as_ref().map_or(0, BinaryCodec::byte_size);
        size += self.header.config_version_major.as_ref().map_or(0, BinaryCodec::byte_size);
        size += self.header.config_version_minor.as_ref().map_or(0, BinaryCodec::byte_size);

        match &self.data {
            DataSetMessageData::KeyFrame(kf) if !kf.fields.is_empty() => {
                if self.header.field_encoding != FieldEncoding::RawData {
                    size += 2; // field count
                }
                match self.header.field_encoding {
                    FieldEncoding::Variant => {
                        for (i, _) in kf.fields.iter().enumerate() {
                            let value = kf.field_value(i)?;
                            if let Some(buf) = offsets.as_deref_mut() {
                                buf.offsets.push(NetworkMessageOffset {
                                    position: base + size,
                                    content: OffsetContent::PayloadVariant(value.clone()),
                                });
                            }
                            size += value.byte_size();
                        }
                    },
                    FieldEncoding::RawData => {
                        for (i, _) in kf.fields.iter().enumerate() {
                            let value = kf.field_value(i)?;
                            let raw_size = value.raw_byte_size(kf.max_string_length(i))?;
                            if let Some(buf) = offsets.as_deref_mut() {
                                buf.offsets.push(NetworkMessageOffset {
                                    position: base + size,
                                    content: OffsetContent::PayloadRaw(value.clone()),
                                });
                                buf.raw_message_length += raw_size;
                            }
                            size += raw_size;
                        }
                    },
                    FieldEncoding::DataValue => {
                        for field in &kf.fields {
                            if let Some(buf) = offsets.as_deref_mut() {
                                buf.offsets.push(NetworkMessageOffset {
                                    position: base + size,
                                    content: OffsetContent::PayloadDataValue(field.clone()),
                                });
                            }
                            size += field.byte_size();
                        }
                    },
                }
            },
            DataSetMessageData::KeyFrame(_) => {}, // heartbeat stays header-only
            DataSetMessageData::DeltaFrame(df) => {
                if self.header.field_encoding == FieldEncoding::RawData {
                    return Err(CodecError::NotImplemented("delta frame raw encoding"));
                }
                size += 2; // field count
                for field in &df.fields {
                    size += field.index.byte_size();
                    size += match self.header.field_encoding {
                        FieldEncoding::Variant => field
                            .value
                            .value
                            .as_ref()
                            .ok_or(CodecError::Encoding("delta frame field without a value"))?
                            .byte_size(),
                        FieldEncoding::DataValue => field.value.byte_size(),
                        FieldEncoding::RawData => 0,
                    };
                }
            },
            DataSetMessageData::KeepAlive => {},
        }

        Ok(size)
    }

    /// Write header and payload at the cursor.
    pub fn encode_binary(&self, cur: &mut WriteCursor<'_>) -> Result<()> {
        self.header.encode(self.message_type(), cur)?;

        match &self.data {
            DataSetMessageData::KeyFrame(kf) if !kf.fields.is_empty() => {
                let count = u16::try_from(kf.fields.len())
                    .map_err(|_| CodecError::Encoding("more than 65535 key frame fields"))?;
                if self.header.field_encoding != FieldEncoding::RawData {
                    count.encode(cur)?;
                }
                match self.header.field_encoding {
                    FieldEncoding::Variant => {
                        for i in 0..kf.fields.len() {
                            kf.field_value(i)?.encode(cur)?;
                        }
                    },
                    FieldEncoding::RawData => {
                        for i in 0..kf.fields.len() {
                            kf.field_value(i)?.raw_encode(cur, kf.max_string_length(i))?;
                        }
                    },
                    FieldEncoding::DataValue => {
                        for field in &kf.fields {
                            field.encode(cur)?;
                        }
                    },
                }
                Ok(())
            },
            DataSetMessageData::KeyFrame(_) => Ok(()), // heartbeat
            DataSetMessageData::DeltaFrame(df) => {
                if self.header.field_encoding == FieldEncoding::RawData {
                    return Err(CodecError::NotImplemented("delta frame raw encoding"));
                }
                u16::try_from(df.fields.len())
                    .map_err(|_| CodecError::Encoding("more than 65535 delta frame fields"))?
                    .encode(cur)?;
                for field in &df.fields {
                    field.index.encode(cur)?;
                    match self.header.field_encoding {
                        FieldEncoding::Variant => field
                            .value
                            .value
                            .as_ref()
                            .ok_or(CodecError::Encoding("delta frame field without a value"))?
                            .encode(cur)?,
                        FieldEncoding::DataValue => field.value.encode(cur)?,
                        FieldEncoding::RawData => {},
                    }
                }
                Ok(())
            },
            DataSetMessageData::KeepAlive => Ok(()),
        }
    }

    /// Read a dataset message.
    ///
    /// `dsm_size` is the declared size of this message within the frame,
    /// or 0 when unknown (single message consuming the remainder). Raw
    /// key frames capture a zero-copy view of the source instead of
    /// parsing fields; without a declared size the cursor advances by
    /// [`RAW_SIZE_FALLBACK`].
    pub fn decode_binary(cur: &mut ReadCursor<'_>, dsm_size: usize) -> Result<Self> {
        let initial = cur.position();
        let (header, message_type) = DataSetMessageHeader::decode(cur)?;

        let data = match message_type {
            DataSetMessageType::KeyFrame => {
                let consumed = cur.position() - initial;
                if cur.remaining() == 0 || (dsm_size != 0 && consumed >= dsm_size) {
                    // Message ends after the header: heartbeat
                    DataSetMessageData::KeyFrame(KeyFrameData::default())
                } else {
                    match header.field_encoding {
                        FieldEncoding::Variant => {
                            let count = u16::decode(cur)?;
                            let mut fields = Vec::with_capacity(usize::from(count));
                            for _ in 0..count {
                                fields.push(DataValue::from_value(Variant::decode(cur)?));
                            }
                            DataSetMessageData::KeyFrame(KeyFrameData { fields, ..KeyFrameData::default() })
                        },
                        FieldEncoding::DataValue => {
                            let count = u16::decode(cur)?;
                            let mut fields = Vec::with_capacity(usize::from(count));
                            for _ in 0..count {
                                fields.push(DataValue::decode(cur)?);
                            }
                            DataSetMessageData::KeyFrame(KeyFrameData { fields, ..KeyFrameData::default() })
                        },
                        FieldEncoding::RawData => {
                            let start = cur.position();
                            let raw = if dsm_size == 0 {
                                let raw = cur.source().slice(start..cur.source().len());
                                cur.set_position(start + RAW_SIZE_FALLBACK);
                                raw
                            } else {
                                let remainder = dsm_size
                                    .checked_sub(consumed)
                                    .ok_or(CodecError::Malformed { what: "data set message size" })?;
                                cur.read_slice(remainder)?
                            };
                            DataSetMessageData::KeyFrame(KeyFrameData {
                                raw_fields: Some(raw),
                                ..KeyFrameData::default()
                            })
                        },
                    }
                }
            },
            DataSetMessageType::DeltaFrame => {
                if header.field_encoding == FieldEncoding::RawData {
                    return Err(CodecError::NotImplemented("delta frame raw encoding"));
                }
                let count = u16::decode(cur)?;
                let mut fields = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    let index = u16::decode(cur)?;
                    let value = match header.field_encoding {
                        FieldEncoding::Variant => DataValue::from_value(Variant::decode(cur)?),
                        FieldEncoding::DataValue => DataValue::decode(cur)?,
                        FieldEncoding::RawData => {
                            return Err(CodecError::NotImplemented("delta frame raw encoding"));
                        },
                    };
                    fields.push(DeltaFrameField { index, value });
                }
                DataSetMessageData::DeltaFrame(DeltaFrameData { fields })
            },
            DataSetMessageType::KeepAlive => DataSetMessageData::KeepAlive,
            DataSetMessageType::Event => {
                return Err(CodecError::NotImplemented("event data set message"));
            },
        };

        Ok(Self { header, data })
    }
}
