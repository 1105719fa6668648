//! NetworkMessage header codec, size calculator and frame assembler.
//!
//! The first byte carries the version and the primary enable bits; two
//! further flag bytes cascade behind it, each present only when
//! something it gates is in use. Encode composes base, group, payload
//! and extended headers before the security header; decode reads the
//! security header before the extended header, mirroring the wire
//! placement of security relative to promoted fields. Both directions
//! consult the same predicates on [`NetworkMessage`], so the cascade
//! cannot drift between the size calculator, the encoder and the
//! decoder.

use bytes::Bytes;
use uadp_types::{
    BinaryCodec, CodecError, DateTime, Guid, ReadCursor, Result, UaString, Variant, WriteCursor,
};

use crate::{
    dataset::DataSetMessage,
    message::{
        DataSetPayloadHeader, GroupHeader, MAX_NONCE_LENGTH, NetworkMessage, NetworkMessageType,
        PublisherId, PublisherIdType, SecurityHeader,
    },
    offsets::{NetworkMessageOffset, NetworkMessageOffsetBuffer, OffsetContent},
};

const VERSION_MASK: u8 = 0x0F;
const FLAGS_PUBLISHER_ID: u8 = 0x10;
const FLAGS_GROUP_HEADER: u8 = 0x20;
const FLAGS_PAYLOAD_HEADER: u8 = 0x40;
const FLAGS_EXTENDED1: u8 = 0x80;

const EXT1_PUBLISHER_ID_TYPE_MASK: u8 = 0x07;
const EXT1_DATASET_CLASS_ID: u8 = 0x08;
const EXT1_SECURITY: u8 = 0x10;
const EXT1_TIMESTAMP: u8 = 0x20;
const EXT1_PICOSECONDS: u8 = 0x40;
const EXT1_EXTENDED2: u8 = 0x80;

const EXT2_CHUNK: u8 = 0x01;
const EXT2_PROMOTED_FIELDS: u8 = 0x02;
const EXT2_MESSAGE_TYPE_MASK: u8 = 0x1C;
const EXT2_MESSAGE_TYPE_SHIFT: u8 = 2;

const GROUP_WRITER_GROUP_ID: u8 = 0x01;
const GROUP_VERSION: u8 = 0x02;
const GROUP_NETWORK_MESSAGE_NUMBER: u8 = 0x04;
const GROUP_SEQUENCE_NUMBER: u8 = 0x08;

const SECURITY_SIGNED: u8 = 0x01;
const SECURITY_ENCRYPTED: u8 = 0x02;
const SECURITY_FOOTER: u8 = 0x04;
const SECURITY_KEY_RESET: u8 = 0x08;

/// Enable bits read from the flag bytes, needed across the decode
/// stages that follow the first header.
#[derive(Debug, Default, Clone, Copy)]
struct WireFlags {
    group_header: bool,
    payload_header: bool,
    security: bool,
    timestamp: bool,
    picoseconds: bool,
    promoted_fields: bool,
}

impl NetworkMessage {
    /// Write every header block in wire order: base, group, payload,
    /// extended, security.
    pub fn encode_headers(&self, cur: &mut WriteCursor<'_>) -> Result<()> {
        self.encode_network_header(cur)?;
        if let Some(group) = &self.group_header {
            encode_group_header(group, cur)?;
        }
        if let Some(payload_header) = &self.payload_header {
            self.encode_payload_header(payload_header, cur)?;
        }
        self.encode_extended_header(cur)?;
        if let Some(security) = &self.security {
            encode_security_header(security, cur)?;
        }
        Ok(())
    }

    fn encode_network_header(&self, cur: &mut WriteCursor<'_>) -> Result<()> {
        let mut flags = self.version & VERSION_MASK;
        if self.publisher_id.is_some() {
            flags |= FLAGS_PUBLISHER_ID;
        }
        if self.group_header.is_some() {
            flags |= FLAGS_GROUP_HEADER;
        }
        if self.payload_header.is_some() {
            flags |= FLAGS_PAYLOAD_HEADER;
        }
        if self.extended_flags1_enabled() {
            flags |= FLAGS_EXTENDED1;
        }
        cur.write_u8(flags)?;

        if self.extended_flags1_enabled() {
            let mut ext1 = self.publisher_id_type() as u8;
            if self.dataset_class_id.is_some() {
                ext1 |= EXT1_DATASET_CLASS_ID;
            }
            if self.security.is_some() {
                ext1 |= EXT1_SECURITY;
            }
            if self.timestamp.is_some() {
                ext1 |= EXT1_TIMESTAMP;
            }
            if self.picoseconds.is_some() {
                ext1 |= EXT1_PICOSECONDS;
            }
            if self.extended_flags2_enabled() {
                ext1 |= EXT1_EXTENDED2;
            }
            cur.write_u8(ext1)?;

            if self.extended_flags2_enabled() {
                let mut ext2 = (self.message_type as u8) << EXT2_MESSAGE_TYPE_SHIFT;
                if self.chunk_message {
                    ext2 |= EXT2_CHUNK;
                }
                if self.promoted_fields.is_some() {
                    ext2 |= EXT2_PROMOTED_FIELDS;
                }
                cur.write_u8(ext2)?;
            }
        }

        if let Some(id) = &self.publisher_id {
            match id {
                PublisherId::Byte(v) => v.encode(cur)?,
                PublisherId::UInt16(v) => v.encode(cur)?,
                PublisherId::UInt32(v) => v.encode(cur)?,
                PublisherId::UInt64(v) => v.encode(cur)?,
                PublisherId::String(v) => v.encode(cur)?,
            }
        }

        if let Some(class_id) = &self.dataset_class_id {
            class_id.encode(cur)?;
        }
        Ok(())
    }

    fn encode_payload_header(
        &self,
        payload_header: &DataSetPayloadHeader,
        cur: &mut WriteCursor<'_>,
    ) -> Result<()> {
        if self.message_type != NetworkMessageType::DataSet {
            return Err(CodecError::NotImplemented("non-dataset payload header"));
        }
        let count = u8::try_from(payload_header.writer_ids.len())
            .map_err(|_| CodecError::Encoding("more than 255 dataset messages"))?;
        cur.write_u8(count)?;
        for writer_id in &payload_header.writer_ids {
            writer_id.encode(cur)?;
        }
        Ok(())
    }

    fn encode_extended_header(&self, cur: &mut WriteCursor<'_>) -> Result<()> {
        if let Some(timestamp) = &self.timestamp {
            timestamp.encode(cur)?;
        }
        if let Some(picoseconds) = &self.picoseconds {
            picoseconds.encode(cur)?;
        }
        if let Some(fields) = &self.promoted_fields {
            let blob: usize = fields.iter().map(BinaryCodec::byte_size).sum();
            u16::try_from(blob)
                .map_err(|_| CodecError::Encoding("promoted fields larger than 65535 bytes"))?
                .encode(cur)?;
            for field in fields {
                field.encode(cur)?;
            }
        }
        Ok(())
    }

    /// Write the dataset payload: the sizes array when more than one
    /// message is announced, then the messages back to back.
    pub fn encode_payload(&self, cur: &mut WriteCursor<'_>) -> Result<()> {
        if self.message_type != NetworkMessageType::DataSet {
            return Err(CodecError::NotImplemented("non-dataset payload"));
        }

        let count = self.payload_count();
        if self.payload_header.is_some() && count > 1 {
            for i in 0..count {
                let message = self.payload_message(i)?;
                let declared = self.payload.sizes.as_ref().and_then(|s| s.get(i)).copied();
                let size = match declared {
                    Some(size) if size != 0 => size,
                    // No declared size: compute it on the fly
                    _ => u16::try_from(message.binary_size(None, 0)?)
                        .map_err(|_| CodecError::Encoding("dataset message larger than 65535 bytes"))?,
                };
                size.encode(cur)?;
            }
        }

        for i in 0..count {
            self.payload_message(i)?.encode_binary(cur)?;
        }
        Ok(())
    }

    fn payload_message(&self, index: usize) -> Result<&DataSetMessage> {
        self.payload
            .messages
            .get(index)
            .ok_or(CodecError::Encoding("fewer dataset messages than the payload header announces"))
    }

    /// Write the security footer when one is enabled.
    pub fn encode_footers(&self, cur: &mut WriteCursor<'_>) -> Result<()> {
        let Some(security) = &self.security else { return Ok(()) };
        if !security.security_footer_enabled {
            return Ok(());
        }
        let declared = usize::from(security.security_footer_size);
        let footer = self.security_footer.as_deref().unwrap_or(&[]);
        if footer.len() < declared {
            return Err(CodecError::Encoding("security footer shorter than its declared size"));
        }
        cur.write_bytes(&footer[..declared])
    }

    /// Encode the whole frame and return the encrypt-start position:
    /// headers, then payload and footers, which together form the
    /// region a security policy encrypts.
    pub fn encode_binary(&self, cur: &mut WriteCursor<'_>) -> Result<usize> {
        self.encode_headers(cur)?;
        let encrypt_start = cur.position();
        self.encode_payload(cur)?;
        self.encode_footers(cur)?;
        Ok(encrypt_start)
    }

    /// Read every header block: base, group, payload, security,
    /// extended.
    pub fn decode_headers(src: &Bytes, position: &mut usize) -> Result<Self> {
        let mut cur = ReadCursor::at(src, *position);
        let mut nm = Self::default();

        let flags = decode_network_header(&mut nm, &mut cur)?;
        if flags.group_header {
            decode_group_header(&mut nm, &mut cur)?;
        }
        if flags.payload_header {
            decode_payload_header(&mut nm, &mut cur)?;
        }
        if flags.security {
            decode_security_header(&mut nm, &mut cur)?;
        }
        decode_extended_header(&mut nm, flags, &mut cur)?;

        *position = cur.position();
        Ok(nm)
    }

    /// Read the dataset payload into a message whose headers are
    /// already decoded. A single message consumes the remainder of the
    /// frame; multiple messages are bounded by the sizes array.
    pub fn decode_payload(&mut self, src: &Bytes, position: &mut usize) -> Result<()> {
        if self.message_type != NetworkMessageType::DataSet {
            return Err(CodecError::NotImplemented("non-dataset payload"));
        }
        let mut cur = ReadCursor::at(src, *position);

        let count = self.payload_count();
        if self.payload_header.is_some() && count > 1 {
            let mut sizes = Vec::with_capacity(count);
            for _ in 0..count {
                sizes.push(u16::decode(&mut cur)?);
            }
            self.payload.sizes = Some(sizes);
        }

        let mut messages = Vec::with_capacity(count);
        if count == 1 {
            messages.push(DataSetMessage::decode_binary(&mut cur, 0)?);
        } else {
            for i in 0..count {
                let declared = self
                    .payload
                    .sizes
                    .as_ref()
                    .and_then(|s| s.get(i))
                    .copied()
                    .unwrap_or(0);
                messages.push(DataSetMessage::decode_binary(&mut cur, usize::from(declared))?);
            }
        }
        self.payload.messages = messages;

        *position = cur.position();
        Ok(())
    }

    /// Read the security footer when the header announced one.
    pub fn decode_footers(&mut self, src: &Bytes, position: &mut usize) -> Result<()> {
        let Some(security) = &self.security else { return Ok(()) };
        if security.security_footer_enabled && security.security_footer_size > 0 {
            let mut cur = ReadCursor::at(src, *position);
            self.security_footer = Some(cur.read_slice(usize::from(security.security_footer_size))?);
            *position = cur.position();
        }
        Ok(())
    }

    /// Decode a whole frame: headers, payload, footers.
    pub fn decode_binary(src: &Bytes, position: &mut usize) -> Result<Self> {
        let mut nm = Self::decode_headers(src, position)?;
        nm.decode_payload(src, position)?;
        nm.decode_footers(src, position)?;
        Ok(nm)
    }

    /// Exact encoded frame size.
    ///
    /// With an offset buffer, every mutable field is recorded as a
    /// frame-absolute `(position, content)` entry in encode order, and
    /// raw payload fields accumulate the buffer's raw span length. The
    /// returned size is what [`NetworkMessage::encode_binary`] will
    /// write, byte for byte.
    pub fn binary_size(
        &self,
        mut offsets: Option<&mut NetworkMessageOffsetBuffer>,
    ) -> Result<usize> {
        let mut size = 1usize;
        if self.extended_flags1_enabled() {
            size += 1;
            if self.extended_flags2_enabled() {
                size += 1;
            }
        }

        if let Some(id) = &self.publisher_id {
            if let Some(buf) = offsets.as_deref_mut() {
                buf.offsets
                    .push(NetworkMessageOffset { position: size, content: OffsetContent::PublisherId });
            }
            size += id.byte_size();
        }

        if let Some(class_id) = &self.dataset_class_id {
            size += class_id.byte_size();
        }

        if let Some(group) = &self.group_header {
            size += 1;
            if let Some(writer_group_id) = group.writer_group_id {
                if let Some(buf) = offsets.as_deref_mut() {
                    buf.offsets.push(NetworkMessageOffset {
                        position: size,
                        content: OffsetContent::WriterGroupId,
                    });
                }
                size += writer_group_id.byte_size();
            }
            size += group.group_version.as_ref().map_or(0, BinaryCodec::byte_size);
            size += group.network_message_number.as_ref().map_or(0, BinaryCodec::byte_size);
            if let Some(sequence_number) = group.sequence_number {
                if let Some(buf) = offsets.as_deref_mut() {
                    buf.offsets.push(NetworkMessageOffset {
                        position: size,
                        content: OffsetContent::GroupSequenceNumber(sequence_number),
                    });
                }
                size += sequence_number.byte_size();
            }
        }

        if let Some(payload_header) = &self.payload_header {
            if self.message_type != NetworkMessageType::DataSet {
                return Err(CodecError::NotImplemented("non-dataset payload header"));
            }
            let count = payload_header.writer_ids.len();
            if count > 255 {
                return Err(CodecError::Encoding("more than 255 dataset messages"));
            }
            size += 1;
            if !payload_header.writer_ids.is_empty() {
                if let Some(buf) = offsets.as_deref_mut() {
                    buf.offsets.push(NetworkMessageOffset {
                        position: size,
                        content: OffsetContent::DataSetWriterId,
                    });
                }
                size += 2 * count;
            }
        }

        if let Some(timestamp) = &self.timestamp {
            if let Some(buf) = offsets.as_deref_mut() {
                buf.offsets
                    .push(NetworkMessageOffset { position: size, content: OffsetContent::Timestamp });
            }
            size += timestamp.byte_size();
        }

        if let Some(picoseconds) = &self.picoseconds {
            if let Some(buf) = offsets.as_deref_mut() {
                buf.offsets.push(NetworkMessageOffset {
                    position: size,
                    content: OffsetContent::TimestampPicoseconds,
                });
            }
            size += picoseconds.byte_size();
        }

        if let Some(fields) = &self.promoted_fields {
            size += 2;
            size += fields.iter().map(BinaryCodec::byte_size).sum::<usize>();
        }

        if let Some(security) = &self.security {
            if security.message_nonce.len() > MAX_NONCE_LENGTH {
                return Err(CodecError::SecurityChecksFailed {
                    what: "message nonce exceeds 16 bytes",
                });
            }
            size += 1 + 4 + 1 + security.message_nonce.len();
            if security.security_footer_enabled {
                size += 2;
            }
        }

        if self.message_type != NetworkMessageType::DataSet {
            return Err(CodecError::NotImplemented("non-dataset payload"));
        }
        let count = self.payload_count();
        if self.payload.messages.len() < count {
            return Err(CodecError::Encoding(
                "fewer dataset messages than the payload header announces",
            ));
        }
        if self.payload_header.is_some() && count > 1 {
            size += 2 * count;
        }
        for message in self.payload.messages.iter().take(count) {
            size += message.binary_size(offsets.as_deref_mut(), size)?;
        }

        if let Some(security) = &self.security {
            if security.security_footer_enabled {
                size += usize::from(security.security_footer_size);
            }
        }

        Ok(size)
    }
}

fn decode_network_header(nm: &mut NetworkMessage, cur: &mut ReadCursor<'_>) -> Result<WireFlags> {
    let flags = cur.read_u8()?;
    nm.version = flags & VERSION_MASK;

    let publisher_id_present = flags & FLAGS_PUBLISHER_ID != 0;
    let mut wire = WireFlags {
        group_header: flags & FLAGS_GROUP_HEADER != 0,
        payload_header: flags & FLAGS_PAYLOAD_HEADER != 0,
        ..WireFlags::default()
    };

    let mut publisher_id_type = PublisherIdType::Byte;
    if flags & FLAGS_EXTENDED1 != 0 {
        let ext1 = cur.read_u8()?;
        publisher_id_type = PublisherIdType::from_bits(ext1 & EXT1_PUBLISHER_ID_TYPE_MASK)
            .ok_or(CodecError::Malformed { what: "publisher id type" })?;
        wire.security = ext1 & EXT1_SECURITY != 0;
        wire.timestamp = ext1 & EXT1_TIMESTAMP != 0;
        wire.picoseconds = ext1 & EXT1_PICOSECONDS != 0;
        let class_id_present = ext1 & EXT1_DATASET_CLASS_ID != 0;

        if ext1 & EXT1_EXTENDED2 != 0 {
            let ext2 = cur.read_u8()?;
            nm.chunk_message = ext2 & EXT2_CHUNK != 0;
            wire.promoted_fields = ext2 & EXT2_PROMOTED_FIELDS != 0;
            nm.message_type = NetworkMessageType::from_bits(
                (ext2 & EXT2_MESSAGE_TYPE_MASK) >> EXT2_MESSAGE_TYPE_SHIFT,
            )
            .ok_or(CodecError::NotImplemented("unknown network message type"))?;
        }

        if publisher_id_present {
            nm.publisher_id = Some(decode_publisher_id(publisher_id_type, cur)?);
        }
        if class_id_present {
            nm.dataset_class_id = Some(Guid::decode(cur)?);
        }
        return Ok(wire);
    }

    if publisher_id_present {
        nm.publisher_id = Some(decode_publisher_id(publisher_id_type, cur)?);
    }
    Ok(wire)
}

fn decode_publisher_id(id_type: PublisherIdType, cur: &mut ReadCursor<'_>) -> Result<PublisherId> {
    Ok(match id_type {
        PublisherIdType::Byte => PublisherId::Byte(u8::decode(cur)?),
        PublisherIdType::UInt16 => PublisherId::UInt16(u16::decode(cur)?),
        PublisherIdType::UInt32 => PublisherId::UInt32(u32::decode(cur)?),
        PublisherIdType::UInt64 => PublisherId::UInt64(u64::decode(cur)?),
        PublisherIdType::String => PublisherId::String(UaString::decode(cur)?),
    })
}

fn encode_group_header(group: &GroupHeader, cur: &mut WriteCursor<'_>) -> Result<()> {
    let mut flags = 0u8;
    if group.writer_group_id.is_some() {
        flags |= GROUP_WRITER_GROUP_ID;
    }
    if group.group_version.is_some() {
        flags |= GROUP_VERSION;
    }
    if group.network_message_number.is_some() {
        flags |= GROUP_NETWORK_MESSAGE_NUMBER;
    }
    if group.sequence_number.is_some() {
        flags |= GROUP_SEQUENCE_NUMBER;
    }
    cur.write_u8(flags)?;

    if let Some(writer_group_id) = &group.writer_group_id {
        writer_group_id.encode(cur)?;
    }
    if let Some(group_version) = &group.group_version {
        group_version.encode(cur)?;
    }
    if let Some(number) = &group.network_message_number {
        number.encode(cur)?;
    }
    if let Some(sequence_number) = &group.sequence_number {
        sequence_number.encode(cur)?;
    }
    Ok(())
}

fn decode_group_header(nm: &mut NetworkMessage, cur: &mut ReadCursor<'_>) -> Result<()> {
    let flags = cur.read_u8()?;
    let mut group = GroupHeader::default();
    if flags & GROUP_WRITER_GROUP_ID != 0 {
        group.writer_group_id = Some(u16::decode(cur)?);
    }
    if flags & GROUP_VERSION != 0 {
        group.group_version = Some(u32::decode(cur)?);
    }
    if flags & GROUP_NETWORK_MESSAGE_NUMBER != 0 {
        group.network_message_number = Some(u16::decode(cur)?);
    }
    if flags & GROUP_SEQUENCE_NUMBER != 0 {
        group.sequence_number = Some(u16::decode(cur)?);
    }
    nm.group_header = Some(group);
    Ok(())
}

fn decode_payload_header(nm: &mut NetworkMessage, cur: &mut ReadCursor<'_>) -> Result<()> {
    if nm.message_type != NetworkMessageType::DataSet {
        return Err(CodecError::NotImplemented("non-dataset payload header"));
    }
    let count = cur.read_u8()?;
    let mut writer_ids = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        writer_ids.push(u16::decode(cur)?);
    }
    nm.payload_header = Some(DataSetPayloadHeader { writer_ids });
    Ok(())
}

fn decode_extended_header(
    nm: &mut NetworkMessage,
    flags: WireFlags,
    cur: &mut ReadCursor<'_>,
) -> Result<()> {
    if flags.timestamp {
        nm.timestamp = Some(DateTime::decode(cur)?);
    }
    if flags.picoseconds {
        nm.picoseconds = Some(u16::decode(cur)?);
    }
    if flags.promoted_fields {
        // Size prefix counts bytes, not fields
        let blob = usize::from(u16::decode(cur)?);
        let end = cur.position() + blob;
        let mut fields = Vec::new();
        while cur.position() < end {
            fields.push(Variant::decode(cur)?);
        }
        if cur.position() != end {
            return Err(CodecError::Malformed { what: "promoted fields size" });
        }
        nm.promoted_fields = Some(fields);
    }
    Ok(())
}

fn encode_security_header(security: &SecurityHeader, cur: &mut WriteCursor<'_>) -> Result<()> {
    let mut flags = 0u8;
    if security.network_message_signed {
        flags |= SECURITY_SIGNED;
    }
    if security.network_message_encrypted {
        flags |= SECURITY_ENCRYPTED;
    }
    if security.security_footer_enabled {
        flags |= SECURITY_FOOTER;
    }
    if security.force_key_reset {
        flags |= SECURITY_KEY_RESET;
    }
    cur.write_u8(flags)?;

    security.security_token_id.encode(cur)?;

    if security.message_nonce.len() > MAX_NONCE_LENGTH {
        return Err(CodecError::SecurityChecksFailed { what: "message nonce exceeds 16 bytes" });
    }
    cur.write_u8(security.message_nonce.len() as u8)?;
    cur.write_bytes(&security.message_nonce)?;

    if security.security_footer_enabled {
        security.security_footer_size.encode(cur)?;
    }
    Ok(())
}

fn decode_security_header(nm: &mut NetworkMessage, cur: &mut ReadCursor<'_>) -> Result<()> {
    let flags = cur.read_u8()?;
    let mut security = SecurityHeader {
        network_message_signed: flags & SECURITY_SIGNED != 0,
        network_message_encrypted: flags & SECURITY_ENCRYPTED != 0,
        security_footer_enabled: flags & SECURITY_FOOTER != 0,
        force_key_reset: flags & SECURITY_KEY_RESET != 0,
        ..SecurityHeader::default()
    };

    security.security_token_id = u32::decode(cur)?;

    let nonce_length = usize::from(cur.read_u8()?);
    if nonce_length > MAX_NONCE_LENGTH {
        return Err(CodecError::SecurityChecksFailed { what: "message nonce exceeds 16 bytes" });
    }
    if nonce_length > 0 {
        security.message_nonce = cur.read_slice(nonce_length)?.to_vec();
    }

    if security.security_footer_enabled {
        security.security_footer_size = u16::decode(cur)?;
    }

    nm.security = Some(security);
    Ok(())
}

#[cfg(test)]
mod tests {
    use uadp_types::DataValue;

    use super::*;
    use crate::{
        dataset::{DataSetMessageData, DataSetMessageHeader, KeyFrameData},
        message::DataSetPayload,
    };

    fn encode(nm: &NetworkMessage) -> Vec<u8> {
        let size = nm.binary_size(None).unwrap();
        let mut buf = vec![0u8; size];
        let mut cur = WriteCursor::new(&mut buf);
        nm.encode_binary(&mut cur).unwrap();
        assert_eq!(cur.position(), size, "size calculator and encoder disagree");
        buf
    }

    fn single_heartbeat() -> DataSetPayload {
        DataSetPayload { sizes: None, messages: vec![DataSetMessage::default()] }
    }

    #[test]
    fn minimal_frame_wire_bytes() {
        let nm = NetworkMessage {
            version: 1,
            publisher_id: Some(PublisherId::Byte(0x2A)),
            payload: single_heartbeat(),
            ..NetworkMessage::default()
        };
        let wire = encode(&nm);
        // version 1 | publisher id bit, the id, one heartbeat flag byte
        assert_eq!(wire, [0x11, 0x2A, 0x00]);
    }

    #[test]
    fn uint16_publisher_id_requires_extended_flags() {
        let nm = NetworkMessage {
            publisher_id: Some(PublisherId::UInt16(0x0304)),
            payload: single_heartbeat(),
            ..NetworkMessage::default()
        };
        let wire = encode(&nm);
        assert_eq!(wire, [0x90, 0x01, 0x04, 0x03, 0x00]);
    }

    #[test]
    fn group_header_wire_bytes() {
        let nm = NetworkMessage {
            group_header: Some(GroupHeader {
                writer_group_id: Some(0x0102),
                sequence_number: Some(0x0A0B),
                ..GroupHeader::default()
            }),
            payload: single_heartbeat(),
            ..NetworkMessage::default()
        };
        let wire = encode(&nm);
        assert_eq!(wire, [0x20, 0x01 | 0x08, 0x02, 0x01, 0x0B, 0x0A, 0x00]);
    }

    #[test]
    fn promoted_fields_wire_form() {
        let nm = NetworkMessage {
            promoted_fields: Some(vec![Variant::from(1u32), Variant::from(2u32)]),
            payload: single_heartbeat(),
            ..NetworkMessage::default()
        };
        let wire = encode(&nm);
        // byte0 with ext1, ext1 with ext2, ext2 with promoted bit
        assert_eq!(&wire[..3], &[0x80, 0x80, 0x02]);
        // blob size covers two five-byte variants
        assert_eq!(&wire[3..5], &[10, 0]);

        let src = Bytes::from(wire);
        let decoded = NetworkMessage::decode_binary(&src, &mut 0).unwrap();
        assert_eq!(
            decoded.promoted_fields,
            Some(vec![Variant::from(1u32), Variant::from(2u32)])
        );
    }

    #[test]
    fn security_header_wire_bytes() {
        let nm = NetworkMessage {
            security: Some(SecurityHeader {
                network_message_signed: true,
                network_message_encrypted: true,
                security_token_id: 0xDEAD_BEEF,
                message_nonce: (0..12).collect(),
                ..SecurityHeader::default()
            }),
            payload: single_heartbeat(),
            ..NetworkMessage::default()
        };
        let wire = encode(&nm);
        assert_eq!(wire[0], 0x80);
        assert_eq!(wire[1], 0x10); // ext1: security bit
        assert_eq!(wire[2], 0x01 | 0x02); // signed | encrypted
        assert_eq!(&wire[3..7], &[0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(wire[7], 12);
        assert_eq!(&wire[8..20], &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn oversized_nonce_is_rejected_both_ways() {
        let nm = NetworkMessage {
            security: Some(SecurityHeader {
                message_nonce: vec![0; 17],
                ..SecurityHeader::default()
            }),
            payload: single_heartbeat(),
            ..NetworkMessage::default()
        };
        assert!(matches!(
            nm.binary_size(None).unwrap_err(),
            CodecError::SecurityChecksFailed { .. }
        ));

        // A frame declaring a 17-byte nonce fails decode the same way
        let wire = [0x80, 0x10, 0x00, 0, 0, 0, 0, 17];
        let src = Bytes::copy_from_slice(&wire);
        assert!(matches!(
            NetworkMessage::decode_headers(&src, &mut 0).unwrap_err(),
            CodecError::SecurityChecksFailed { .. }
        ));
    }

    #[test]
    fn multi_message_payload_has_sizes_array() {
        let dsm = DataSetMessage {
            header: DataSetMessageHeader::default(),
            data: DataSetMessageData::KeyFrame(KeyFrameData {
                fields: vec![DataValue::from_value(1u32)],
                ..KeyFrameData::default()
            }),
        };
        let nm = NetworkMessage {
            payload_header: Some(DataSetPayloadHeader { writer_ids: vec![10, 11] }),
            payload: DataSetPayload { sizes: None, messages: vec![dsm.clone(), dsm.clone()] },
            ..NetworkMessage::default()
        };
        let wire = encode(&nm);
        let dsm_size = dsm.binary_size(None, 0).unwrap();
        // byte0, count, two writer ids, two u16 sizes
        assert_eq!(wire[1], 2);
        let sizes_at = 2 + 4;
        assert_eq!(wire[sizes_at], dsm_size as u8);

        let src = Bytes::from(wire);
        let decoded = NetworkMessage::decode_binary(&src, &mut 0).unwrap();
        assert_eq!(decoded.payload.messages.len(), 2);
        assert_eq!(decoded.payload.sizes, Some(vec![dsm_size as u16, dsm_size as u16]));
    }

    #[test]
    fn payload_header_mismatch_is_encoding_error() {
        let nm = NetworkMessage {
            payload_header: Some(DataSetPayloadHeader { writer_ids: vec![10, 11] }),
            payload: single_heartbeat(),
            ..NetworkMessage::default()
        };
        assert!(nm.binary_size(None).unwrap_err().is_encoding());
    }

    #[test]
    fn non_dataset_type_is_not_implemented() {
        let nm = NetworkMessage {
            message_type: NetworkMessageType::DiscoveryRequest,
            payload: single_heartbeat(),
            ..NetworkMessage::default()
        };
        assert_eq!(
            nm.binary_size(None).unwrap_err(),
            CodecError::NotImplemented("non-dataset payload")
        );
    }

    #[test]
    fn absent_extended_flags_default_cleanly() {
        // byte0 with only a group header; no ext1 on the wire
        let src = Bytes::copy_from_slice(&[0x20, 0x00, 0x00]);
        let decoded = NetworkMessage::decode_binary(&src, &mut 0).unwrap();
        assert_eq!(decoded.publisher_id_type(), PublisherIdType::Byte);
        assert_eq!(decoded.message_type, NetworkMessageType::DataSet);
        assert!(!decoded.chunk_message);
        assert!(decoded.promoted_fields.is_none());
        assert!(decoded.group_header.is_some_and(|g| g.is_empty()));
    }

    #[test]
    fn ext1_without_ext2_defaults_message_type() {
        // ext1 present for a timestamp; ext2 absent
        let nm = NetworkMessage {
            timestamp: Some(DateTime(0x0102_0304_0506_0708)),
            payload: single_heartbeat(),
            ..NetworkMessage::default()
        };
        let wire = encode(&nm);
        assert_eq!(wire[0], 0x80);
        assert_eq!(wire[1], 0x20);

        let src = Bytes::from(wire);
        let decoded = NetworkMessage::decode_binary(&src, &mut 0).unwrap();
        assert_eq!(decoded.message_type, NetworkMessageType::DataSet);
        assert_eq!(decoded.timestamp, Some(DateTime(0x0102_0304_0506_0708)));
    }

    #[test]
    fn security_footer_round_trip() {
        // A field-bearing payload keeps the footer unambiguous (a lone
        // heartbeat is recognized by running out of bytes)
        let dsm = DataSetMessage {
            header: DataSetMessageHeader::default(),
            data: DataSetMessageData::KeyFrame(KeyFrameData {
                fields: vec![DataValue::from_value(5u32)],
                ..KeyFrameData::default()
            }),
        };
        let nm = NetworkMessage {
            security: Some(SecurityHeader {
                security_footer_enabled: true,
                security_footer_size: 4,
                ..SecurityHeader::default()
            }),
            security_footer: Some(Bytes::from_static(&[9, 8, 7, 6])),
            payload: DataSetPayload { sizes: None, messages: vec![dsm] },
            ..NetworkMessage::default()
        };
        let wire = encode(&nm);
        assert_eq!(&wire[wire.len() - 4..], &[9, 8, 7, 6]);

        let src = Bytes::from(wire);
        let decoded = NetworkMessage::decode_binary(&src, &mut 0).unwrap();
        assert_eq!(decoded.security_footer, Some(Bytes::from_static(&[9, 8, 7, 6])));
    }
}
