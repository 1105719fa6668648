//! Offset buffer engine for realtime publish and subscribe.
//!
//! During size calculation the codec records one entry per mutable
//! field: the frame-absolute byte position and the semantic role of the
//! bytes there. A publisher keeps the encoded frame and calls
//! [`NetworkMessageOffsetBuffer::update_message`] each cycle to rewrite
//! only those bytes; a realtime subscriber pre-shapes a message of the
//! known frame layout and calls
//! [`NetworkMessageOffsetBuffer::update_from_wire`] to decode only
//! those bytes out of each inbound frame.
//!
//! Ownership is explicit in the entry type: cached payload values are
//! owned clones taken at size-calc time, while raw subscribe views are
//! reference-counted slices of the inbound frame.

use bytes::Bytes;
use uadp_types::{
    BinaryCodec, CodecError, DataValue, ReadCursor, Result, Variant, WriteCursor,
};

use crate::{
    dataset::{DataSetMessageData, DataSetMessageHeader},
    message::{NetworkMessage, PublisherId, PublisherIdType},
};

/// Semantic role of the bytes at one recorded position, together with
/// the cached state the publish-side refresh needs.
#[derive(Debug, Clone, PartialEq)]
pub enum OffsetContent {
    /// Start of a dataset message header (field-encoding flag byte).
    /// Re-decoded for validation on the subscribe side.
    FieldEncoding,
    /// Publisher id within the network header
    PublisherId,
    /// Writer group id within the group header
    WriterGroupId,
    /// First writer id of the payload header
    DataSetWriterId,
    /// Group-level sequence number with its cached counter
    GroupSequenceNumber(u16),
    /// Dataset-message sequence number with its cached counter
    DataSetSequenceNumber(u16),
    /// Network-level timestamp
    Timestamp,
    /// Network-level picoseconds
    TimestampPicoseconds,
    /// Payload field in data-value encoding, cached for re-encode
    PayloadDataValue(DataValue),
    /// Payload field in variant encoding, cached for re-encode
    PayloadVariant(Variant),
    /// Payload field in raw encoding, cached for re-encode
    PayloadRaw(Variant),
}

/// One mutable field of an encoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkMessageOffset {
    /// Byte position within the frame
    pub position: usize,
    /// What lives at that position
    pub content: OffsetContent,
}

/// A retained frame plus the index of its mutable bytes.
///
/// The buffer owns the retained frame, the offset entries (including
/// their cached values) and, on the subscribe side, the pre-shaped
/// message that inbound frames are patched into.
#[derive(Debug, Default)]
pub struct NetworkMessageOffsetBuffer {
    /// The retained encoded frame
    pub buffer: Vec<u8>,
    /// Mutable-field index, in encode order
    pub offsets: Vec<NetworkMessageOffset>,
    /// Pre-shaped message for subscribe-side patching
    pub message: Option<Box<NetworkMessage>>,
    /// Total byte span of raw payload fields
    pub raw_message_length: usize,
    /// Scratch frame for encrypted publishing
    #[cfg(feature = "encryption")]
    pub encrypt_buffer: Vec<u8>,
}

impl NetworkMessageOffsetBuffer {
    /// Refresh the retained frame in place.
    ///
    /// Sequence-number entries re-encode their cached counter and then
    /// increment it; payload entries re-encode their cached value.
    /// Everything else is stable across publications and skipped.
    pub fn update_message(&mut self) -> Result<()> {
        for entry in &mut self.offsets {
            let span = self
                .buffer
                .get_mut(entry.position..)
                .ok_or(CodecError::Internal("offset outside the retained frame"))?;
            let mut cur = WriteCursor::new(span);
            match &mut entry.content {
                OffsetContent::GroupSequenceNumber(counter)
                | OffsetContent::DataSetSequenceNumber(counter) => {
                    counter.encode(&mut cur)?;
                    *counter = counter.wrapping_add(1);
                },
                OffsetContent::PayloadDataValue(value) => value.encode(&mut cur)?,
                OffsetContent::PayloadVariant(value) => value.encode(&mut cur)?,
                OffsetContent::PayloadRaw(value) => value.raw_encode(&mut cur, 0)?,
                // Stable between publications; only patched on the
                // subscribe side.
                _ => {},
            }
        }
        tracing::trace!(offsets = self.offsets.len(), "refreshed retained frame");
        Ok(())
    }

    /// Patch the pre-shaped message from an inbound frame of the known
    /// layout, decoding only the recorded positions.
    ///
    /// `position` is the frame's start within `src` and advances past
    /// the consumed region. Raw payload entries alias `src` without
    /// copying.
    pub fn update_from_wire(&mut self, src: &Bytes, position: &mut usize) -> Result<()> {
        let message = self
            .message
            .as_deref_mut()
            .ok_or(CodecError::Internal("offset buffer has no pre-shaped message"))?;
        if src.len() < self.buffer.len() + *position {
            return Err(CodecError::SourceExhausted {
                needed: self.buffer.len() + *position - src.len(),
                remaining: src.len().saturating_sub(*position),
            });
        }

        let dsm = match message.payload.messages.as_mut_slice() {
            [single] => single,
            [] => return Err(CodecError::Internal("pre-shaped message has no dataset message")),
            _ => {
                return Err(CodecError::NotSupported(
                    "multiple dataset messages in realtime decode",
                ));
            },
        };

        let mut payload_index = 0usize;
        let mut end = *position;
        let mut smallest_raw: Option<usize> = None;

        for entry in &self.offsets {
            let at = entry.position + *position;
            let mut cur = ReadCursor::at(src, at);
            match &entry.content {
                OffsetContent::FieldEncoding => {
                    // Header layout validation only; the pre-shaped
                    // header already carries the decoded state.
                    let _ = DataSetMessageHeader::decode(&mut cur)?;
                    end = cur.position();
                },
                OffsetContent::PublisherId => {
                    let id = match message.publisher_id.as_ref().map(PublisherId::id_type) {
                        Some(PublisherIdType::Byte) => PublisherId::Byte(u8::decode(&mut cur)?),
                        Some(PublisherIdType::UInt16) => PublisherId::UInt16(u16::decode(&mut cur)?),
                        Some(PublisherIdType::UInt32) => PublisherId::UInt32(u32::decode(&mut cur)?),
                        Some(PublisherIdType::UInt64) => PublisherId::UInt64(u64::decode(&mut cur)?),
                        Some(PublisherIdType::String) => {
                            return Err(CodecError::NotSupported(
                                "string publisher id in realtime decode",
                            ));
                        },
                        None => {
                            return Err(CodecError::Internal(
                                "pre-shaped message has no publisher id",
                            ));
                        },
                    };
                    message.publisher_id = Some(id);
                    end = cur.position();
                },
                OffsetContent::WriterGroupId => {
                    let value = u16::decode(&mut cur)?;
                    message.group_header.get_or_insert_default().writer_group_id = Some(value);
                    end = cur.position();
                },
                OffsetContent::DataSetWriterId => {
                    let value = u16::decode(&mut cur)?;
                    let header = message.payload_header.get_or_insert_default();
                    if let Some(first) = header.writer_ids.first_mut() {
                        *first = value;
                    } else {
                        header.writer_ids.push(value);
                    }
                    end = cur.position();
                },
                OffsetContent::GroupSequenceNumber(_) => {
                    let value = u16::decode(&mut cur)?;
                    message.group_header.get_or_insert_default().sequence_number = Some(value);
                    end = cur.position();
                },
                OffsetContent::DataSetSequenceNumber(_) => {
                    dsm.header.sequence_number = Some(u16::decode(&mut cur)?);
                    end = cur.position();
                },
                OffsetContent::PayloadDataValue(_) => {
                    let value = DataValue::decode(&mut cur)?;
                    set_key_frame_field(&mut dsm.data, payload_index, value)?;
                    payload_index += 1;
                    end = cur.position();
                },
                OffsetContent::PayloadVariant(_) => {
                    let value = Variant::decode(&mut cur)?;
                    let field = DataValue::from_value(value);
                    set_key_frame_field(&mut dsm.data, payload_index, field)?;
                    payload_index += 1;
                    end = cur.position();
                },
                OffsetContent::PayloadRaw(_) => {
                    // Only the start of the raw block matters; the view
                    // spans every raw field at once.
                    if smallest_raw.is_none_or(|s| at < s) {
                        smallest_raw = Some(at);
                        let raw_end = at + self.raw_message_length;
                        if raw_end > src.len() {
                            return Err(CodecError::SourceExhausted {
                                needed: raw_end - src.len(),
                                remaining: src.len().saturating_sub(at),
                            });
                        }
                        let DataSetMessageData::KeyFrame(kf) = &mut dsm.data else {
                            return Err(CodecError::Internal(
                                "raw offset entry without a key frame",
                            ));
                        };
                        kf.raw_fields = Some(src.slice(at..raw_end));
                    }
                    payload_index += 1;
                },
                OffsetContent::Timestamp | OffsetContent::TimestampPicoseconds => {
                    return Err(CodecError::NotSupported(
                        "timestamp offsets in realtime decode",
                    ));
                },
            }
        }

        *position = match smallest_raw {
            Some(start) => start + self.raw_message_length,
            None => end,
        };
        tracing::trace!(
            offsets = self.offsets.len(),
            patched_fields = payload_index,
            "patched pre-shaped message from wire"
        );
        Ok(())
    }

    /// Drop the retained frame, the offset entries with their cached
    /// values, the pre-shaped message and the encrypt scratch buffer.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn set_key_frame_field(
    data: &mut DataSetMessageData,
    index: usize,
    value: DataValue,
) -> Result<()> {
    let DataSetMessageData::KeyFrame(kf) = data else {
        return Err(CodecError::Internal("payload offset entry without a key frame"));
    };
    if let Some(slot) = kf.fields.get_mut(index) {
        *slot = value;
    } else if kf.fields.len() == index {
        kf.fields.push(value);
    } else {
        return Err(CodecError::Internal("payload offset entries out of order"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dataset::{DataSetMessage, FieldEncoding, KeyFrameData},
        message::{DataSetPayload, DataSetPayloadHeader, GroupHeader},
    };

    fn sized_and_encoded(nm: &NetworkMessage) -> NetworkMessageOffsetBuffer {
        let mut buf = NetworkMessageOffsetBuffer::default();
        let size = nm.binary_size(Some(&mut buf)).unwrap();
        buf.buffer = vec![0u8; size];
        let mut cur = WriteCursor::new(&mut buf.buffer);
        let _ = nm.encode_binary(&mut cur).unwrap();
        assert_eq!(cur.position(), size);
        buf
    }

    fn group_sequence_message(sequence_number: u16) -> NetworkMessage {
        NetworkMessage {
            group_header: Some(GroupHeader {
                sequence_number: Some(sequence_number),
                ..GroupHeader::default()
            }),
            payload: DataSetPayload { sizes: None, messages: vec![DataSetMessage::default()] },
            ..NetworkMessage::default()
        }
    }

    #[test]
    fn sequence_number_offset_points_at_its_bytes() {
        let nm = group_sequence_message(0x0102);
        let buf = sized_and_encoded(&nm);

        let entry = buf
            .offsets
            .iter()
            .find(|e| matches!(e.content, OffsetContent::GroupSequenceNumber(_)))
            .unwrap();
        assert_eq!(entry.content, OffsetContent::GroupSequenceNumber(0x0102));
        assert_eq!(&buf.buffer[entry.position..entry.position + 2], &[0x02, 0x01]);
    }

    #[test]
    fn update_message_advances_sequence_numbers() {
        let nm = group_sequence_message(0x0102);
        let mut buf = sized_and_encoded(&nm);
        let position = buf
            .offsets
            .iter()
            .find(|e| matches!(e.content, OffsetContent::GroupSequenceNumber(_)))
            .unwrap()
            .position;

        // First refresh re-sends the cached counter, then increments it
        buf.update_message().unwrap();
        assert_eq!(&buf.buffer[position..position + 2], &[0x02, 0x01]);

        buf.update_message().unwrap();
        assert_eq!(&buf.buffer[position..position + 2], &[0x03, 0x01]);

        // Two refreshes advanced the cache by exactly 2
        let entry = &buf.offsets[0];
        assert_eq!(entry.content, OffsetContent::GroupSequenceNumber(0x0104));
    }

    #[test]
    fn update_message_leaves_other_bytes_untouched() {
        let nm = group_sequence_message(7);
        let mut buf = sized_and_encoded(&nm);
        let before = buf.buffer.clone();
        buf.update_message().unwrap();
        let position = buf.offsets[0].position;
        for (i, (a, b)) in before.iter().zip(buf.buffer.iter()).enumerate() {
            if i < position || i >= position + 2 {
                assert_eq!(a, b, "byte {i} changed");
            }
        }
    }

    #[test]
    fn update_from_wire_requires_pre_shaped_message() {
        let mut buf = NetworkMessageOffsetBuffer::default();
        let src = Bytes::new();
        assert_eq!(
            buf.update_from_wire(&src, &mut 0).unwrap_err(),
            CodecError::Internal("offset buffer has no pre-shaped message")
        );
    }

    #[test]
    fn update_from_wire_rejects_short_source() {
        let nm = group_sequence_message(1);
        let mut buf = sized_and_encoded(&nm);
        buf.message = Some(Box::new(nm));
        let src = Bytes::from(vec![0u8; buf.buffer.len() - 1]);
        assert!(buf.update_from_wire(&src, &mut 0).unwrap_err().is_decoding());
    }

    #[test]
    fn update_from_wire_rejects_multiple_messages() {
        let nm = group_sequence_message(1);
        let mut buf = sized_and_encoded(&nm);
        let mut shaped = nm.clone();
        shaped.payload.messages.push(DataSetMessage::default());
        buf.message = Some(Box::new(shaped));
        let src = Bytes::from(buf.buffer.clone());
        assert_eq!(
            buf.update_from_wire(&src, &mut 0).unwrap_err(),
            CodecError::NotSupported("multiple dataset messages in realtime decode")
        );
    }

    #[test]
    fn update_from_wire_patches_sequence_number() {
        let nm = group_sequence_message(0x0102);
        let mut buf = sized_and_encoded(&nm);
        buf.message = Some(Box::new(nm.clone()));

        // Same shape, new sequence number on the wire
        let inbound = group_sequence_message(0x0999);
        let mut wire = vec![0u8; inbound.binary_size(None).unwrap()];
        let _ = inbound.encode_binary(&mut WriteCursor::new(&mut wire)).unwrap();
        let src = Bytes::from(wire);

        let mut position = 0usize;
        buf.update_from_wire(&src, &mut position).unwrap();
        let patched = buf.message.as_ref().unwrap();
        assert_eq!(
            patched.group_header.as_ref().unwrap().sequence_number,
            Some(0x0999)
        );
        assert!(position > 0);
    }

    #[test]
    fn raw_patch_aliases_the_inbound_frame() {
        let dsm = DataSetMessage {
            header: crate::dataset::DataSetMessageHeader {
                field_encoding: FieldEncoding::RawData,
                ..crate::dataset::DataSetMessageHeader::default()
            },
            data: DataSetMessageData::KeyFrame(KeyFrameData {
                fields: vec![
                    DataValue::from_value(1u32),
                    DataValue::from_value(2u32),
                    DataValue::from_value(3u32),
                ],
                ..KeyFrameData::default()
            }),
        };
        let nm = NetworkMessage {
            payload_header: Some(DataSetPayloadHeader { writer_ids: vec![1] }),
            payload: DataSetPayload { sizes: None, messages: vec![dsm] },
            ..NetworkMessage::default()
        };

        let mut buf = sized_and_encoded(&nm);
        assert_eq!(buf.raw_message_length, 12);
        buf.message = Some(Box::new(nm.clone()));

        // Same structure, new values
        let mut inbound = nm;
        if let DataSetMessageData::KeyFrame(kf) = &mut inbound.payload.messages[0].data {
            kf.fields = vec![
                DataValue::from_value(0x10u32),
                DataValue::from_value(0x20u32),
                DataValue::from_value(0x30u32),
            ];
        }
        let mut wire = vec![0u8; inbound.binary_size(None).unwrap()];
        let _ = inbound.encode_binary(&mut WriteCursor::new(&mut wire)).unwrap();
        let src = Bytes::from(wire);

        let smallest_raw = buf
            .offsets
            .iter()
            .filter(|e| matches!(e.content, OffsetContent::PayloadRaw(_)))
            .map(|e| e.position)
            .min()
            .unwrap();

        let mut position = 0usize;
        buf.update_from_wire(&src, &mut position).unwrap();

        let patched = buf.message.as_ref().unwrap();
        let DataSetMessageData::KeyFrame(kf) = &patched.payload.messages[0].data else {
            panic!("expected key frame");
        };
        let raw = kf.raw_fields.as_ref().unwrap();
        assert_eq!(raw.len(), 12);
        assert_eq!(&raw[..4], &[0x10, 0, 0, 0]);
        // The view aliases the inbound frame rather than copying it
        assert_eq!(*raw, src.slice(smallest_raw..smallest_raw + 12));
        assert_eq!(position, smallest_raw + 12);
    }

    #[test]
    fn string_publisher_id_is_unsupported_in_realtime() {
        let nm = NetworkMessage {
            publisher_id: Some(PublisherId::String(uadp_types::UaString::new("p"))),
            payload: DataSetPayload { sizes: None, messages: vec![DataSetMessage::default()] },
            ..NetworkMessage::default()
        };
        let mut buf = sized_and_encoded(&nm);
        buf.message = Some(Box::new(nm));
        let src = Bytes::from(buf.buffer.clone());
        assert_eq!(
            buf.update_from_wire(&src, &mut 0).unwrap_err(),
            CodecError::NotSupported("string publisher id in realtime decode")
        );
    }

    #[test]
    fn clear_drops_everything() {
        let nm = group_sequence_message(1);
        let mut buf = sized_and_encoded(&nm);
        buf.message = Some(Box::new(nm));
        buf.clear();
        assert!(buf.buffer.is_empty());
        assert!(buf.offsets.is_empty());
        assert!(buf.message.is_none());
        assert_eq!(buf.raw_message_length, 0);
    }
}
