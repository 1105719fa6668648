//! NetworkMessage object model.
//!
//! The wire format gates every block behind flag bits, so the model
//! expresses "enabled" as `Option`: a present field is an enabled field.
//! The flag-cascade predicates live here as the single source of truth
//! shared by the size calculator, the encoder and the decoder.

use bytes::Bytes;
use uadp_types::{BinaryCodec, DateTime, Guid, UaString, Variant};

use crate::dataset::DataSetMessage;

/// Maximum length of the security header's message nonce in bytes.
pub const MAX_NONCE_LENGTH: usize = 16;

/// UADP protocol version carried in the low nibble of the first byte.
pub const UADP_VERSION: u8 = 1;

/// Network message flavor carried in the second extended flag byte.
///
/// Only [`NetworkMessageType::DataSet`] is implemented end-to-end; the
/// payload codec rejects the others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum NetworkMessageType {
    /// Dataset payload
    #[default]
    DataSet = 0,
    /// Event payload
    Event = 1,
    /// Discovery probe
    DiscoveryRequest = 2,
    /// Discovery answer
    DiscoveryResponse = 3,
}

impl NetworkMessageType {
    pub(crate) fn from_bits(bits: u8) -> Option<Self> {
        Some(match bits {
            0 => Self::DataSet,
            1 => Self::Event,
            2 => Self::DiscoveryRequest,
            3 => Self::DiscoveryResponse,
            _ => return None,
        })
    }
}

/// Wire representation of the publisher id, carried in the first
/// extended flag byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum PublisherIdType {
    #[default]
    Byte = 0,
    UInt16 = 1,
    UInt32 = 2,
    UInt64 = 3,
    String = 4,
}

impl PublisherIdType {
    pub(crate) fn from_bits(bits: u8) -> Option<Self> {
        Some(match bits {
            0 => Self::Byte,
            1 => Self::UInt16,
            2 => Self::UInt32,
            3 => Self::UInt64,
            4 => Self::String,
            _ => return None,
        })
    }
}

/// Publisher identifier; the variant fixes the wire representation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum PublisherId {
    Byte(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    String(UaString),
}

impl PublisherId {
    /// The wire representation of this id.
    #[must_use]
    pub fn id_type(&self) -> PublisherIdType {
        match self {
            Self::Byte(_) => PublisherIdType::Byte,
            Self::UInt16(_) => PublisherIdType::UInt16,
            Self::UInt32(_) => PublisherIdType::UInt32,
            Self::UInt64(_) => PublisherIdType::UInt64,
            Self::String(_) => PublisherIdType::String,
        }
    }

    /// Encoded size in bytes.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Byte(v) => v.byte_size(),
            Self::UInt16(v) => v.byte_size(),
            Self::UInt32(v) => v.byte_size(),
            Self::UInt64(v) => v.byte_size(),
            Self::String(v) => v.byte_size(),
        }
    }
}

/// Group-level header; every field is independently enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupHeader {
    /// Id of the writer group that produced the message
    pub writer_group_id: Option<u16>,
    /// Configuration version of the group
    pub group_version: Option<u32>,
    /// Position of this message within the group's publish cycle
    pub network_message_number: Option<u16>,
    /// Monotonic sequence number of the group
    pub sequence_number: Option<u16>,
}

impl GroupHeader {
    /// True when no field is enabled (the flag byte still encodes).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writer_group_id.is_none()
            && self.group_version.is_none()
            && self.network_message_number.is_none()
            && self.sequence_number.is_none()
    }
}

/// Dataset payload header: the writer ids announcing the payload shape.
///
/// The message count on the wire is `writer_ids.len()` and must fit a
/// byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSetPayloadHeader {
    /// One id per dataset message, in payload order
    pub writer_ids: Vec<u16>,
}

/// PubSub security header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityHeader {
    /// The message carries a signature
    pub network_message_signed: bool,
    /// Payload and footer are encrypted
    pub network_message_encrypted: bool,
    /// A security footer follows the payload
    pub security_footer_enabled: bool,
    /// Receivers must reset their key state
    pub force_key_reset: bool,
    /// Which token of the security group keyed this message
    pub security_token_id: u32,
    /// Per-message nonce, at most [`MAX_NONCE_LENGTH`] bytes
    pub message_nonce: Vec<u8>,
    /// Declared footer size in bytes
    pub security_footer_size: u16,
}

/// Dataset payload: optional per-message sizes plus the messages.
///
/// The sizes array exists on the wire only for multi-message payloads;
/// a `None` or zero entry makes the encoder compute the size itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSetPayload {
    /// Declared encoded size of each message
    pub sizes: Option<Vec<u16>>,
    /// The dataset messages
    pub messages: Vec<DataSetMessage>,
}

/// A UADP network message.
///
/// The zero value ([`NetworkMessage::default`]) is a version-0 dataset
/// message with every optional block disabled; decoding starts from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkMessage {
    /// Protocol version, low nibble of the first byte
    pub version: u8,
    /// Message flavor; only datasets are implemented end-to-end
    pub message_type: NetworkMessageType,
    /// Message id (used by non-binary encodings of the same model)
    pub message_id: Option<UaString>,
    /// The message is one chunk of a larger message
    pub chunk_message: bool,
    /// Publisher identifier
    pub publisher_id: Option<PublisherId>,
    /// Identifies the dataset class the payload conforms to
    pub dataset_class_id: Option<Guid>,
    /// Group-level header
    pub group_header: Option<GroupHeader>,
    /// Payload header announcing writer ids
    pub payload_header: Option<DataSetPayloadHeader>,
    /// Network-level timestamp
    pub timestamp: Option<DateTime>,
    /// Sub-10µs part of the timestamp
    pub picoseconds: Option<u16>,
    /// Fields surfaced for routing without decoding the payload
    pub promoted_fields: Option<Vec<Variant>>,
    /// Security header; presence enables the security block
    pub security: Option<SecurityHeader>,
    /// Security footer bytes carried after the payload
    pub security_footer: Option<Bytes>,
    /// The dataset payload
    pub payload: DataSetPayload,
}

impl NetworkMessage {
    /// The publisher id representation for the flag cascade; `Byte`
    /// when no publisher id is present.
    #[must_use]
    pub fn publisher_id_type(&self) -> PublisherIdType {
        self.publisher_id.as_ref().map_or(PublisherIdType::Byte, PublisherId::id_type)
    }

    /// First extended flag byte is on the wire iff the publisher id is
    /// not byte-typed, any of the blocks it gates is enabled, or the
    /// second extended flag byte is required.
    #[must_use]
    pub fn extended_flags1_enabled(&self) -> bool {
        self.publisher_id_type() != PublisherIdType::Byte
            || self.dataset_class_id.is_some()
            || self.security.is_some()
            || self.timestamp.is_some()
            || self.picoseconds.is_some()
            || self.extended_flags2_enabled()
    }

    /// Second extended flag byte is on the wire iff chunking or
    /// promoted fields are enabled or the message is not a dataset.
    #[must_use]
    pub fn extended_flags2_enabled(&self) -> bool {
        self.chunk_message
            || self.promoted_fields.is_some()
            || self.message_type != NetworkMessageType::DataSet
    }

    /// Number of dataset messages announced by the payload header, 1
    /// without one.
    #[must_use]
    pub fn payload_count(&self) -> usize {
        self.payload_header.as_ref().map_or(1, |h| h.writer_ids.len())
    }

    /// Reset to the zero state, dropping all owned data.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
