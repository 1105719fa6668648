//! OPC UA PubSub UADP NetworkMessage codec.
//!
//! The codec translates between the [`message::NetworkMessage`] object
//! model and the flag-driven UADP byte stream, and maintains the offset
//! buffer that maps semantic fields to byte positions in a retained
//! frame. That mapping is what makes realtime publishing cheap: the
//! publisher sizes and encodes once, then refreshes only sequence
//! numbers and payload values in place each cycle, and a realtime
//! subscriber decodes only the recorded positions of an inbound frame
//! into a pre-shaped message.
//!
//! # Invariants
//!
//! - The size calculator, the encoder and the decoder share the same
//!   flag-cascade predicates; the byte count
//!   [`message::NetworkMessage::binary_size`] reports is exactly what
//!   [`message::NetworkMessage::encode_binary`] writes.
//! - Every offset entry names the bytes of exactly the field it was
//!   recorded for, in encode order.
//! - Decoders never read past the source; encoders never write past
//!   the destination. Malformed frames fail without panicking, and a
//!   partially populated message is safe to drop or clear.
//!
//! The `encryption` feature adds the [`security`] module: the
//! [`security::MessageSecurityPolicy`] seam and the split-anchor
//! [`security::sign_encrypt`] driver a policy implementation plugs
//! into.

pub mod dataset;
pub mod message;
mod network;
pub mod offsets;
#[cfg(feature = "encryption")]
pub mod security;

pub use dataset::{
    DataSetMessage, DataSetMessageData, DataSetMessageHeader, DataSetMessageType, DataSetMetaData,
    DeltaFrameData, DeltaFrameField, FieldEncoding, FieldMetaData, KeyFrameData,
};
pub use message::{
    DataSetPayload, DataSetPayloadHeader, GroupHeader, MAX_NONCE_LENGTH, NetworkMessage,
    NetworkMessageType, PublisherId, PublisherIdType, SecurityHeader, UADP_VERSION,
};
pub use offsets::{NetworkMessageOffset, NetworkMessageOffsetBuffer, OffsetContent};
#[cfg(feature = "encryption")]
pub use security::{MessageSecurityMode, MessageSecurityPolicy, sign_encrypt};
pub use uadp_types::{CodecError, Result};
