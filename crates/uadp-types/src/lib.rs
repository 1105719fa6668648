//! OPC UA built-in types and their little-endian binary codec.
//!
//! This crate is the primitive layer under the PubSub message codec: the
//! built-in value types (strings, GUIDs, timestamps, variants, data
//! values), the [`BinaryCodec`] trait tying size, encode and decode
//! together, and the bounded [`WriteCursor`] / [`ReadCursor`] pair every
//! encoder and decoder runs on.
//!
//! # Invariants
//!
//! - `encode` advances the cursor by exactly `byte_size()` bytes.
//! - Encoders never write past the destination slice; decoders never
//!   read past the source length. Exhaustion is an error, not a panic.
//! - Decoded byte strings and raw views borrow the source
//!   ([`bytes::Bytes`]) instead of copying.

pub mod basic;
pub mod codec;
pub mod cursor;
pub mod errors;
pub mod variant;

pub use basic::{ByteString, DateTime, Guid, LocalizedText, UaString};
pub use codec::BinaryCodec;
pub use cursor::{ReadCursor, WriteCursor};
pub use errors::{CodecError, Result};
pub use variant::{DataValue, ScalarKind, ScalarValue, Variant};
