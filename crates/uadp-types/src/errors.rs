//! Error taxonomy shared by the primitive codec and the message codec.
//!
//! Every fallible codec operation returns [`CodecError`]; success is plain
//! `Ok`. The variants map one-to-one onto the status classes the wire
//! protocol distinguishes, so callers can route a failure without string
//! matching.

use thiserror::Error;

/// Codec failure classes.
///
/// `SourceExhausted` and `Malformed` are decoding failures; the source
/// buffer stays untouched and a partially populated destination is safe to
/// drop. `BufferExhausted` and `Encoding` are encoding failures; the
/// encoder never writes past the destination's end.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The source ended before the field could be read.
    #[error("source exhausted: needed {needed} more bytes, {remaining} remaining")]
    SourceExhausted {
        /// Bytes the next read required
        needed: usize,
        /// Bytes left in the source
        remaining: usize,
    },

    /// The source bytes do not form a valid value.
    #[error("malformed {what}")]
    Malformed {
        /// What was being decoded
        what: &'static str,
    },

    /// The destination buffer is too small for the next field.
    #[error("buffer exhausted: needed {needed} more bytes, {remaining} remaining")]
    BufferExhausted {
        /// Bytes the next write required
        needed: usize,
        /// Bytes left in the destination
        remaining: usize,
    },

    /// A required structure is missing or violates a wire limit.
    #[error("cannot encode: {0}")]
    Encoding(&'static str),

    /// The message asks for a feature the codec does not implement.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// The operation is outside the supported realtime envelope.
    #[error("not supported: {0}")]
    NotSupported(&'static str),

    /// A logic invariant was violated.
    #[error("internal invariant violated: {0}")]
    Internal(&'static str),

    /// A security parameter failed validation.
    #[error("security checks failed: {what}")]
    SecurityChecksFailed {
        /// Which check was violated
        what: &'static str,
    },
}

impl CodecError {
    /// True for failures raised while reading a source buffer.
    pub fn is_decoding(&self) -> bool {
        matches!(self, Self::SourceExhausted { .. } | Self::Malformed { .. })
    }

    /// True for failures raised while writing a destination buffer.
    pub fn is_encoding(&self) -> bool {
        matches!(self, Self::BufferExhausted { .. } | Self::Encoding(_))
    }
}

/// Result alias used across the codec crates.
pub type Result<T> = core::result::Result<T, CodecError>;
