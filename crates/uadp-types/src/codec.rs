//! The binary codec trait and its scalar implementations.
//!
//! All multi-byte scalars are little-endian two's-complement (floats are
//! IEEE 754 little-endian). Booleans occupy one byte; any nonzero value
//! decodes as `true`.

use crate::{
    cursor::{ReadCursor, WriteCursor},
    errors::Result,
};

/// Size, encode and decode for one wire type.
///
/// The invariant tying the three together: `encode` advances the write
/// cursor by exactly `byte_size()` bytes, or fails without the caller
/// observing a partial field as success. The realtime patching path
/// depends on this — a byte miscount corrupts a retained frame.
pub trait BinaryCodec: Sized {
    /// Encoded size in bytes.
    fn byte_size(&self) -> usize;

    /// Write the value at the cursor.
    fn encode(&self, cur: &mut WriteCursor<'_>) -> Result<()>;

    /// Read a value at the cursor.
    fn decode(cur: &mut ReadCursor<'_>) -> Result<Self>;
}

macro_rules! int_codec {
    ($($t:ty),*) => {
        $(
            impl BinaryCodec for $t {
                fn byte_size(&self) -> usize {
                    core::mem::size_of::<$t>()
                }

                fn encode(&self, cur: &mut WriteCursor<'_>) -> Result<()> {
                    cur.write_bytes(&self.to_le_bytes())
                }

                fn decode(cur: &mut ReadCursor<'_>) -> Result<Self> {
                    Ok(<$t>::from_le_bytes(cur.read_array()?))
                }
            }
        )*
    };
}

int_codec!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl BinaryCodec for bool {
    fn byte_size(&self) -> usize {
        1
    }

    fn encode(&self, cur: &mut WriteCursor<'_>) -> Result<()> {
        cur.write_u8(u8::from(*self))
    }

    fn decode(cur: &mut ReadCursor<'_>) -> Result<Self> {
        Ok(cur.read_u8()? != 0)
    }
}
