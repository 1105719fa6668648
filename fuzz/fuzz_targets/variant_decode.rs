//! Fuzz target for the primitive Variant and DataValue decoders.

#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use uadp_types::{BinaryCodec, DataValue, ReadCursor, Variant};

fuzz_target!(|data: &[u8]| {
    let src = Bytes::copy_from_slice(data);
    let _ = Variant::decode(&mut ReadCursor::new(&src));
    let _ = DataValue::decode(&mut ReadCursor::new(&src));
});
