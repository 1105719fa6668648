//! Fuzz target for NetworkMessage::decode_binary
//!
//! Feeds arbitrary byte sequences to the full frame decoder to find:
//! - Parser crashes or panics
//! - Integer overflows in size or offset arithmetic
//! - Buffer over-reads behind the flag cascade
//!
//! The decoder should NEVER panic. All invalid inputs must return an
//! error.

#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use uadp_codec::NetworkMessage;

fuzz_target!(|data: &[u8]| {
    let src = Bytes::copy_from_slice(data);
    let mut position = 0usize;
    let _ = NetworkMessage::decode_binary(&src, &mut position);
});
