//! Fuzz target for DataSetMessage::decode_binary
//!
//! Exercises the dataset decoder with arbitrary bytes and an arbitrary
//! declared message size, covering the raw-payload size fallback and
//! the heartbeat detection paths.

#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use uadp_codec::DataSetMessage;
use uadp_types::ReadCursor;

fuzz_target!(|input: (u16, &[u8])| {
    let (dsm_size, data) = input;
    let src = Bytes::copy_from_slice(data);
    let mut cur = ReadCursor::new(&src);
    let _ = DataSetMessage::decode_binary(&mut cur, usize::from(dsm_size));
});
