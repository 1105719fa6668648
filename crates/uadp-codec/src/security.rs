//! Sign/encrypt integration for published frames.
//!
//! The codec lays out the frame and hands a security policy three
//! anchors into it: the message start, the encrypt start recorded by
//! [`crate::message::NetworkMessage`]'s split encode, and the signature
//! start at the end of the written bytes. Encryption mutates the
//! payload-and-footer region in place, so a policy must be
//! length-preserving; the signature is then written over everything up
//! to the signature region.

use uadp_types::{CodecError, Result};

use crate::message::NetworkMessage;

/// How a published frame is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSecurityMode {
    /// No protection; `sign_encrypt` is a no-op
    None,
    /// Signature only
    Sign,
    /// In-place payload encryption plus signature
    SignAndEncrypt,
}

/// The security collaborator the codec drives.
///
/// Implementations hold their keys and per-message state; the codec
/// only feeds them the nonce from the security header and the frame
/// regions. `encrypt_in_place` must preserve the region length —
/// realtime patching relies on the frame layout staying fixed.
pub trait MessageSecurityPolicy {
    /// Install the per-message nonce from the security header.
    fn set_message_nonce(&mut self, nonce: &[u8]) -> Result<()>;

    /// Size of the signature this policy writes.
    fn signature_size(&self) -> usize;

    /// Encrypt the region in place without changing its length.
    fn encrypt_in_place(&mut self, data: &mut [u8]) -> Result<()>;

    /// Sign `data` into `signature` (exactly `signature_size` bytes).
    fn sign(&mut self, data: &[u8], signature: &mut [u8]) -> Result<()>;
}

/// Protect an encoded frame in place.
///
/// `frame` starts at the message start; `encrypt_start` is the position
/// returned by the split encode, `sig_start` the end of the encoded
/// bytes. For [`MessageSecurityMode::SignAndEncrypt`] the region
/// `[encrypt_start, sig_start)` is encrypted first; for both signing
/// modes the signature over `[0, sig_start)` is then written at
/// `sig_start`, which must leave room for
/// [`MessageSecurityPolicy::signature_size`] bytes.
pub fn sign_encrypt(
    nm: &NetworkMessage,
    mode: MessageSecurityMode,
    policy: &mut dyn MessageSecurityPolicy,
    frame: &mut [u8],
    encrypt_start: usize,
    sig_start: usize,
) -> Result<()> {
    if mode == MessageSecurityMode::None {
        return Ok(());
    }
    if encrypt_start > sig_start || sig_start > frame.len() {
        return Err(CodecError::Internal("sign/encrypt anchors out of order"));
    }

    if mode == MessageSecurityMode::SignAndEncrypt {
        let security = nm
            .security
            .as_ref()
            .ok_or(CodecError::Internal("sign_encrypt without a security header"))?;
        policy.set_message_nonce(&security.message_nonce)?;
        policy.encrypt_in_place(&mut frame[encrypt_start..sig_start])?;
    }

    let signature_size = policy.signature_size();
    let (signed, trailer) = frame.split_at_mut(sig_start);
    let trailer_len = trailer.len();
    let signature = trailer.get_mut(..signature_size).ok_or(CodecError::BufferExhausted {
        needed: signature_size,
        remaining: trailer_len,
    })?;
    policy.sign(signed, signature)
}
