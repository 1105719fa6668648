//! Reference sign/encrypt policy for UADP PubSub frames.
//!
//! Implements the codec's [`MessageSecurityPolicy`] seam with
//! AES-128-CTR payload encryption and HMAC-SHA256 signatures. CTR mode
//! is a keystream cipher, so encryption preserves the region length —
//! the property the in-place realtime patching path requires — and
//! decryption is the same keystream application.
//!
//! The per-message counter block is derived from the security header's
//! message nonce; publisher and subscriber exchange it in the clear and
//! each derive the same keystream. Key material is caller-provided and
//! zeroized on drop.

use aes::Aes128;
use ctr::{
    Ctr128BE,
    cipher::{KeyIvInit, StreamCipher},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uadp_codec::{CodecError, MessageSecurityPolicy, Result};
use zeroize::Zeroize;

type Aes128Ctr = Ctr128BE<Aes128>;
type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 signature width in bytes.
pub const SIGNATURE_SIZE: usize = 32;

/// Maximum nonce the counter block can absorb.
const MAX_NONCE: usize = 16;

/// AES-128-CTR + HMAC-SHA256 security policy.
///
/// One instance holds the symmetric keys of a security token. The
/// codec installs the per-message nonce before each encrypt; the
/// counter block is the nonce left-aligned in a zeroed 16-byte block.
pub struct AesCtrHmacPolicy {
    encryption_key: [u8; 16],
    signing_key: [u8; 32],
    counter_block: Option<[u8; 16]>,
}

impl AesCtrHmacPolicy {
    /// Build a policy from the token's symmetric keys.
    #[must_use]
    pub fn new(encryption_key: [u8; 16], signing_key: [u8; 32]) -> Self {
        Self { encryption_key, signing_key, counter_block: None }
    }

    fn keystream(&self) -> Result<Aes128Ctr> {
        let iv = self
            .counter_block
            .ok_or(CodecError::SecurityChecksFailed { what: "message nonce not set" })?;
        Ok(Aes128Ctr::new(&self.encryption_key.into(), &iv.into()))
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|_| CodecError::Internal("signing key rejected"))
    }

    /// Subscriber-side decryption; CTR is its own inverse.
    pub fn decrypt_in_place(&mut self, data: &mut [u8]) -> Result<()> {
        let mut cipher = self.keystream()?;
        cipher.apply_keystream(data);
        Ok(())
    }

    /// Check a received signature over `data`.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        let mut mac = self.mac()?;
        mac.update(data);
        mac.verify_slice(signature)
            .map_err(|_| CodecError::SecurityChecksFailed { what: "signature mismatch" })
    }
}

impl MessageSecurityPolicy for AesCtrHmacPolicy {
    fn set_message_nonce(&mut self, nonce: &[u8]) -> Result<()> {
        if nonce.len() > MAX_NONCE {
            return Err(CodecError::SecurityChecksFailed { what: "message nonce exceeds 16 bytes" });
        }
        let mut block = [0u8; 16];
        block[..nonce.len()].copy_from_slice(nonce);
        self.counter_block = Some(block);
        Ok(())
    }

    fn signature_size(&self) -> usize {
        SIGNATURE_SIZE
    }

    fn encrypt_in_place(&mut self, data: &mut [u8]) -> Result<()> {
        let mut cipher = self.keystream()?;
        cipher.apply_keystream(data);
        Ok(())
    }

    fn sign(&mut self, data: &[u8], signature: &mut [u8]) -> Result<()> {
        if signature.len() != SIGNATURE_SIZE {
            return Err(CodecError::Internal("signature region has the wrong size"));
        }
        let mut mac = self.mac()?;
        mac.update(data);
        signature.copy_from_slice(&mac.finalize().into_bytes());
        Ok(())
    }
}

impl Drop for AesCtrHmacPolicy {
    fn drop(&mut self) {
        self.encryption_key.zeroize();
        self.signing_key.zeroize();
        if let Some(block) = &mut self.counter_block {
            block.zeroize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> AesCtrHmacPolicy {
        AesCtrHmacPolicy::new([0x11; 16], [0x22; 32])
    }

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let mut p = policy();
        p.set_message_nonce(&[1, 2, 3, 4]).unwrap();

        let plaintext = b"uadp payload bytes".to_vec();
        let mut data = plaintext.clone();
        p.encrypt_in_place(&mut data).unwrap();
        assert_ne!(data, plaintext);

        p.decrypt_in_place(&mut data).unwrap();
        assert_eq!(data, plaintext);
    }

    #[test]
    fn different_nonces_give_different_keystreams() {
        let mut p = policy();
        let mut a = vec![0u8; 16];
        let mut b = vec![0u8; 16];
        p.set_message_nonce(&[1]).unwrap();
        p.encrypt_in_place(&mut a).unwrap();
        p.set_message_nonce(&[2]).unwrap();
        p.encrypt_in_place(&mut b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn encrypt_without_nonce_fails() {
        let mut p = policy();
        let mut data = vec![0u8; 4];
        assert!(matches!(
            p.encrypt_in_place(&mut data),
            Err(CodecError::SecurityChecksFailed { .. })
        ));
    }

    #[test]
    fn oversized_nonce_is_rejected() {
        let mut p = policy();
        assert!(matches!(
            p.set_message_nonce(&[0u8; 17]),
            Err(CodecError::SecurityChecksFailed { .. })
        ));
    }

    #[test]
    fn sign_and_verify() {
        let mut p = policy();
        let mut signature = [0u8; SIGNATURE_SIZE];
        p.sign(b"frame bytes", &mut signature).unwrap();
        p.verify(b"frame bytes", &signature).unwrap();
        assert!(p.verify(b"tampered bytes", &signature).is_err());
    }

    #[test]
    fn wrong_key_fails_verification() {
        let mut p = policy();
        let mut signature = [0u8; SIGNATURE_SIZE];
        p.sign(b"frame bytes", &mut signature).unwrap();

        let other = AesCtrHmacPolicy::new([0x11; 16], [0x33; 32]);
        assert!(other.verify(b"frame bytes", &signature).is_err());
    }
}
