//! Signature and hashing primitives shared by the precompiled cores.
//!
//! Signatures ride in a fixed 96-byte frame: the signer's 32-byte ed25519
//! public key followed by the 64-byte signature. Account addresses are
//! derived from public keys through the same 32-byte hash used for contract
//! address derivation, with the account prefix forced into byte 0.

use blake2::digest::{Update, VariableOutput};
use blake2::Blake2bVar;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::common::Addr;
use crate::core::params::ACCOUNT_PREFIX;

pub const PUBLIC_KEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;
pub const FRAME_LEN: usize = PUBLIC_KEY_LEN + SIGNATURE_LEN;

/// 32-byte blake2b digest.
pub fn hash32(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2bVar::new(32).unwrap();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize_variable(&mut out).unwrap();
    out
}

/// Derives the account address owned by an ed25519 public key: the hash of
/// the key with the account prefix in byte 0.
pub fn public_key_address(public_key: &[u8; PUBLIC_KEY_LEN]) -> Addr {
    let mut bytes = hash32(public_key);
    bytes[0] = ACCOUNT_PREFIX;
    Addr::from(bytes)
}

/// A public key / signature pair as it appears in input frames.
#[derive(Clone, Copy)]
pub struct SignatureFrame {
    public_key: [u8; PUBLIC_KEY_LEN],
    signature: [u8; SIGNATURE_LEN],
}

impl SignatureFrame {
    /// Splits a 96-byte frame. `None` for any other length.
    pub fn from_slice(raw: &[u8]) -> Option<Self> {
        if raw.len() != FRAME_LEN {
            return None
        }
        let mut public_key = [0u8; PUBLIC_KEY_LEN];
        let mut signature = [0u8; SIGNATURE_LEN];
        public_key.copy_from_slice(&raw[..PUBLIC_KEY_LEN]);
        signature.copy_from_slice(&raw[PUBLIC_KEY_LEN..]);
        Some(Self {
            public_key,
            signature,
        })
    }

    /// Verifies the embedded signature over `message`. A public key that
    /// does not decode to a curve point counts as a failed verification,
    /// not an error.
    pub fn verify(&self, message: &[u8]) -> bool {
        let key = match VerifyingKey::from_bytes(&self.public_key) {
            Ok(key) => key,
            Err(_) => return false,
        };
        let signature = Signature::from_bytes(&self.signature);
        key.verify(message, &signature).is_ok()
    }

    /// The address owned by the embedded public key.
    pub fn address(&self) -> Addr {
        public_key_address(&self.public_key)
    }
}
