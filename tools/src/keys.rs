use ed25519_dalek::{Signer, SigningKey};

use aion_precompiled::common::{Addr, Scalar};
use aion_precompiled::core::params::AMOUNT_SIZE;
use aion_precompiled::crypto::{public_key_address, FRAME_LEN, PUBLIC_KEY_LEN};

/// An ed25519 keypair with its derived account address, the unit most
/// wallet tests revolve around.
pub struct TestKey {
    signing: SigningKey,
}

impl TestKey {
    /// A fresh random key.
    pub fn random() -> Self {
        Self {
            signing: SigningKey::from_bytes(&rand::random::<[u8; 32]>()),
        }
    }

    /// A key derived deterministically from a seed, for reproducible
    /// fixtures.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.signing.verifying_key().to_bytes()
    }

    /// The account address owned by this key.
    pub fn address(&self) -> Addr {
        public_key_address(&self.public_key())
    }

    /// Signs `message` into the 96-byte public-key-then-signature frame
    /// that send-transaction inputs carry.
    pub fn sign_frame(&self, message: &[u8]) -> [u8; FRAME_LEN] {
        let signature = self.signing.sign(message);
        let mut frame = [0u8; FRAME_LEN];
        frame[..PUBLIC_KEY_LEN].copy_from_slice(&self.public_key());
        frame[PUBLIC_KEY_LEN..].copy_from_slice(&signature.to_bytes());
        frame
    }
}

/// `count` fresh random keys.
pub fn produce_keys(count: usize) -> Vec<TestKey> {
    (0..count).map(|_| TestKey::random()).collect()
}

/// A well-formed create-wallet input frame:
/// `0x00 ‖ threshold(8 BE) ‖ owners…`.
pub fn construct_create_wallet_input(threshold: u64, owners: &[Addr]) -> Vec<u8> {
    let mut input = Vec::with_capacity(1 + 8 + owners.len() * Addr::LEN);
    input.push(0x0);
    input.extend_from_slice(&threshold.to_be_bytes());
    for owner in owners {
        input.extend_from_slice(owner.as_bytes());
    }
    input
}

/// A well-formed send-transaction input frame:
/// `0x01 ‖ wallet ‖ sig frames ‖ amount(128) ‖ nrg_price(8 BE) ‖ to`.
/// Panics if the amount does not fit its field.
pub fn construct_send_tx_input(
    wallet: &Addr, frames: &[[u8; FRAME_LEN]], amount: &Scalar, nrg_price: u64,
    to: &Addr,
) -> Vec<u8> {
    let mut input = Vec::with_capacity(
        1 + Addr::LEN + frames.len() * FRAME_LEN + AMOUNT_SIZE + 8 + Addr::LEN,
    );
    input.push(0x1);
    input.extend_from_slice(wallet.as_bytes());
    for frame in frames {
        input.extend_from_slice(frame);
    }
    input.extend_from_slice(
        &amount
            .to_unsigned_padded(AMOUNT_SIZE)
            .expect("amount wider than its input field"),
    );
    input.extend_from_slice(&nrg_price.to_be_bytes());
    input.extend_from_slice(to.as_bytes());
    input
}

/// A well-formed TRS deposit input frame: `0x00 ‖ contract ‖ amount(128)`.
/// Panics if the amount does not fit its field.
pub fn construct_deposit_input(contract: &Addr, amount: &Scalar) -> Vec<u8> {
    let mut input = Vec::with_capacity(1 + Addr::LEN + AMOUNT_SIZE);
    input.push(0x0);
    input.extend_from_slice(contract.as_bytes());
    input.extend_from_slice(
        &amount
            .to_unsigned_padded(AMOUNT_SIZE)
            .expect("amount wider than its input field"),
    );
    input
}

/// A well-formed TRS create input frame:
/// `0x00 ‖ flags(1) ‖ periods(2 BE) ‖ precision(1) ‖ percent(9)`.
/// Panics if the percent does not fit its field.
pub fn construct_trs_create_input(
    is_test: bool, is_direct_deposit: bool, periods: u16, precision: u8,
    percent: &Scalar,
) -> Vec<u8> {
    let mut input = Vec::with_capacity(14);
    input.push(0x0);
    input.push((is_test as u8) | ((is_direct_deposit as u8) << 1));
    input.extend_from_slice(&periods.to_be_bytes());
    input.push(precision);
    input.extend_from_slice(
        &percent
            .to_unsigned_padded(9)
            .expect("percent wider than its input field"),
    );
    input
}

/// A `0x01/0x02 ‖ contract` lifecycle frame for the TRS state handler.
pub fn construct_trs_lifecycle_input(op: u8, contract: &Addr) -> Vec<u8> {
    let mut input = Vec::with_capacity(1 + Addr::LEN);
    input.push(op);
    input.extend_from_slice(contract.as_bytes());
    input
}
