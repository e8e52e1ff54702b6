//! The multi-signature wallet engine.
//!
//! A wallet is an ordinary account whose 32-byte address is derived
//! deterministically from its creation inputs. Its owner table and
//! threshold live in single-word storage rows under the wallet address;
//! balance and nonce live in the standard account slots. The engine itself
//! is stateless — it parses a tagged input frame, validates, and either
//! rejects without touching the store or flushes the whole effect at once.

use std::collections::hash_set::HashSet;

use log::debug;

use crate::common::{Addr, Bytes, Nrg, Scalar};
use crate::crypto::{hash32, SignatureFrame};
use crate::state::{
    DataWord, StoreCache, Transferable, WordStore, WordStoreR, WordStoreW,
    SINGLE_WORD_SIZE,
};

use super::params::{
    ACCOUNT_PREFIX, AMOUNT_SIZE, COST, MAX_OWNERS, MIN_OWNERS, MIN_THRESH,
    SIG_SIZE, TRS_PREFIX,
};
use super::{check_nrg_limit, PrecompiledContract, PrecompiledResult, ResultCode};

const OP_CREATE_WALLET: u8 = 0x0;
const OP_SEND_TX: u8 = 0x1;

/// High byte of the owner-table key holding the upper half of an owner
/// address; the lower half sits under the bare index.
const OWNER_HIGH_FLAG: u8 = 0x40;
/// High byte of the wallet meta key (threshold ‖ owner count).
const META_FLAG: u8 = 0x80;

/// Fixed part of a send frame: tag, wallet, amount, energy price and
/// recipient — everything except the signatures.
const SEND_FIXED_LEN: usize = 1 + Addr::LEN + AMOUNT_SIZE + 8 + Addr::LEN;

/// The multi-signature wallet precompiled. One instance per invocation,
/// holding the write cursor and the caller identity.
pub struct MultiSigContract<'a, S: WordStore> {
    track: StoreCache<'a, S>,
    caller: Addr,
}

impl<'a, S: WordStore> MultiSigContract<'a, S> {
    pub fn new(store: &'a mut S, caller: Addr) -> Self {
        Self {
            track: StoreCache::new(store),
            caller,
        }
    }

    /// Derives the wallet address for a create payload (`threshold(8 BE) ‖
    /// owners`): its hash, carrying the account prefix. Identical inputs
    /// always derive the same address.
    fn derive_wallet_address(payload: &[u8]) -> Addr {
        let mut bytes = hash32(payload);
        bytes[0] = ACCOUNT_PREFIX;
        Addr::from(bytes)
    }

    /// Whether `account` is a multi-signature wallet, witnessed by its meta
    /// storage row.
    fn is_multi_sig_wallet(&self, account: &Addr) -> bool {
        self.track
            .get_storage_value(account, &meta_key())
            .is_some()
    }

    /// The threshold and owner count of a wallet, or `None` if the address
    /// carries no meta row.
    fn wallet_meta(&self, wallet: &Addr) -> Option<(u64, u64)> {
        let meta = self.track.get_storage_value(wallet, &meta_key())?;
        let bytes = meta.bytes();
        let mut threshold = [0u8; 8];
        let mut count = [0u8; 8];
        threshold.copy_from_slice(&bytes[..8]);
        count.copy_from_slice(&bytes[8..]);
        Some((u64::from_be_bytes(threshold), u64::from_be_bytes(count)))
    }

    /// The owner table of a wallet. Missing halves mean the meta row lied
    /// about the count, which is an invariant breach.
    fn wallet_owners(&self, wallet: &Addr, count: u64) -> Vec<Addr> {
        let mut owners = Vec::with_capacity(count as usize);
        for i in 0..count {
            let mut account = [0u8; Addr::LEN];
            for (high, half) in [(false, 0), (true, SINGLE_WORD_SIZE)] {
                let word = match self
                    .track
                    .get_storage_value(wallet, &owner_half_key(i, high))
                {
                    Some(word) => word,
                    None => panic!("wallet {} has no owner row {}", wallet, i),
                };
                account[half..half + SINGLE_WORD_SIZE]
                    .copy_from_slice(word.bytes());
            }
            owners.push(Addr::from(account));
        }
        owners
    }

    /// Create payload, after the operation tag:
    /// `threshold(8 BE) ‖ owner_1(32) ‖ … ‖ owner_n(32)`.
    fn create_wallet(&mut self, input: &[u8], nrg_limit: Nrg) -> PrecompiledResult {
        let len = input.len();
        if len < 1 + 8 + Addr::LEN * MIN_OWNERS ||
            len > 1 + 8 + Addr::LEN * MAX_OWNERS ||
            (len - 9) % Addr::LEN != 0
        {
            return PrecompiledResult::failure()
        }

        let mut threshold_bytes = [0u8; 8];
        threshold_bytes.copy_from_slice(&input[1..9]);
        let threshold = i64::from_be_bytes(threshold_bytes);
        let owner_count = (len - 9) / Addr::LEN;
        if threshold < MIN_THRESH || threshold > owner_count as i64 {
            debug!("create wallet: threshold {} out of range", threshold);
            return PrecompiledResult::failure()
        }

        let mut owners = Vec::with_capacity(owner_count);
        let mut seen = HashSet::new();
        let mut caller_is_owner = false;
        for chunk in input[9..].chunks_exact(Addr::LEN) {
            let owner = Addr::from_slice(chunk);
            if !seen.insert(owner) {
                return PrecompiledResult::failure() // duplicate owner
            }
            if owner.prefix() == TRS_PREFIX || self.is_multi_sig_wallet(&owner) {
                return PrecompiledResult::failure()
            }
            if owner == self.caller {
                caller_is_owner = true;
            }
            owners.push(owner);
        }
        if !caller_is_owner || self.is_multi_sig_wallet(&self.caller) {
            return PrecompiledResult::failure()
        }

        let wallet = Self::derive_wallet_address(&input[1..]);
        if self.is_multi_sig_wallet(&wallet) {
            // identical creation inputs were already used
            return PrecompiledResult::failure()
        }

        for (i, owner) in owners.iter().enumerate() {
            let owner = owner.as_bytes();
            for (high, half) in [(false, 0), (true, SINGLE_WORD_SIZE)] {
                let mut value = [0u8; SINGLE_WORD_SIZE];
                value.copy_from_slice(&owner[half..half + SINGLE_WORD_SIZE]);
                self.track.add_storage_row(
                    &wallet,
                    owner_half_key(i as u64, high),
                    DataWord::Single(value),
                );
            }
        }
        let mut meta = [0u8; SINGLE_WORD_SIZE];
        meta[..8].copy_from_slice(&(threshold as u64).to_be_bytes());
        meta[8..].copy_from_slice(&(owner_count as u64).to_be_bytes());
        self.track
            .add_storage_row(&wallet, meta_key(), DataWord::Single(meta));
        self.track.create_account(&wallet);
        self.track.flush();

        PrecompiledResult::with_return(
            ResultCode::Success,
            nrg_limit - COST,
            Bytes::from(wallet.as_bytes()),
        )
    }

    /// Send payload, after the operation tag:
    /// `wallet(32) ‖ sig_1(96) ‖ … ‖ sig_k(96) ‖ amount(128) ‖
    /// nrg_price(8 BE) ‖ to(32)`.
    fn send_transaction(&mut self, input: &[u8], nrg_limit: Nrg) -> PrecompiledResult {
        let len = input.len();
        if len < SEND_FIXED_LEN + SIG_SIZE || (len - SEND_FIXED_LEN) % SIG_SIZE != 0 {
            return PrecompiledResult::failure()
        }
        let sig_count = (len - SEND_FIXED_LEN) / SIG_SIZE;
        if sig_count > MAX_OWNERS {
            return PrecompiledResult::failure()
        }

        let wallet = Addr::from_slice(&input[1..1 + Addr::LEN]);
        let sigs_end = 1 + Addr::LEN + sig_count * SIG_SIZE;
        let amount =
            Scalar::from_unsigned_be(&input[sigs_end..sigs_end + AMOUNT_SIZE]);
        let mut nrg_price_bytes = [0u8; 8];
        nrg_price_bytes
            .copy_from_slice(&input[sigs_end + AMOUNT_SIZE..sigs_end + AMOUNT_SIZE + 8]);
        let nrg_price = u64::from_be_bytes(nrg_price_bytes);
        let to = Addr::from_slice(&input[len - Addr::LEN..]);

        if wallet.prefix() != ACCOUNT_PREFIX {
            return PrecompiledResult::failure()
        }
        let (threshold, owner_count) = match self.wallet_meta(&wallet) {
            Some(meta) => meta,
            None => {
                debug!("send: {} is not a multi-sig wallet", wallet);
                return PrecompiledResult::failure()
            }
        };
        let owners: HashSet<Addr> =
            self.wallet_owners(&wallet, owner_count).into_iter().collect();
        if !owners.contains(&self.caller) {
            return PrecompiledResult::failure()
        }
        if (sig_count as u64) < threshold || sig_count as u64 > owner_count {
            return PrecompiledResult::failure()
        }

        // Every signature must cover the same canonical message, signed by
        // a distinct owner.
        let nonce = self.track.get_nonce(&wallet);
        let msg = construct_msg(nonce, &to, &amount, nrg_limit, nrg_price);
        let mut signers = HashSet::new();
        for raw in input[1 + Addr::LEN..sigs_end].chunks_exact(SIG_SIZE) {
            let frame = match SignatureFrame::from_slice(raw) {
                Some(frame) => frame,
                None => return PrecompiledResult::failure(),
            };
            if !frame.verify(&msg) {
                return PrecompiledResult::failure()
            }
            let signer = frame.address();
            if !owners.contains(&signer) || !signers.insert(signer) {
                return PrecompiledResult::failure()
            }
        }

        if self.track.get_balance(&wallet) < amount {
            return PrecompiledResult::new(ResultCode::InsufficientBalance, 0)
        }

        self.track
            .transfer_balance(&wallet, &to, &amount)
            .expect("wallet balance was checked above");
        self.track.set_nonce(&wallet, nonce + 1);
        self.track.flush();

        PrecompiledResult::new(ResultCode::Success, nrg_limit - COST)
    }
}

impl<'a, S: WordStore> PrecompiledContract for MultiSigContract<'a, S> {
    /// Input frame: `op(1) ‖ arguments`. Operation 0x0 creates a wallet,
    /// 0x1 sends a transaction from one; any other tag is rejected.
    fn execute(&mut self, input: &[u8], nrg_limit: Nrg) -> PrecompiledResult {
        if let Err(res) = check_nrg_limit(nrg_limit) {
            return res
        }
        if input.is_empty() {
            return PrecompiledResult::failure()
        }

        match input[0] {
            OP_CREATE_WALLET => self.create_wallet(input, nrg_limit),
            OP_SEND_TX => self.send_transaction(input, nrg_limit),
            op => {
                debug!("unsupported wallet operation: {:#x}", op);
                PrecompiledResult::failure()
            }
        }
    }
}

/// The canonical byte string all signers of a send must have signed:
/// `nonce ‖ to ‖ amount ‖ nrg_limit(8 BE) ‖ nrg_price(8 BE)`, with the
/// nonce and amount in minimal two's-complement form.
pub fn construct_msg(
    nonce: u64, to: &Addr, amount: &Scalar, nrg_limit: Nrg, nrg_price: u64,
) -> Vec<u8> {
    let nonce_bytes = Scalar::from(nonce).signed_be_bytes();
    let amount_bytes = amount.signed_be_bytes();
    let mut msg = Vec::with_capacity(
        nonce_bytes.len() + Addr::LEN + amount_bytes.len() + 16,
    );
    msg.extend_from_slice(&nonce_bytes);
    msg.extend_from_slice(to.as_bytes());
    msg.extend_from_slice(&amount_bytes);
    msg.extend_from_slice(&nrg_limit.to_be_bytes());
    msg.extend_from_slice(&nrg_price.to_be_bytes());
    msg
}

/// Key of the wallet meta row: the meta flag in the high byte of an
/// otherwise zero single word.
fn meta_key() -> DataWord {
    let mut key = [0u8; SINGLE_WORD_SIZE];
    key[0] = META_FLAG;
    DataWord::Single(key)
}

/// Key of one half of owner `i`: the index big-endian in the low eight
/// bytes, with the high-half flag in the top byte for bytes 16..31 of the
/// owner address.
fn owner_half_key(i: u64, high: bool) -> DataWord {
    let mut key = [0u8; SINGLE_WORD_SIZE];
    key[8..].copy_from_slice(&i.to_be_bytes());
    if high {
        key[0] |= OWNER_HIGH_FLAG;
    }
    DataWord::Single(key)
}
