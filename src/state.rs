//! The word-addressed storage cache that the precompiled cores run against.
//!
//! All persistent contract state is a set of `(account, key -> value)` rows
//! where keys and values are fixed-width byte strings of 16 or 32 bytes
//! ([DataWord]). The host exposes that store behind the [WordStoreR] /
//! [WordStoreW] split; a handler never writes to the host directly but
//! through a [StoreCache] cursor, whose `flush()` commits the whole
//! invocation atomically. Dropping the cursor without flushing discards
//! every buffered write, which is how non-success outcomes leave the outer
//! state untouched.

use std::collections::hash_map::HashMap;
use std::fmt;

use crate::common::{Addr, BytesRef, Scalar};

pub const SINGLE_WORD_SIZE: usize = 16;
pub const DOUBLE_WORD_SIZE: usize = 32;

/// A fixed-width storage key or value. The width is part of the value and
/// survives a round-trip through the store: a single word never comes back
/// as a zero-padded double word.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataWord {
    Single([u8; SINGLE_WORD_SIZE]),
    Double([u8; DOUBLE_WORD_SIZE]),
}

impl DataWord {
    /// Wraps a byte string in the correctly sized word. Any width other
    /// than 16 or 32 is a programming error, not an input error.
    pub fn from_slice(word: &[u8]) -> Self {
        match word.len() {
            SINGLE_WORD_SIZE => {
                let mut bytes = [0u8; SINGLE_WORD_SIZE];
                bytes.copy_from_slice(word);
                DataWord::Single(bytes)
            }
            DOUBLE_WORD_SIZE => {
                let mut bytes = [0u8; DOUBLE_WORD_SIZE];
                bytes.copy_from_slice(word);
                DataWord::Double(bytes)
            }
            n => panic!("incorrect word size: {}", n),
        }
    }

    #[inline(always)]
    pub fn bytes(&self) -> &[u8] {
        match self {
            DataWord::Single(b) => b,
            DataWord::Double(b) => b,
        }
    }

    pub const fn zero_single() -> Self {
        DataWord::Single([0; SINGLE_WORD_SIZE])
    }

    pub const fn zero_double() -> Self {
        DataWord::Double([0; DOUBLE_WORD_SIZE])
    }
}

impl From<[u8; SINGLE_WORD_SIZE]> for DataWord {
    fn from(bytes: [u8; SINGLE_WORD_SIZE]) -> Self {
        DataWord::Single(bytes)
    }
}

impl From<[u8; DOUBLE_WORD_SIZE]> for DataWord {
    fn from(bytes: [u8; DOUBLE_WORD_SIZE]) -> Self {
        DataWord::Double(bytes)
    }
}

impl fmt::Debug for DataWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", BytesRef(self.bytes()))
    }
}

/// Read half of the word store. Implementations are expected to resolve
/// reads synchronously; the cores are non-suspending state transitions and
/// never yield mid-invocation.
pub trait WordStoreR {
    /// Get the storage row under `key` in the `account` state space, or
    /// `None` if the row was never written.
    fn get_storage_value(&self, account: &Addr, key: &DataWord)
        -> Option<DataWord>;
    /// Get the balance of the account (zero for unknown accounts).
    fn get_balance(&self, account: &Addr) -> Scalar;
    /// Get the nonce of the account (zero for unknown accounts).
    fn get_nonce(&self, account: &Addr) -> u64;
    /// Check if an account exists.
    fn exists(&self, account: &Addr) -> bool;
}

/// Write half of the word store. Writes may be buffered by the
/// implementation; [StoreCache] always buffers and only materialises them
/// on `flush()`.
pub trait WordStoreW {
    /// Set the storage row under `key` in the `account` state space.
    fn add_storage_row(&mut self, account: &Addr, key: DataWord, value: DataWord);
    /// Set the balance of the account.
    fn set_balance(&mut self, account: &Addr, balance: Scalar);
    /// Set the nonce of the account.
    fn set_nonce(&mut self, account: &Addr, nonce: u64);
    /// Create the account if it does not exist yet (zero balance and nonce,
    /// no storage). Existing accounts are left alone.
    fn create_account(&mut self, account: &Addr);
}

/// The full store contract required by a precompiled handler.
pub trait WordStore: WordStoreR + WordStoreW {}

impl<T: WordStoreR + WordStoreW> WordStore for T {}

/// Helper trait that adds funds transfer functions to any [WordStore]
/// object. Subtraction reports underflow instead of wrapping; balances are
/// unbounded upwards so addition is total.
pub trait Transferable {
    fn add_balance(&mut self, account: &Addr, val: &Scalar);
    fn sub_balance(&mut self, account: &Addr, val: &Scalar) -> Option<()>;
    fn transfer_balance(
        &mut self, from: &Addr, to: &Addr, val: &Scalar,
    ) -> Option<()>;
}

impl<T> Transferable for T
where
    T: WordStore,
{
    fn add_balance(&mut self, account: &Addr, val: &Scalar) {
        let balance = &self.get_balance(account) + val;
        self.set_balance(account, balance);
    }

    fn sub_balance(&mut self, account: &Addr, val: &Scalar) -> Option<()> {
        let balance = self.get_balance(account).checked_sub(val)?;
        self.set_balance(account, balance);
        Some(())
    }

    fn transfer_balance(
        &mut self, from: &Addr, to: &Addr, val: &Scalar,
    ) -> Option<()> {
        self.sub_balance(from, val)?;
        self.add_balance(to, val);
        Some(())
    }
}

/// A scoped write cursor over a backing [WordStore]. Reads fall through to
/// the backing store when the overlay has no entry; every write stays in
/// the overlay until `flush()`.
pub struct StoreCache<'a, S: WordStore> {
    base: &'a mut S,
    storage: HashMap<Addr, HashMap<DataWord, DataWord>>,
    balances: HashMap<Addr, Scalar>,
    nonces: HashMap<Addr, u64>,
    created: Vec<Addr>,
}

impl<'a, S: WordStore> StoreCache<'a, S> {
    pub fn new(base: &'a mut S) -> Self {
        Self {
            base,
            storage: HashMap::new(),
            balances: HashMap::new(),
            nonces: HashMap::new(),
            created: Vec::new(),
        }
    }

    /// Commits every buffered write to the backing store and empties the
    /// overlay. Without this call the backing store never observes the
    /// invocation.
    pub fn flush(&mut self) {
        for account in self.created.drain(..) {
            self.base.create_account(&account);
        }
        for (account, rows) in self.storage.drain() {
            for (key, value) in rows {
                self.base.add_storage_row(&account, key, value);
            }
        }
        for (account, balance) in self.balances.drain() {
            self.base.set_balance(&account, balance);
        }
        for (account, nonce) in self.nonces.drain() {
            self.base.set_nonce(&account, nonce);
        }
    }
}

impl<'a, S: WordStore> WordStoreR for StoreCache<'a, S> {
    fn get_storage_value(
        &self, account: &Addr, key: &DataWord,
    ) -> Option<DataWord> {
        if let Some(rows) = self.storage.get(account) {
            if let Some(value) = rows.get(key) {
                return Some(*value)
            }
        }
        self.base.get_storage_value(account, key)
    }

    fn get_balance(&self, account: &Addr) -> Scalar {
        match self.balances.get(account) {
            Some(balance) => balance.clone(),
            None => self.base.get_balance(account),
        }
    }

    fn get_nonce(&self, account: &Addr) -> u64 {
        match self.nonces.get(account) {
            Some(nonce) => *nonce,
            None => self.base.get_nonce(account),
        }
    }

    fn exists(&self, account: &Addr) -> bool {
        self.created.contains(account) ||
            self.storage.contains_key(account) ||
            self.balances.contains_key(account) ||
            self.base.exists(account)
    }
}

impl<'a, S: WordStore> WordStoreW for StoreCache<'a, S> {
    fn add_storage_row(&mut self, account: &Addr, key: DataWord, value: DataWord) {
        self.storage.entry(*account).or_default().insert(key, value);
    }

    fn set_balance(&mut self, account: &Addr, balance: Scalar) {
        self.balances.insert(*account, balance);
    }

    fn set_nonce(&mut self, account: &Addr, nonce: u64) {
        self.nonces.insert(*account, nonce);
    }

    fn create_account(&mut self, account: &Addr) {
        if !self.created.contains(account) {
            self.created.push(*account);
        }
    }
}
