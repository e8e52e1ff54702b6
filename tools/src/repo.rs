use std::collections::hash_map::HashMap;

use log::info;

use aion_precompiled::common::{Addr, Scalar};
use aion_precompiled::state::{DataWord, WordStoreR, WordStoreW};

#[derive(Clone, Default)]
struct AccountState {
    storage: HashMap<DataWord, DataWord>,
    balance: Scalar,
    nonce: u64,
}

/// A plain in-memory word store that logs every call, standing in for the
/// node's repository cache in tests.
#[derive(Clone, Default)]
pub struct MemRepo {
    accounts: HashMap<Addr, AccountState>,
}

impl MemRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_account(&mut self, account: &Addr) -> &mut AccountState {
        self.accounts.entry(*account).or_default()
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Addr> {
        self.accounts.keys()
    }

    /// Number of storage rows held by `account`.
    pub fn storage_len(&self, account: &Addr) -> usize {
        self.accounts
            .get(account)
            .map(|acc| acc.storage.len())
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// A deep snapshot for before/after comparisons in tests.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Whether two repos hold identical accounts, balances, nonces and
    /// storage rows.
    pub fn same_state(&self, other: &Self) -> bool {
        if self.accounts.len() != other.accounts.len() {
            return false
        }
        self.accounts.iter().all(|(addr, acc)| {
            other.accounts.get(addr).map_or(false, |o| {
                acc.balance == o.balance &&
                    acc.nonce == o.nonce &&
                    acc.storage == o.storage
            })
        })
    }
}

impl WordStoreR for MemRepo {
    fn get_storage_value(
        &self, account: &Addr, key: &DataWord,
    ) -> Option<DataWord> {
        info!("get_storage_value({}, {:?})", account, key);
        self.accounts
            .get(account)
            .and_then(|acc| acc.storage.get(key))
            .copied()
    }

    fn get_balance(&self, account: &Addr) -> Scalar {
        info!("get_balance({})", account);
        self.accounts
            .get(account)
            .map(|acc| acc.balance.clone())
            .unwrap_or_default()
    }

    fn get_nonce(&self, account: &Addr) -> u64 {
        info!("get_nonce({})", account);
        self.accounts
            .get(account)
            .map(|acc| acc.nonce)
            .unwrap_or(0)
    }

    fn exists(&self, account: &Addr) -> bool {
        info!("exists({})", account);
        self.accounts.contains_key(account)
    }
}

impl WordStoreW for MemRepo {
    fn add_storage_row(&mut self, account: &Addr, key: DataWord, value: DataWord) {
        info!("add_storage_row({}, {:?}, {:?})", account, key, value);
        self.get_account(account).storage.insert(key, value);
    }

    fn set_balance(&mut self, account: &Addr, balance: Scalar) {
        info!("set_balance({}, {})", account, balance);
        self.get_account(account).balance = balance;
    }

    fn set_nonce(&mut self, account: &Addr, nonce: u64) {
        info!("set_nonce({}, {})", account, nonce);
        self.get_account(account).nonce = nonce;
    }

    fn create_account(&mut self, account: &Addr) {
        info!("create_account({})", account);
        self.get_account(account);
    }
}
