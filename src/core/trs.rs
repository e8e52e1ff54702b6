//! Persistence core of the token release schedule (TRS) contracts.
//!
//! A TRS contract's whole state is a hand-rolled record set over the word
//! store: a specs word, an owner word, per-account deposit balances spread
//! across up to 16 double-word rows, a multi-row total-balance accumulator,
//! and a doubly-linked list of depositors threaded through per-account
//! metadata. Every key prefix, offset and flag bit here is consensus
//! critical; the operation handlers layer policy on top but never touch the
//! byte layout directly.
//!
//! Storage keys are built exclusively through the constructors below — a
//! bare byte array is never used as a key, so an account address and a
//! derived key cannot be confused even though both are 32 bytes wide.

use crate::common::{Addr, Scalar};
use crate::state::{
    DataWord, StoreCache, WordStore, WordStoreR, WordStoreW, DOUBLE_WORD_SIZE,
    SINGLE_WORD_SIZE,
};

use super::params::TRS_PREFIX;

/// Set in a metadata or pointer word whose referent is null. Overloaded by
/// the deposit handler, which treats it as "already in the list" on the
/// account metadata byte — see `trs_use`.
pub const NULL_BIT: u8 = 0x80;
/// Set iff the account exists in the depositor list; unset means logically
/// deleted.
pub const VALID_BIT: u8 = 0x40;
/// Hard cap on the number of double-word rows a single deposit balance may
/// occupy.
pub const MAX_DEPOSIT_ROWS: usize = 16;

const BALANCE_PREFIX: u8 = 0xB0;
const LIST_PREV_PREFIX: u8 = 0x60;
const FUNDS_PREFIX: u8 = 0x90;

/// Sentinel for a null pointer word.
const NULL32: DataWord = DataWord::Double({
    let mut bytes = [0u8; DOUBLE_WORD_SIZE];
    bytes[0] = NULL_BIT;
    bytes
});
/// Sentinel for a logically deleted account entry: no flags, no body.
const INVALID: DataWord = DataWord::zero_double();

// specs record offsets
const TEST_OFFSET: usize = 9;
const DIR_DEPO_OFFSET: usize = 10;
const PRECISION_OFFSET: usize = 11;
const PERIODS_OFFSET: usize = 12;
const LOCK_OFFSET: usize = 14;
const LIVE_OFFSET: usize = 15;

pub(crate) fn specs_key() -> DataWord {
    let mut key = [0u8; SINGLE_WORD_SIZE];
    key[0] = 0xE0;
    DataWord::Single(key)
}

pub(crate) fn owner_key() -> DataWord {
    let mut key = [0u8; SINGLE_WORD_SIZE];
    key[0] = 0xF0;
    DataWord::Single(key)
}

pub(crate) fn funds_specs_key() -> DataWord {
    let mut key = [0u8; SINGLE_WORD_SIZE];
    key[0] = 0x91;
    DataWord::Single(key)
}

pub(crate) fn list_head_key() -> DataWord {
    let mut key = [0u8; SINGLE_WORD_SIZE];
    key[0] = 0x70;
    DataWord::Single(key)
}

/// Key of total-balance row `row`: the funds prefix with the row index
/// big-endian in the low four bytes.
pub(crate) fn total_row_key(row: u32) -> DataWord {
    let mut key = [0u8; SINGLE_WORD_SIZE];
    key[0] = FUNDS_PREFIX;
    key[SINGLE_WORD_SIZE - 4..].copy_from_slice(&row.to_be_bytes());
    DataWord::Single(key)
}

/// Key of deposit-balance row `row` for `account`: the balance prefix with
/// the row index in its low nibble, followed by the account body.
pub(crate) fn balance_row_key(account: &Addr, row: u8) -> DataWord {
    debug_assert!((row as usize) < MAX_DEPOSIT_ROWS);
    let mut key = [0u8; DOUBLE_WORD_SIZE];
    key[0] = BALANCE_PREFIX | row;
    key[1..].copy_from_slice(account.body());
    DataWord::Double(key)
}

/// Key of the previous-pointer of `account` in the depositor list.
pub(crate) fn prev_key(account: &Addr) -> DataWord {
    let mut key = [0u8; DOUBLE_WORD_SIZE];
    key[0] = LIST_PREV_PREFIX;
    key[1..].copy_from_slice(account.body());
    DataWord::Double(key)
}

/// Key of the account metadata word (which doubles as the next-pointer):
/// the account address itself.
pub(crate) fn account_key(account: &Addr) -> DataWord {
    DataWord::Double(account.to_fixed_bytes())
}

/// Decoded specs word of a TRS contract. `encode` reproduces the stored
/// bytes exactly for records written through `set_specs`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecsRecord {
    /// Raw percent magnitude; scale by `10^-precision` to interpret.
    pub percent_raw: [u8; TEST_OFFSET],
    pub is_test: bool,
    pub is_direct_deposit: bool,
    pub precision: u8,
    pub periods: u16,
    pub is_locked: bool,
    pub is_live: bool,
}

impl SpecsRecord {
    pub fn decode(word: &DataWord) -> Self {
        let bytes = word.bytes();
        let mut percent_raw = [0u8; TEST_OFFSET];
        percent_raw.copy_from_slice(&bytes[..TEST_OFFSET]);
        Self {
            percent_raw,
            is_test: bytes[TEST_OFFSET] == 0x1,
            is_direct_deposit: bytes[DIR_DEPO_OFFSET] == 0x1,
            precision: bytes[PRECISION_OFFSET],
            periods: u16::from_be_bytes([
                bytes[PERIODS_OFFSET],
                bytes[PERIODS_OFFSET + 1],
            ]),
            is_locked: bytes[LOCK_OFFSET] == 0x1,
            is_live: bytes[LIVE_OFFSET] == 0x1,
        }
    }

    pub fn encode(&self) -> DataWord {
        let mut bytes = [0u8; SINGLE_WORD_SIZE];
        bytes[..TEST_OFFSET].copy_from_slice(&self.percent_raw);
        bytes[TEST_OFFSET] = self.is_test as u8;
        bytes[DIR_DEPO_OFFSET] = self.is_direct_deposit as u8;
        bytes[PRECISION_OFFSET] = self.precision;
        bytes[PERIODS_OFFSET..PERIODS_OFFSET + 2]
            .copy_from_slice(&self.periods.to_be_bytes());
        bytes[LOCK_OFFSET] = self.is_locked as u8;
        bytes[LIVE_OFFSET] = self.is_live as u8;
        DataWord::Single(bytes)
    }

    /// Raw percent as a value; divide by `10^precision` to obtain the
    /// one-off withdrawal percentage.
    pub fn percent(&self) -> Scalar {
        Scalar::from_unsigned_be(&self.percent_raw)
    }
}

/// Presence of an account in the depositor list, decoded from its metadata
/// word. Reads go through this decoder; writes emit the legacy flag bytes
/// verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountEntry {
    /// No metadata word at all.
    Absent,
    /// Logically deleted: the word exists but the valid bit is unset.
    Deleted,
    /// A live depositor; `next` is the successor's address body, `None` at
    /// the tail.
    Live {
        next: Option<[u8; 31]>,
        row_count: u8,
    },
}

impl AccountEntry {
    pub fn is_valid(&self) -> bool {
        matches!(self, AccountEntry::Live { .. })
    }
}

/// The shared persistence layer: one instance per invocation, owning the
/// write cursor and the caller identity, exactly the state every TRS
/// operation needs. Writes stay buffered until [TrsCore::flush].
pub struct TrsCore<'a, S: WordStore> {
    pub(crate) track: StoreCache<'a, S>,
    pub(crate) caller: Addr,
}

impl<'a, S: WordStore> TrsCore<'a, S> {
    pub fn new(store: &'a mut S, caller: Addr) -> Self {
        Self {
            track: StoreCache::new(store),
            caller,
        }
    }

    pub fn caller(&self) -> &Addr {
        &self.caller
    }

    /// Commits the buffered invocation to the backing store.
    pub fn flush(&mut self) {
        self.track.flush();
    }

    /// The specs of `contract`, or `None` if the address is not a TRS
    /// contract (wrong prefix or no specs row).
    pub fn get_specs(&self, contract: &Addr) -> Option<SpecsRecord> {
        if contract.prefix() != TRS_PREFIX {
            return None
        }
        self.track
            .get_storage_value(contract, &specs_key())
            .map(|word| SpecsRecord::decode(&word))
    }

    /// Writes the specs of `contract`. Single-shot: a second call on the
    /// same contract is a silent no-op. A `percent` longer than nine bytes
    /// is truncated to its low nine.
    pub fn set_specs(
        &mut self, contract: &Addr, is_test: bool, is_direct_deposit: bool,
        periods: u16, percent: &Scalar, precision: u8,
    ) {
        if self.track.get_storage_value(contract, &specs_key()).is_some() {
            return
        }
        let mut specs = [0u8; SINGLE_WORD_SIZE];
        let percent_bytes = percent.signed_be_bytes();
        let len = percent_bytes.len().min(TEST_OFFSET);
        specs[TEST_OFFSET - len..TEST_OFFSET]
            .copy_from_slice(&percent_bytes[percent_bytes.len() - len..]);
        specs[TEST_OFFSET] = is_test as u8;
        specs[DIR_DEPO_OFFSET] = is_direct_deposit as u8;
        specs[PRECISION_OFFSET] = precision;
        specs[PERIODS_OFFSET..PERIODS_OFFSET + 2]
            .copy_from_slice(&periods.to_be_bytes());
        specs[LOCK_OFFSET] = 0x0;
        specs[LIVE_OFFSET] = 0x0;
        self.track
            .add_storage_row(contract, specs_key(), DataWord::Single(specs));
    }

    /// The owner of `contract`, or `None` if no owner row exists.
    pub fn get_owner(&self, contract: &Addr) -> Option<Addr> {
        self.track
            .get_storage_value(contract, &owner_key())
            .map(|word| Addr::from_slice(word.bytes()))
    }

    /// Records the caller as the owner of `contract`. Single-shot.
    pub fn set_owner(&mut self, contract: &Addr) {
        if self.track.get_storage_value(contract, &owner_key()).is_some() {
            return
        }
        self.track.add_storage_row(
            contract,
            owner_key(),
            DataWord::Double(self.caller.to_fixed_bytes()),
        );
    }

    /// The head word of the depositor list, or `None` when the list is
    /// empty. Bytes 1..31 of the returned word are the head account's body.
    /// A contract without a head row has no list at all; that is an
    /// invariant breach.
    pub fn get_list_head(&self, contract: &Addr) -> Option<[u8; 32]> {
        let head = self.must_read(contract, &list_head_key(), "list head");
        let bytes = head.bytes();
        if bytes[0] & NULL_BIT == NULL_BIT {
            return None
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(bytes);
        Some(out)
    }

    /// Sets the head of the depositor list; `None` stores the null
    /// sentinel. The null bit of a non-null head is always cleared.
    pub fn set_list_head(&mut self, contract: &Addr, head: Option<&[u8; 32]>) {
        let value = match head {
            None => NULL32,
            Some(head) => {
                let mut bytes = *head;
                bytes[0] = 0x0;
                DataWord::Double(bytes)
            }
        };
        self.track.add_storage_row(contract, list_head_key(), value);
    }

    /// The previous-pointer word of `account`, or `None` when the account
    /// is the head. Missing rows for enrolled accounts are an invariant
    /// breach.
    pub fn get_list_prev(
        &self, contract: &Addr, account: &Addr,
    ) -> Option<[u8; 32]> {
        let prev = self.must_read(contract, &prev_key(account), "list prev");
        let bytes = prev.bytes();
        if bytes[0] & NULL_BIT == NULL_BIT {
            return None
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(bytes);
        Some(out)
    }

    /// Sets the previous-pointer of `account`; `None` stores the null
    /// sentinel.
    pub fn set_list_prev(
        &mut self, contract: &Addr, account: &Addr, prev: Option<&[u8; 32]>,
    ) {
        let value = match prev {
            None => NULL32,
            Some(prev) => {
                let mut bytes = *prev;
                bytes[0] = 0x0;
                DataWord::Double(bytes)
            }
        };
        self.track.add_storage_row(contract, prev_key(account), value);
    }

    /// The successor of `account`, or `None` at the tail. Panics when the
    /// account has no metadata word at all.
    pub fn get_list_next(
        &self, contract: &Addr, account: &Addr,
    ) -> Option<[u8; 32]> {
        let next = self.must_read(contract, &account_key(account), "list next");
        let bytes = next.bytes();
        if bytes[0] & NULL_BIT == NULL_BIT {
            return None
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(bytes);
        Some(out)
    }

    /// The raw metadata word of `account`, flags included. Useful when the
    /// caller needs the valid bit and row count that [Self::get_list_next]
    /// hides behind its null handling.
    pub fn get_list_next_bytes(&self, contract: &Addr, account: &Addr) -> [u8; 32] {
        let next = self.must_read(contract, &account_key(account), "list next");
        let mut out = [0u8; 32];
        out.copy_from_slice(next.bytes());
        out
    }

    /// Rewrites the metadata word of `account`. With `is_valid` false the
    /// entry becomes the deleted sentinel regardless of the other
    /// arguments. Otherwise the word keeps `old_meta` (which carries the
    /// balance row count in its low nibble), gains the valid bit, and
    /// stores either the null sentinel or `next`'s body.
    pub fn set_list_next(
        &mut self, contract: &Addr, account: &Addr, old_meta: u8,
        next: Option<&[u8; 32]>, is_valid: bool,
    ) {
        let value = if !is_valid {
            INVALID
        } else {
            match next {
                None => {
                    let mut bytes = [0u8; DOUBLE_WORD_SIZE];
                    bytes[0] = NULL_BIT | VALID_BIT | old_meta;
                    DataWord::Double(bytes)
                }
                Some(next) => {
                    let mut bytes = *next;
                    bytes[0] = (VALID_BIT | old_meta) & !NULL_BIT;
                    DataWord::Double(bytes)
                }
            }
        };
        self.track.add_storage_row(contract, account_key(account), value);
    }

    /// Decodes the tri-state presence of `account` in the depositor list.
    pub fn account_entry(&self, contract: &Addr, account: &Addr) -> AccountEntry {
        let word = match self.track.get_storage_value(contract, &account_key(account)) {
            None => return AccountEntry::Absent,
            Some(word) => word,
        };
        let bytes = word.bytes();
        if bytes[0] & VALID_BIT == 0x0 {
            return AccountEntry::Deleted
        }
        let next = if bytes[0] & NULL_BIT == NULL_BIT {
            None
        } else {
            let mut body = [0u8; 31];
            body.copy_from_slice(&bytes[1..]);
            Some(body)
        };
        AccountEntry::Live {
            next,
            row_count: bytes[0] & 0x0F,
        }
    }

    /// The deposit balance of `account`, or zero when the account has no
    /// valid entry.
    pub fn get_deposit_balance(&self, contract: &Addr, account: &Addr) -> Scalar {
        let row_count = match self.account_entry(contract, account) {
            AccountEntry::Live { row_count, .. } => row_count as usize,
            _ => return Scalar::zero().clone(),
        };
        let mut balance = vec![0u8; row_count * DOUBLE_WORD_SIZE + 1];
        for i in 0..row_count {
            let row = self.must_read(
                contract,
                &balance_row_key(account, i as u8),
                "deposit balance row",
            );
            balance[i * DOUBLE_WORD_SIZE + 1..(i + 1) * DOUBLE_WORD_SIZE + 1]
                .copy_from_slice(row.bytes());
        }
        Scalar::from_unsigned_be(&balance)
    }

    /// Writes the deposit balance of `account` and refreshes the row count
    /// in its metadata word. A balance below one is a silent success (zero
    /// is represented by the absence of rows); a balance needing more than
    /// [MAX_DEPOSIT_ROWS] rows is refused with `false` and nothing written.
    ///
    /// A freshly created metadata word carries the null bit and row count
    /// but not the valid bit: enrolment into the depositor list is a
    /// separate step.
    pub fn set_deposit_balance(
        &mut self, contract: &Addr, account: &Addr, balance: &Scalar,
    ) -> bool {
        if balance.is_zero() {
            return true
        }
        let bal = to_double_word_aligned(balance);
        let row_count = bal.len() / DOUBLE_WORD_SIZE;
        if row_count > MAX_DEPOSIT_ROWS {
            return false
        }
        for i in 0..row_count {
            let mut row = [0u8; DOUBLE_WORD_SIZE];
            row.copy_from_slice(
                &bal[i * DOUBLE_WORD_SIZE..(i + 1) * DOUBLE_WORD_SIZE],
            );
            self.track.add_storage_row(
                contract,
                balance_row_key(account, i as u8),
                DataWord::Double(row),
            );
        }

        let value = match self.track.get_storage_value(contract, &account_key(account)) {
            None => {
                let mut bytes = [0u8; DOUBLE_WORD_SIZE];
                bytes[0] = NULL_BIT | row_count as u8;
                bytes
            }
            Some(word) => {
                let mut bytes = [0u8; DOUBLE_WORD_SIZE];
                bytes.copy_from_slice(word.bytes());
                bytes[0] = (bytes[0] & NULL_BIT) | VALID_BIT | row_count as u8;
                bytes
            }
        };
        self.track.add_storage_row(
            contract,
            account_key(account),
            DataWord::Double(value),
        );
        true
    }

    /// The total deposit balance of `contract`. A contract without a
    /// funds-specs row was never created; that is an invariant breach.
    pub fn get_total_balance(&self, contract: &Addr) -> Scalar {
        let specs = self.must_read(contract, &funds_specs_key(), "funds specs");
        let bytes = specs.bytes();
        let mut rows = [0u8; 4];
        rows.copy_from_slice(&bytes[SINGLE_WORD_SIZE - 4..]);
        let row_count = u32::from_be_bytes(rows) as usize;
        if row_count == 0 {
            return Scalar::zero().clone()
        }
        let mut balance = vec![0u8; row_count * DOUBLE_WORD_SIZE + 1];
        for i in 0..row_count {
            let row = self.must_read(
                contract,
                &total_row_key(i as u32),
                "total balance row",
            );
            balance[i * DOUBLE_WORD_SIZE + 1..(i + 1) * DOUBLE_WORD_SIZE + 1]
                .copy_from_slice(row.bytes());
        }
        Scalar::from_unsigned_be(&balance)
    }

    /// Writes the total deposit balance of `contract` and the matching row
    /// count into the funds-specs row. Unlike per-account balances the row
    /// count is uncapped and zero occupies one all-zero row.
    pub fn set_total_balance(&mut self, contract: &Addr, balance: &Scalar) {
        let bal = to_double_word_aligned(balance);
        let row_count = bal.len() / DOUBLE_WORD_SIZE;
        for i in 0..row_count {
            let mut row = [0u8; DOUBLE_WORD_SIZE];
            row.copy_from_slice(
                &bal[i * DOUBLE_WORD_SIZE..(i + 1) * DOUBLE_WORD_SIZE],
            );
            self.track.add_storage_row(
                contract,
                total_row_key(i as u32),
                DataWord::Double(row),
            );
        }

        let mut specs = [0u8; SINGLE_WORD_SIZE];
        specs[SINGLE_WORD_SIZE - 4..]
            .copy_from_slice(&(row_count as u32).to_be_bytes());
        self.track
            .add_storage_row(contract, funds_specs_key(), DataWord::Single(specs));
    }

    /// Writes the funds-specs row with a zero row count, establishing the
    /// (empty) total-balance accumulator at contract creation.
    pub fn init_total_balance(&mut self, contract: &Addr) {
        self.track.add_storage_row(
            contract,
            funds_specs_key(),
            DataWord::zero_single(),
        );
    }

    /// Sets the is-locked byte of the specs row. Assumes `contract` is a
    /// valid TRS contract.
    pub fn set_lock(&mut self, contract: &Addr) {
        self.set_specs_byte(contract, LOCK_OFFSET);
    }

    /// Sets the is-live byte of the specs row. Assumes `contract` is a
    /// valid TRS contract.
    pub fn set_live(&mut self, contract: &Addr) {
        self.set_specs_byte(contract, LIVE_OFFSET);
    }

    /// Rewrites the raw specs word with one byte set, leaving every other
    /// byte untouched.
    fn set_specs_byte(&mut self, contract: &Addr, offset: usize) {
        let specs = self.must_read(contract, &specs_key(), "contract specs");
        let mut bytes = [0u8; SINGLE_WORD_SIZE];
        bytes.copy_from_slice(specs.bytes());
        bytes[offset] = 0x1;
        self.track
            .add_storage_row(contract, specs_key(), DataWord::Single(bytes));
    }

    /// A storage row that the record invariants guarantee to exist; its
    /// absence means the store is corrupt, which aborts execution rather
    /// than surfacing as a user-visible failure.
    fn must_read(&self, contract: &Addr, key: &DataWord, what: &str) -> DataWord {
        match self.track.get_storage_value(contract, key) {
            Some(word) => word,
            None => panic!("contract {} has no {} row", contract, what),
        }
    }
}

/// Returns true only if the raw metadata word (as returned by
/// [TrsCore::get_list_next_bytes]) has its valid bit set.
pub fn account_is_valid(meta: &[u8; 32]) -> bool {
    meta[0] & VALID_BIT == VALID_BIT
}

/// Canonicalises a balance to a 32-byte-aligned big-endian array: the
/// minimal signed encoding, with its sign byte stripped when that alone
/// overhangs a row boundary, otherwise left-padded with zeros to the next
/// multiple of 32. No 32-byte section of the result is all zeros except for
/// the zero balance itself, which maps to a single zero row.
pub(crate) fn to_double_word_aligned(balance: &Scalar) -> Vec<u8> {
    if balance.is_zero() {
        return vec![0; DOUBLE_WORD_SIZE]
    }
    let temp = balance.signed_be_bytes();
    let chop_first = (temp.len() - 1) % DOUBLE_WORD_SIZE == 0 && temp[0] == 0x0;
    if chop_first {
        temp[1..].to_vec()
    } else {
        let rows = (temp.len() + DOUBLE_WORD_SIZE - 1) / DOUBLE_WORD_SIZE;
        let mut bal = vec![0u8; rows * DOUBLE_WORD_SIZE];
        let offset = bal.len() - temp.len();
        bal[offset..].copy_from_slice(&temp);
        bal
    }
}
