//! The user-facing TRS operations: state-changing calls that depositors
//! (and the owner) make against an existing release-schedule contract.
//! Only `deposit` lives here; withdrawal-side operations share the same
//! dispatch and persistence contracts.

use log::debug;

use crate::common::{Addr, Nrg, Scalar};
use crate::state::{
    DataWord, Transferable, WordStore, WordStoreR, WordStoreW,
    DOUBLE_WORD_SIZE,
};

use super::params::{ACCOUNT_PREFIX, COST};
use super::trs::{
    self, to_double_word_aligned, TrsCore, MAX_DEPOSIT_ROWS,
};
use super::{check_nrg_limit, PrecompiledContract, PrecompiledResult, ResultCode};

const OP_DEPOSIT: u8 = 0x0;

/// Handler for the deposit-side operations of a TRS contract.
///
/// The account metadata byte is read and written here with its own bit
/// discipline: 0x80 marks an enrolled (valid) depositor and 0x40 a null
/// successor — the mirror image of the naming the persistence core uses
/// for the same byte. The stored bytes are consensus critical either way;
/// keep the two code paths exactly as they are.
pub struct TrsUseContract<'a, S: WordStore> {
    trs: TrsCore<'a, S>,
}

impl<'a, S: WordStore> TrsUseContract<'a, S> {
    pub fn new(store: &'a mut S, caller: Addr) -> Self {
        Self {
            trs: TrsCore::new(store, caller),
        }
    }

    /// Deposit input frame, after the operation tag:
    /// `contract(32) ‖ amount(128 unsigned BE)`, 161 bytes in total.
    fn deposit(&mut self, input: &[u8], nrg_limit: Nrg) -> PrecompiledResult {
        const INDEX_ADDRESS: usize = 1;
        const INDEX_AMOUNT: usize = 33;
        const LEN: usize = 161;

        if input.len() != LEN {
            return PrecompiledResult::failure()
        }

        let contract =
            Addr::from_slice(&input[INDEX_ADDRESS..INDEX_AMOUNT]);
        let specs = match self.trs.get_specs(&contract) {
            Some(specs) => specs,
            None => return PrecompiledResult::failure(),
        };

        // Deposits need direct depositing enabled unless the owner calls.
        let owner = self.trs.get_owner(&contract);
        let caller = *self.trs.caller();
        if owner.as_ref() != Some(&caller) && !specs.is_direct_deposit {
            debug!("deposit: direct deposits disabled for {}", contract);
            return PrecompiledResult::failure()
        }

        // Deposits only while the contract is unlocked and not yet live.
        if specs.is_locked || specs.is_live {
            return PrecompiledResult::failure()
        }

        let amount = Scalar::from_unsigned_be(&input[INDEX_AMOUNT..LEN]);

        if self.trs.track.get_balance(&caller) < amount {
            return PrecompiledResult::new(ResultCode::InsufficientBalance, 0)
        }

        // A zero deposit succeeds but must not enrol the depositor.
        if !amount.is_zero() {
            let current = self.fetch_deposit_balance(&contract, &caller);
            if !self.set_deposit_balance(&contract, &caller, &(&current + &amount)) {
                return PrecompiledResult::failure()
            }
            if !self.update_linked_list(&contract) {
                return PrecompiledResult::failure()
            }

            let total = &self.trs.get_total_balance(&contract) + &amount;
            self.trs.set_total_balance(&contract, &total);
            self.trs
                .track
                .sub_balance(&caller, &amount)
                .expect("caller balance was checked above");
            self.trs.flush();
        }

        PrecompiledResult::new(ResultCode::Success, nrg_limit - COST)
    }

    /// Proposes to add the caller to the depositor list. A caller whose
    /// entry already carries the in-list bit needs no update; otherwise it
    /// is spliced in at the head.
    fn update_linked_list(&mut self, contract: &Addr) -> bool {
        let caller = *self.trs.caller();
        let mut acct = self.account_data(contract, &caller);
        if acct[0] & 0x80 == 0x80 {
            return true // already in the list
        }
        acct[0] |= 0x80;

        // Point the caller's 'next' at the current head.
        let mut head = match self.head_data(contract) {
            Some(head) => head,
            None => return false, // the contract has no list
        };
        if head[0] & 0x80 == 0x80 {
            acct[0] |= 0x40; // list was empty, 'next' is null
        } else {
            acct[0] &= !0x40;
            acct[1..].copy_from_slice(&head[1..]);

            // The displaced head gains the caller as its predecessor.
            let mut curr_head = head;
            curr_head[0] = ACCOUNT_PREFIX;
            let curr_head = Addr::from(curr_head);
            let mut head_prev = [0u8; DOUBLE_WORD_SIZE];
            head_prev[1..].copy_from_slice(caller.body());
            self.add_previous_data(contract, &curr_head, head_prev);
        }

        // The caller becomes the head.
        head[0] &= !0x80;
        head[1..].copy_from_slice(caller.body());

        // And its own predecessor is null.
        let mut prev = self.previous_data(contract, &caller);
        prev[0] = 0x80;

        self.add_account_data(contract, &caller, acct);
        self.trs.set_list_head(contract, Some(&head));
        self.add_previous_data(contract, &caller, prev);
        true
    }

    /// The caller-side view of an account's deposit balance: zero unless
    /// the entry exists and carries the in-list bit.
    fn fetch_deposit_balance(&self, contract: &Addr, account: &Addr) -> Scalar {
        let meta = match self
            .trs
            .track
            .get_storage_value(contract, &trs::account_key(account))
        {
            None => return Scalar::zero().clone(),
            Some(word) => word,
        };
        if meta.bytes()[0] & 0x80 == 0x00 {
            return Scalar::zero().clone()
        }

        let row_count = (meta.bytes()[0] & 0x0F) as usize;
        let mut balance = vec![0u8; row_count * DOUBLE_WORD_SIZE + 1];
        for i in 0..row_count {
            let row = match self
                .trs
                .track
                .get_storage_value(contract, &trs::balance_row_key(account, i as u8))
            {
                Some(row) => row,
                None => panic!("account {} has no balance row {}", account, i),
            };
            balance[i * DOUBLE_WORD_SIZE + 1..(i + 1) * DOUBLE_WORD_SIZE + 1]
                .copy_from_slice(row.bytes());
        }
        Scalar::from_unsigned_be(&balance)
    }

    /// Writes an account's deposit balance and row count. A balance below
    /// one or wider than the row cap is refused. A fresh entry is written
    /// with the null bit only; enrolment (the in-list bit) happens in
    /// [Self::update_linked_list].
    fn set_deposit_balance(
        &mut self, contract: &Addr, account: &Addr, balance: &Scalar,
    ) -> bool {
        if balance.is_zero() {
            return false
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
            self.trs.track.add_storage_row(
                contract,
                trs::balance_row_key(account, i as u8),
                DataWord::Double(row),
            );
        }

        let value = match self
            .trs
            .track
            .get_storage_value(contract, &trs::account_key(account))
        {
            None => {
                // Null bit and row count, but not yet in the list.
                let mut bytes = [0u8; DOUBLE_WORD_SIZE];
                bytes[0] = 0x40 | row_count as u8;
                bytes
            }
            Some(word) => {
                // Keep the null bit, mark in-list, refresh the row count.
                let mut bytes = [0u8; DOUBLE_WORD_SIZE];
                bytes.copy_from_slice(word.bytes());
                bytes[0] = (bytes[0] & 0x40) | 0x80 | row_count as u8;
                bytes
            }
        };
        self.trs.track.add_storage_row(
            contract,
            trs::account_key(account),
            DataWord::Double(value),
        );
        true
    }

    /// The raw metadata word of `account`, or a zero word if absent.
    fn account_data(&self, contract: &Addr, account: &Addr) -> [u8; 32] {
        match self
            .trs
            .track
            .get_storage_value(contract, &trs::account_key(account))
        {
            None => [0u8; DOUBLE_WORD_SIZE],
            Some(word) => {
                let mut bytes = [0u8; DOUBLE_WORD_SIZE];
                bytes.copy_from_slice(word.bytes());
                bytes
            }
        }
    }

    fn add_account_data(
        &mut self, contract: &Addr, account: &Addr, data: [u8; 32],
    ) {
        self.trs.track.add_storage_row(
            contract,
            trs::account_key(account),
            DataWord::Double(data),
        );
    }

    /// The raw previous-pointer word of `account`, or a zero word if
    /// absent.
    fn previous_data(&self, contract: &Addr, account: &Addr) -> [u8; 32] {
        match self
            .trs
            .track
            .get_storage_value(contract, &trs::prev_key(account))
        {
            None => [0u8; DOUBLE_WORD_SIZE],
            Some(word) => {
                let mut bytes = [0u8; DOUBLE_WORD_SIZE];
                bytes.copy_from_slice(word.bytes());
                bytes
            }
        }
    }

    fn add_previous_data(
        &mut self, contract: &Addr, account: &Addr, data: [u8; 32],
    ) {
        self.trs.track.add_storage_row(
            contract,
            trs::prev_key(account),
            DataWord::Double(data),
        );
    }

    /// The raw head word of the depositor list, or `None` if the contract
    /// was never created.
    fn head_data(&self, contract: &Addr) -> Option<[u8; 32]> {
        self.trs
            .track
            .get_storage_value(contract, &trs::list_head_key())
            .map(|word| {
                let mut bytes = [0u8; DOUBLE_WORD_SIZE];
                bytes.copy_from_slice(word.bytes());
                bytes
            })
    }
}

impl<'a, S: WordStore> PrecompiledContract for TrsUseContract<'a, S> {
    /// Input frame: `op(1) ‖ arguments`. Operation 0x0 is `deposit`; any
    /// other tag is rejected.
    fn execute(&mut self, input: &[u8], nrg_limit: Nrg) -> PrecompiledResult {
        if input.is_empty() {
            return PrecompiledResult::failure()
        }
        if let Err(res) = check_nrg_limit(nrg_limit) {
            return res
        }

        match input[0] {
            OP_DEPOSIT => self.deposit(input, nrg_limit),
            op => {
                debug!("unsupported use operation: {:#x}", op);
                PrecompiledResult::failure()
            }
        }
    }
}
