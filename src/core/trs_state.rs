//! The owner-facing TRS operations: creating a release-schedule contract
//! and moving it through its lifecycle (unlocked → locked → live).

use log::debug;
use num_bigint::BigUint;

use crate::common::{Addr, Bytes, Nrg, Scalar};
use crate::crypto::hash32;
use crate::state::{WordStore, WordStoreR, WordStoreW};

use super::params::{COST, MAX_PRECISION, TRS_PREFIX};
use super::trs::TrsCore;
use super::{check_nrg_limit, PrecompiledContract, PrecompiledResult, ResultCode};

const OP_CREATE: u8 = 0x0;
const OP_LOCK: u8 = 0x1;
const OP_START: u8 = 0x2;

// create frame offsets
const INDEX_FLAGS: usize = 1;
const INDEX_PERIODS: usize = 2;
const INDEX_PRECISION: usize = 4;
const INDEX_PERCENT: usize = 5;
const CREATE_LEN: usize = 14;

const FLAG_IS_TEST: u8 = 0x1;
const FLAG_DIRECT_DEPOSIT: u8 = 0x2;

/// Handler for the ownership lifecycle of a TRS contract. All state goes
/// through the persistence core; this layer only validates and sequences.
pub struct TrsStateContract<'a, S: WordStore> {
    trs: TrsCore<'a, S>,
}

impl<'a, S: WordStore> TrsStateContract<'a, S> {
    pub fn new(store: &'a mut S, caller: Addr) -> Self {
        Self {
            trs: TrsCore::new(store, caller),
        }
    }

    /// Derives the address of the contract a caller is about to create:
    /// the hash of the caller and its current nonce, carrying the TRS
    /// prefix. Distinct nonces give distinct contracts.
    fn derive_contract_address(&self, caller: &Addr, nonce: u64) -> Addr {
        let mut preimage = Vec::with_capacity(Addr::LEN + 8);
        preimage.extend_from_slice(caller.as_bytes());
        preimage.extend_from_slice(&nonce.to_be_bytes());
        let mut bytes = hash32(&preimage);
        bytes[0] = TRS_PREFIX;
        Addr::from(bytes)
    }

    /// Create frame, after the operation tag:
    /// `flags(1) ‖ periods(2 BE) ‖ precision(1) ‖ percent(9)`, 14 bytes in
    /// total. Flag bit 0 marks a test contract, bit 1 enables direct
    /// deposits. The percentage, scaled by `10^-precision`, may not exceed
    /// 100.
    fn create(&mut self, input: &[u8], nrg_limit: Nrg) -> PrecompiledResult {
        if input.len() != CREATE_LEN {
            return PrecompiledResult::failure()
        }

        let flags = input[INDEX_FLAGS];
        if flags & !(FLAG_IS_TEST | FLAG_DIRECT_DEPOSIT) != 0 {
            return PrecompiledResult::failure()
        }
        let is_test = flags & FLAG_IS_TEST != 0;
        let is_direct_deposit = flags & FLAG_DIRECT_DEPOSIT != 0;

        let periods = u16::from_be_bytes([
            input[INDEX_PERIODS],
            input[INDEX_PERIODS + 1],
        ]);
        if periods == 0 {
            return PrecompiledResult::failure()
        }

        let precision = input[INDEX_PRECISION];
        if precision > MAX_PRECISION {
            return PrecompiledResult::failure()
        }

        // percent / 10^precision must not exceed 100.
        let percent =
            Scalar::from_unsigned_be(&input[INDEX_PERCENT..CREATE_LEN]);
        let mut limit = BigUint::from(100u8);
        for _ in 0..precision {
            limit *= 10u8;
        }
        if percent > Scalar::from(limit) {
            debug!("create: percentage over 100");
            return PrecompiledResult::failure()
        }

        let caller = *self.trs.caller();
        let nonce = self.trs.track.get_nonce(&caller);
        let contract = self.derive_contract_address(&caller, nonce);
        if self.trs.get_specs(&contract).is_some() {
            return PrecompiledResult::failure()
        }

        self.trs.track.create_account(&contract);
        self.trs.set_owner(&contract);
        self.trs.set_specs(
            &contract,
            is_test,
            is_direct_deposit,
            periods,
            &percent,
            precision,
        );
        self.trs.set_list_head(&contract, None);
        self.trs.init_total_balance(&contract);
        self.trs.track.set_nonce(&caller, nonce + 1);
        self.trs.flush();

        PrecompiledResult::with_return(
            ResultCode::Success,
            nrg_limit - COST,
            Bytes::from(contract.as_bytes()),
        )
    }

    /// Lock frame, after the operation tag: `contract(32)`. Only the owner
    /// may lock, and only while the contract is unlocked and not live.
    /// Locking ends the deposit phase.
    fn lock(&mut self, input: &[u8], nrg_limit: Nrg) -> PrecompiledResult {
        let (contract, specs) = match self.owned_contract(input) {
            Some(found) => found,
            None => return PrecompiledResult::failure(),
        };
        if specs.is_locked || specs.is_live {
            return PrecompiledResult::failure()
        }
        self.trs.set_lock(&contract);
        self.trs.flush();
        PrecompiledResult::new(ResultCode::Success, nrg_limit - COST)
    }

    /// Start frame, after the operation tag: `contract(32)`. Only the
    /// owner may start, and only a locked, not-yet-live contract. Starting
    /// makes the contract live and begins the withdrawal periods.
    fn start(&mut self, input: &[u8], nrg_limit: Nrg) -> PrecompiledResult {
        let (contract, specs) = match self.owned_contract(input) {
            Some(found) => found,
            None => return PrecompiledResult::failure(),
        };
        if !specs.is_locked || specs.is_live {
            return PrecompiledResult::failure()
        }
        self.trs.set_live(&contract);
        self.trs.flush();
        PrecompiledResult::new(ResultCode::Success, nrg_limit - COST)
    }

    /// Parses a `tag ‖ contract(32)` frame and resolves the contract,
    /// requiring the caller to be its owner.
    fn owned_contract(
        &self, input: &[u8],
    ) -> Option<(Addr, super::trs::SpecsRecord)> {
        if input.len() != 1 + Addr::LEN {
            return None
        }
        let contract = Addr::from_slice(&input[1..]);
        let specs = self.trs.get_specs(&contract)?;
        if self.trs.get_owner(&contract)? != *self.trs.caller() {
            debug!("caller is not the owner of {}", contract);
            return None
        }
        Some((contract, specs))
    }
}

impl<'a, S: WordStore> PrecompiledContract for TrsStateContract<'a, S> {
    /// Input frame: `op(1) ‖ arguments`. Operation 0x0 creates a contract,
    /// 0x1 locks it, 0x2 starts it; any other tag is rejected.
    fn execute(&mut self, input: &[u8], nrg_limit: Nrg) -> PrecompiledResult {
        if input.is_empty() {
            return PrecompiledResult::failure()
        }
        if let Err(res) = check_nrg_limit(nrg_limit) {
            return res
        }

        match input[0] {
            OP_CREATE => self.create(input, nrg_limit),
            OP_LOCK => self.lock(input, nrg_limit),
            OP_START => self.start(input, nrg_limit),
            op => {
                debug!("unsupported state operation: {:#x}", op);
                PrecompiledResult::failure()
            }
        }
    }
}
