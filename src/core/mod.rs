//! The precompiled contract engines and their shared result plumbing.
//!
//! Every engine implements [PrecompiledContract]: a single `execute` entry
//! point that turns `(caller, input, nrg_limit)` plus the current word-store
//! snapshot into a [PrecompiledResult]. Nothing is thrown past this
//! boundary; malformed input, failed validation and exhausted energy all
//! come back as result codes, and the store is only mutated on success.

use serde::{Deserialize, Serialize};

pub mod msc;
pub mod params;
pub mod trs;
pub mod trs_state;
pub mod trs_use;

pub use msc::MultiSigContract;
pub use trs::TrsCore;
pub use trs_state::TrsStateContract;
pub use trs_use::TrsUseContract;

use crate::common::{Bytes, Nrg};
use params::{COST, TX_NRG_MAX};

/// Outcome kind of a precompiled invocation. The numbering is part of the
/// external interface and mirrors the transaction receipt encoding.
#[derive(
    FromPrimitive, ToPrimitive, Clone, Copy, PartialEq, Eq, Debug, Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    Success = 0,
    /// Malformed or semantically invalid input; no state was touched.
    Failure = 1,
    /// The energy limit did not cover the flat pre-charge.
    OutOfNrg = 2,
    /// The energy limit exceeds the VM cap; the caller keeps the energy.
    InvalidNrgLimit = 3,
    /// The debited account cannot cover the proposed transfer.
    InsufficientBalance = 4,
}

impl ResultCode {
    #[inline]
    pub fn to_int(self) -> u32 {
        num_traits::ToPrimitive::to_u32(&self).unwrap()
    }

    #[inline]
    pub fn from_int(v: u32) -> Option<Self> {
        num_traits::FromPrimitive::from_u32(v)
    }
}

#[derive(Debug, Serialize)]
pub struct PrecompiledResult {
    pub code: ResultCode,
    pub nrg_left: Nrg,
    pub return_data: Bytes,
}

impl PrecompiledResult {
    pub fn new(code: ResultCode, nrg_left: Nrg) -> Self {
        Self {
            code,
            nrg_left,
            return_data: Bytes::empty(),
        }
    }

    pub fn with_return(code: ResultCode, nrg_left: Nrg, data: Bytes) -> Self {
        Self {
            code,
            nrg_left,
            return_data: data,
        }
    }

    /// The stock rejection: `Failure` with no energy returned.
    pub fn failure() -> Self {
        Self::new(ResultCode::Failure, 0)
    }
}

/// A state transition handler at a fixed address, invoked like a smart
/// contract but implemented natively. Implementations are stateless beyond
/// their store cursor: all persistent data lives in the word store.
pub trait PrecompiledContract {
    fn execute(&mut self, input: &[u8], nrg_limit: Nrg) -> PrecompiledResult;
}

/// The energy preconditions shared by every operation: the limit must cover
/// the flat pre-charge and stay below the VM cap. Checked before any state
/// access.
pub(crate) fn check_nrg_limit(nrg_limit: Nrg) -> Result<(), PrecompiledResult> {
    if nrg_limit < COST {
        return Err(PrecompiledResult::new(ResultCode::OutOfNrg, 0))
    }
    if nrg_limit > TX_NRG_MAX {
        return Err(PrecompiledResult::new(
            ResultCode::InvalidNrgLimit,
            nrg_limit,
        ))
    }
    Ok(())
}
