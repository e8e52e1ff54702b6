use crate::common::Nrg;

/// Flat energy cost pre-charged by every precompiled invocation.
pub const COST: Nrg = 21000;
/// Upper bound on the energy limit a transaction may carry into a
/// precompiled call; limits above it are rejected before any state access.
pub const TX_NRG_MAX: Nrg = 2_000_000;

// address prefixes
pub const ACCOUNT_PREFIX: u8 = 0xA0;
pub const TRS_PREFIX: u8 = 0xC0;

// multi-signature wallet bounds
pub const MIN_OWNERS: usize = 2;
pub const MAX_OWNERS: usize = 10;
pub const MIN_THRESH: i64 = 2;

// send-transaction field sizes
pub const SIG_SIZE: usize = 96;
pub const AMOUNT_SIZE: usize = 128;

// release-schedule bounds
pub const MAX_PRECISION: u8 = 18;
