//! # aion-precompiled: consensus-critical precompiled contract cores
//!
//! This crate implements the built-in, address-triggered state transitions
//! of an Aion-style proof-of-work node: contracts that are invoked like any
//! smart contract but run natively inside the virtual machine, with
//! bit-exact semantics over an external key/value store. Two engines carry
//! the weight:
//!
//! - [core::msc]: an on-chain M-of-N multi-signature wallet — create-wallet
//!   and signed send-transaction operations with strict input parsing,
//!   ed25519 verification, nonce discipline and a deterministic wallet
//!   address derived from the creation inputs.
//! - [core::trs]: the persistence layer of the token release schedule
//!   contracts — a hand-rolled record set of specs, owner, per-account
//!   deposit balances, a multi-row total-balance accumulator and a
//!   doubly-linked depositor list, all encoded into fixed-width storage
//!   words. [core::trs_use] (deposits) and [core::trs_state] (create /
//!   lock / start) layer the operation handlers on top.
//!
//! # Design Philosophy & Overview
//!
//! Everything here is a *pure function of its inputs plus a store
//! snapshot*. A handler is constructed per invocation with the caller
//! address and a mutable reference to the host's [state::WordStore]; its
//! `execute` method parses the tagged input frame, validates, and returns a
//! [core::PrecompiledResult]. There are no suspension points, no spawned
//! tasks and no shared mutable state — the enclosing VM serialises
//! invocations, and determinism is the whole point: the same `(caller,
//! input, nrg_limit, snapshot)` always produces the same result and the
//! same post-state.
//!
//! # On the Data Flow
//!
//! Writes never reach the host store directly. Each handler buffers them in
//! a [state::StoreCache] cursor and only `flush()`es after every check has
//! passed:
//!
//! ```notrust
//!   VM ──execute(caller, input, nrg)──> [ handler ]
//!                                           │ reads fall through
//!                                           v
//!                                    [ StoreCache ]──flush on success──> [ WordStore ]
//!                                           │
//!                                   dropped on failure (nothing committed)
//! ```
//!
//! This makes the no-mutation-on-non-success rule structural rather than
//! disciplinary: an early `return` of a failure result simply drops the
//! cursor and the buffered writes with it.
//!
//! # Energy
//!
//! Timeouts are represented as energy. Every operation pre-charges a flat
//! [core::params::COST]; a limit below it is `OutOfNrg`, a limit above
//! [core::params::TX_NRG_MAX] is `InvalidNrgLimit` (the caller keeps the
//! energy), and success returns `nrg_limit - COST`. There is no wall-clock
//! timer anywhere in the cores.
//!
//! # Binary formats
//!
//! The storage layouts (key prefixes, flag bits, row alignment) and input
//! frames are consensus critical and documented on the items that own
//! them: [core::trs] for the release-schedule records, [core::msc] for the
//! wallet rows and the canonical signed message. They must not vary across
//! implementations; the integration tests pin them byte for byte.

#[macro_use]
extern crate num_derive;

pub mod common;
pub mod core;
pub mod crypto;
pub mod state;
