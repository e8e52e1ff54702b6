//! Test utilities for the precompiled contract cores: an instrumented
//! in-memory word store ([repo::MemRepo]), ed25519 key helpers and input
//! frame builders ([keys]).

pub mod keys;
pub mod repo;
