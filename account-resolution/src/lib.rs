//! Crate for resolving the additional accounts a program declares, in
//! on-chain validation data, as required for an instruction. If a program
//! writes the proper table into one of its accounts, any offchain or onchain
//! client can decode it and derive the concrete account list to attach.

#![allow(clippy::arithmetic_side_effects)]
#![deny(missing_docs)]
#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod account;
pub mod error;
pub mod seeds;
pub mod state;

// Export current sdk types for downstream users building with a different
// sdk version
pub use solana_program;
