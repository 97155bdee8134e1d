//! Crate defining the client side of the transfer hook interface: instruction
//! builders, the validation-state address, and helpers that attach a hook's
//! extra accounts to a token transfer before submission or CPI.

#![deny(missing_docs)]
#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod error;
pub mod instruction;
pub mod offchain;
pub mod onchain;

// Export current sdk types for downstream users building with a different
// sdk version
pub use solana_program;
use solana_program::pubkey::Pubkey;

/// Namespace for all programs implementing the transfer hook interface.
/// Baked into the instruction discriminators of deployed hook programs;
/// changing it breaks wire compatibility.
pub const NAMESPACE: &str = "spl-transfer-hook-interface";

/// Seed for the validation state account
const EXTRA_ACCOUNT_METAS_SEED: &[u8] = b"extra-account-metas";

/// Get the validation state address for the given mint and hook program
pub fn get_extra_account_metas_address(mint: &Pubkey, program_id: &Pubkey) -> Pubkey {
    get_extra_account_metas_address_and_bump_seed(mint, program_id).0
}

/// Get the validation state address with the canonical bump seed
pub fn get_extra_account_metas_address_and_bump_seed(
    mint: &Pubkey,
    program_id: &Pubkey,
) -> (Pubkey, u8) {
    Pubkey::find_program_address(&collect_extra_account_metas_seeds(mint), program_id)
}

/// Get the derivation seeds for the validation state account
pub fn collect_extra_account_metas_seeds(mint: &Pubkey) -> [&[u8]; 2] {
    [EXTRA_ACCOUNT_METAS_SEED, mint.as_ref()]
}

/// Get the signer seeds for the validation state account, for hook programs
/// creating or writing it
pub fn collect_extra_account_metas_signer_seeds<'a>(
    mint: &'a Pubkey,
    bump_seed: &'a [u8],
) -> [&'a [u8]; 3] {
    [EXTRA_ACCOUNT_METAS_SEED, mint.as_ref(), bump_seed]
}
