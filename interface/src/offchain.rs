//! Offchain helpers for building the full account list of a hooked transfer
//! before submission

pub use hook_account_resolution::state::{AccountDataResult, AccountFetchError};
use {
    crate::{
        error::TransferHookError,
        get_extra_account_metas_address,
        instruction::{execute, ExecuteInstruction},
    },
    hook_account_resolution::state::ExtraAccountMetaList,
    solana_program::{
        instruction::{AccountMeta, Instruction},
        pubkey::Pubkey,
    },
    std::future::Future,
};

/// The result of looking up a mint's transfer hook program: the hook program
/// id, or `None` if the mint carries no transfer hook
pub type HookProgramIdResult = Result<Option<Pubkey>, AccountFetchError>;

/// Offchain helper to add the extra account metas required by a mint's
/// transfer hook to a transfer instruction, leaving the instruction
/// untouched when no hook applies.
///
/// This is the single public entry point for hooked transfers: it reads the
/// mint's transfer hook program through `get_hook_program_id_fn` (mint
/// layouts are the token client's concern, not this crate's) and resolves
/// the hook's validation data through `fetch_account_data_fn`. A mint with
/// no hook, or a hook whose validation account has not been initialized,
/// returns the instruction unchanged.
///
/// To be client-agnostic and to avoid pulling in the full solana-sdk, this
/// simply takes functions that return their data as a `Future`. Can be
/// called in the following way:
///
/// ```rust,ignore
/// add_extra_account_metas(
///     &mut instruction,
///     &source,
///     &mint,
///     &destination,
///     &authority,
///     amount,
///     |mint| self.client.get_transfer_hook_program_id(&mint),
///     |address| self.client.get_account(&address).map_ok(|opt| opt.map(|acc| acc.data)),
/// )
/// .await?;
/// ```
#[allow(clippy::too_many_arguments)]
pub async fn add_extra_account_metas<F, Fut, G, GFut>(
    instruction: &mut Instruction,
    source_pubkey: &Pubkey,
    mint_pubkey: &Pubkey,
    destination_pubkey: &Pubkey,
    authority_pubkey: &Pubkey,
    amount: u64,
    get_hook_program_id_fn: G,
    fetch_account_data_fn: F,
) -> Result<(), AccountFetchError>
where
    F: Fn(Pubkey) -> Fut,
    Fut: Future<Output = AccountDataResult>,
    G: Fn(Pubkey) -> GFut,
    GFut: Future<Output = HookProgramIdResult>,
{
    let program_id = match get_hook_program_id_fn(*mint_pubkey).await? {
        Some(program_id) => program_id,
        // No hook on this mint, nothing to attach
        None => return Ok(()),
    };
    add_extra_account_metas_for_execute(
        instruction,
        &program_id,
        source_pubkey,
        mint_pubkey,
        destination_pubkey,
        authority_pubkey,
        amount,
        fetch_account_data_fn,
    )
    .await
}

/// Offchain helper to get all additional required account metas for an
/// execute instruction, based on a validation state account.
///
/// The instruction being provided to this function must contain at least the
/// same account keys as the ones being provided, in order. Specifically:
/// 1. source
/// 2. mint
/// 3. destination
/// 4. authority
///
/// The `program_id` should be the program id of the hook program the
/// resolved `ExecuteInstruction` is for.
///
/// Resolution runs against a synthetic `Execute`-shaped instruction of
/// `[source, mint, destination, authority, validation-state]`; only the
/// accounts past those five are spliced onto the provided instruction,
/// followed by the hook program id and the validation-state account. If the
/// validation account does not exist the hook has not been configured, and
/// the instruction is returned unchanged.
#[allow(clippy::too_many_arguments)]
pub async fn add_extra_account_metas_for_execute<F, Fut>(
    instruction: &mut Instruction,
    program_id: &Pubkey,
    source_pubkey: &Pubkey,
    mint_pubkey: &Pubkey,
    destination_pubkey: &Pubkey,
    authority_pubkey: &Pubkey,
    amount: u64,
    fetch_account_data_fn: F,
) -> Result<(), AccountFetchError>
where
    F: Fn(Pubkey) -> Fut,
    Fut: Future<Output = AccountDataResult>,
{
    let validate_state_pubkey = get_extra_account_metas_address(mint_pubkey, program_id);
    let validate_state_data = match fetch_account_data_fn(validate_state_pubkey).await? {
        Some(data) => data,
        // Hook not configured for this mint, leave the instruction as-is
        None => return Ok(()),
    };

    // Check to make sure the provided keys are in the instruction
    if [
        source_pubkey,
        mint_pubkey,
        destination_pubkey,
        authority_pubkey,
    ]
    .iter()
    .any(|&key| !instruction.accounts.iter().any(|meta| meta.pubkey == *key))
    {
        Err(TransferHookError::IncorrectAccount)?;
    }

    let mut execute_instruction = execute(
        program_id,
        source_pubkey,
        mint_pubkey,
        destination_pubkey,
        authority_pubkey,
        amount,
    );
    execute_instruction
        .accounts
        .push(AccountMeta::new_readonly(validate_state_pubkey, false));

    ExtraAccountMetaList::add_to_instruction::<ExecuteInstruction, _, _>(
        &mut execute_instruction,
        fetch_account_data_fn,
        &validate_state_data,
    )
    .await?;

    // Add only the extra accounts resolved from the validation state
    instruction
        .accounts
        .extend_from_slice(&execute_instruction.accounts[5..]);

    // Add the program id and validation state account
    instruction
        .accounts
        .push(AccountMeta::new_readonly(*program_id, false));
    instruction
        .accounts
        .push(AccountMeta::new_readonly(validate_state_pubkey, false));

    Ok(())
}
