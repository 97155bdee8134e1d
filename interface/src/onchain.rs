//! On-chain program invoke helper to perform on-chain `execute` with correct
//! accounts

use {
    crate::{error::TransferHookError, get_extra_account_metas_address, instruction},
    hook_account_resolution::state::ExtraAccountMetaList,
    solana_program::{
        account_info::AccountInfo,
        entrypoint::ProgramResult,
        instruction::{AccountMeta, Instruction},
        program::invoke,
        pubkey::Pubkey,
    },
};

/// Helper to CPI into a transfer-hook program on-chain, looking through the
/// additional account infos to create the proper instruction
pub fn invoke_execute<'a>(
    program_id: &Pubkey,
    source_info: AccountInfo<'a>,
    mint_info: AccountInfo<'a>,
    destination_info: AccountInfo<'a>,
    authority_info: AccountInfo<'a>,
    additional_accounts: &[AccountInfo<'a>],
    amount: u64,
) -> ProgramResult {
    let mut cpi_instruction = instruction::execute(
        program_id,
        source_info.key,
        mint_info.key,
        destination_info.key,
        authority_info.key,
        amount,
    );

    let validation_pubkey = get_extra_account_metas_address(mint_info.key, program_id);

    let mut cpi_account_infos = vec![source_info, mint_info, destination_info, authority_info];

    if let Some(validation_info) = additional_accounts
        .iter()
        .find(|info| *info.key == validation_pubkey)
    {
        cpi_instruction
            .accounts
            .push(AccountMeta::new_readonly(validation_pubkey, false));
        cpi_account_infos.push(validation_info.clone());

        ExtraAccountMetaList::add_to_cpi_instruction::<instruction::ExecuteInstruction>(
            &mut cpi_instruction,
            &mut cpi_account_infos,
            &validation_info.try_borrow_data()?,
            additional_accounts,
        )?;
    }

    invoke(&cpi_instruction, &cpi_account_infos)
}

/// Helper to add accounts required for an `ExecuteInstruction` on-chain,
/// looking through the additional account infos to add the proper accounts.
///
/// Note this helper is designed to add the extra accounts that will be
/// required for a CPI to a transfer hook program. However, the instruction
/// being provided to this helper is for the program that will CPI to the
/// transfer hook program. Because of this, we must resolve the extra
/// accounts for the `ExecuteInstruction` CPI, then add those extra resolved
/// accounts to the provided instruction.
#[allow(clippy::too_many_arguments)]
pub fn add_extra_accounts_for_execute_cpi<'a>(
    cpi_instruction: &mut Instruction,
    cpi_account_infos: &mut Vec<AccountInfo<'a>>,
    program_id: &Pubkey,
    source_info: AccountInfo<'a>,
    mint_info: AccountInfo<'a>,
    destination_info: AccountInfo<'a>,
    authority_info: AccountInfo<'a>,
    amount: u64,
    additional_accounts: &[AccountInfo<'a>],
) -> ProgramResult {
    let validate_state_pubkey = get_extra_account_metas_address(mint_info.key, program_id);

    let program_info = additional_accounts
        .iter()
        .find(|info| info.key == program_id)
        .ok_or(TransferHookError::IncorrectAccount)?;

    if let Some(validate_state_info) = additional_accounts
        .iter()
        .find(|info| *info.key == validate_state_pubkey)
    {
        let mut execute_instruction = instruction::execute(
            program_id,
            source_info.key,
            mint_info.key,
            destination_info.key,
            authority_info.key,
            amount,
        );
        execute_instruction
            .accounts
            .push(AccountMeta::new_readonly(validate_state_pubkey, false));
        let mut execute_account_infos = vec![
            source_info,
            mint_info,
            destination_info,
            authority_info,
            validate_state_info.clone(),
        ];

        ExtraAccountMetaList::add_to_cpi_instruction::<instruction::ExecuteInstruction>(
            &mut execute_instruction,
            &mut execute_account_infos,
            &validate_state_info.try_borrow_data()?,
            additional_accounts,
        )?;

        // Add only the extra accounts resolved from the validation state
        cpi_instruction
            .accounts
            .extend_from_slice(&execute_instruction.accounts[5..]);
        cpi_account_infos.extend_from_slice(&execute_account_infos[5..]);

        // Add the validation state account
        cpi_instruction
            .accounts
            .push(AccountMeta::new_readonly(validate_state_pubkey, false));
        cpi_account_infos.push(validate_state_info.clone());
    }

    // Add the program id
    cpi_instruction
        .accounts
        .push(AccountMeta::new_readonly(*program_id, false));
    cpi_account_infos.push(program_info.clone());

    Ok(())
}
