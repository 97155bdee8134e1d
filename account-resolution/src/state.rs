//! The table of extra required accounts stored in a validation account, and
//! the assembly loops resolving it against an instruction being built

use {
    crate::{account::ExtraAccountMeta, error::AccountResolutionError},
    solana_program::{
        account_info::AccountInfo,
        instruction::{AccountMeta, Instruction},
        program_error::ProgramError,
        pubkey::Pubkey,
    },
    spl_discriminator::{ArrayDiscriminator, SplDiscriminate},
    spl_pod::{
        bytemuck::{pod_from_bytes, pod_slice_from_bytes},
        primitives::PodU32,
        slice::{PodSlice, PodSliceMut},
    },
    std::{future::Future, mem::size_of},
};

/// The result of an account-data fetch: the account's raw bytes, or `None`
/// if the account does not exist
pub type AccountDataResult = Result<Option<Vec<u8>>, AccountFetchError>;
/// Generic error type for the externally supplied account-data fetch
/// capability
pub type AccountFetchError = Box<dyn std::error::Error + Send + Sync>;

const DISCRIMINATOR_END: usize = ArrayDiscriminator::LENGTH;
const LENGTH_END: usize = DISCRIMINATOR_END + size_of::<PodU32>();
const COUNT_SIZE: usize = size_of::<PodU32>();

/// An account that already appears in the list keeps every privilege any
/// occurrence requires; a resolved entry's flags only ever widen, never
/// narrow
fn widen_repeated_account_privileges(
    account_meta: &mut AccountMeta,
    account_metas: &[AccountMeta],
) {
    let maybe_required = account_metas
        .iter()
        .filter(|meta| meta.pubkey == account_meta.pubkey)
        .map(|meta| (meta.is_signer, meta.is_writable))
        .reduce(|acc, item| (acc.0 || item.0, acc.1 || item.1));
    // `Some` means the account occurs somewhere in the list already
    if let Some((is_signer, is_writable)) = maybe_required {
        account_meta.is_signer |= is_signer;
        account_meta.is_writable |= is_writable;
    }
}

/// Stateless helper for storing and resolving the additional accounts
/// required for an instruction.
///
/// Works with any `SplDiscriminate` type: the validation data begins with
/// that type's 8-byte discriminator, then a little-endian `u32` byte length,
/// then a `u32`-count-prefixed slice of 35-byte [`ExtraAccountMeta`] records.
/// Records are stored, decoded, and resolved strictly in order: a later
/// entry may reference the accounts earlier entries resolved.
pub struct ExtraAccountMetaList;
impl ExtraAccountMetaList {
    /// Get the byte size of validation data holding `count` entries
    pub fn size_of(count: usize) -> Result<usize, ProgramError> {
        LENGTH_END
            .checked_add(PodSlice::<ExtraAccountMeta>::size_of(count)?)
            .ok_or_else(|| AccountResolutionError::CalculationFailure.into())
    }

    /// Initialize validation data with the given entries, in order
    pub fn init<T: SplDiscriminate>(
        data: &mut [u8],
        extra_account_metas: &[ExtraAccountMeta],
    ) -> Result<(), ProgramError> {
        let length = PodSlice::<ExtraAccountMeta>::size_of(extra_account_metas.len())?;
        let end = LENGTH_END
            .checked_add(length)
            .ok_or::<ProgramError>(AccountResolutionError::CalculationFailure.into())?;
        if data.len() < end {
            return Err(AccountResolutionError::BufferTooSmall.into());
        }
        let length = u32::try_from(length)
            .map_err(|_| ProgramError::from(AccountResolutionError::CalculationFailure))?;
        data[..DISCRIMINATOR_END].copy_from_slice(T::SPL_DISCRIMINATOR_SLICE);
        data[DISCRIMINATOR_END..LENGTH_END].copy_from_slice(&length.to_le_bytes());
        let mut entries = PodSliceMut::init(&mut data[LENGTH_END..end])?;
        for meta in extra_account_metas {
            entries.push(*meta)?;
        }
        Ok(())
    }

    /// Decode the entries from validation data, in stored order.
    ///
    /// The 8-byte header must match the given instruction type's
    /// discriminator; records past the stored count are capacity and are
    /// ignored.
    pub fn unpack<T: SplDiscriminate>(data: &[u8]) -> Result<Vec<ExtraAccountMeta>, ProgramError> {
        if data.len() < LENGTH_END {
            return Err(AccountResolutionError::TruncatedTable.into());
        }
        if &data[..DISCRIMINATOR_END] != T::SPL_DISCRIMINATOR_SLICE {
            return Err(AccountResolutionError::InvalidDiscriminator.into());
        }
        let length =
            u32::from(*pod_from_bytes::<PodU32>(&data[DISCRIMINATOR_END..LENGTH_END])?) as usize;
        let value_end = LENGTH_END
            .checked_add(length)
            .ok_or::<ProgramError>(AccountResolutionError::CalculationFailure.into())?;
        if data.len() < value_end || length < COUNT_SIZE {
            return Err(AccountResolutionError::TruncatedTable.into());
        }
        let value = &data[LENGTH_END..value_end];
        let count =
            u32::from(*pod_from_bytes::<PodU32>(&value[..COUNT_SIZE])?) as usize;
        let records_len = count
            .checked_mul(size_of::<ExtraAccountMeta>())
            .ok_or::<ProgramError>(AccountResolutionError::CalculationFailure.into())?;
        let records_end = COUNT_SIZE
            .checked_add(records_len)
            .ok_or::<ProgramError>(AccountResolutionError::CalculationFailure.into())?;
        let records = value
            .get(COUNT_SIZE..records_end)
            .ok_or::<ProgramError>(AccountResolutionError::TruncatedTable.into())?;
        Ok(pod_slice_from_bytes::<ExtraAccountMeta>(records)?.to_vec())
    }

    /// Resolve the entries against an instruction being built off-chain and
    /// append the resulting account metas, in stored order.
    ///
    /// Account data is pulled through `fetch_account_data_fn` only for the
    /// accounts an entry's `AccountData` seeds name; entries made of
    /// literals, instruction args, and account keys resolve without any
    /// fetch. Any failure aborts the whole assembly.
    pub async fn add_to_instruction<T: SplDiscriminate, F, Fut>(
        instruction: &mut Instruction,
        fetch_account_data_fn: F,
        data: &[u8],
    ) -> Result<(), AccountFetchError>
    where
        F: Fn(Pubkey) -> Fut,
        Fut: Future<Output = AccountDataResult>,
    {
        for extra_meta in Self::unpack::<T>(data)?.iter() {
            let mut account_key_datas: Vec<(Pubkey, Option<Vec<u8>>)> = instruction
                .accounts
                .iter()
                .map(|meta| (meta.pubkey, None))
                .collect();
            for index in extra_meta.required_account_data_indices()? {
                if let Some(entry) = account_key_datas.get_mut(index) {
                    if entry.1.is_none() {
                        entry.1 = fetch_account_data_fn(entry.0).await?;
                    }
                }
            }
            let mut meta =
                extra_meta.resolve(&instruction.data, &instruction.program_id, |index| {
                    account_key_datas
                        .get(index)
                        .map(|(key, data)| (key, data.as_deref()))
                })?;
            widen_repeated_account_privileges(&mut meta, &instruction.accounts);
            instruction.accounts.push(meta);
        }
        Ok(())
    }

    /// Resolve the entries for a CPI being built on-chain, appending both
    /// the account metas and the matching account infos.
    ///
    /// Account data comes from the provided infos; an appended account whose
    /// info is absent from `account_infos` fails with `IncorrectAccount`.
    pub fn add_to_cpi_instruction<'a, T: SplDiscriminate>(
        cpi_instruction: &mut Instruction,
        cpi_account_infos: &mut Vec<AccountInfo<'a>>,
        data: &[u8],
        account_infos: &[AccountInfo<'a>],
    ) -> Result<(), ProgramError> {
        for extra_meta in Self::unpack::<T>(data)?.iter() {
            let mut meta = {
                // Hold `Ref`s of the infos' data only for the duration of
                // this entry's resolution
                let account_key_data_refs = cpi_instruction
                    .accounts
                    .iter()
                    .map(|meta| {
                        let key = meta.pubkey;
                        let maybe_data = account_infos
                            .iter()
                            .find(|info| *info.key == key)
                            .map(|info| info.try_borrow_data())
                            .transpose()?;
                        Ok((key, maybe_data))
                    })
                    .collect::<Result<Vec<_>, ProgramError>>()?;

                extra_meta.resolve(
                    &cpi_instruction.data,
                    &cpi_instruction.program_id,
                    |index| {
                        account_key_data_refs
                            .get(index)
                            .map(|(key, opt_data)| (key, opt_data.as_ref().map(|data| &data[..])))
                    },
                )?
            };
            widen_repeated_account_privileges(&mut meta, &cpi_instruction.accounts);

            let account_info = account_infos
                .iter()
                .find(|info| *info.key == meta.pubkey)
                .ok_or(AccountResolutionError::IncorrectAccount)?
                .clone();
            cpi_account_infos.push(account_info);
            cpi_instruction.accounts.push(meta);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::seeds::Seed,
        solana_program::{clock::Epoch, instruction::AccountMeta, pubkey::Pubkey},
    };

    pub struct TestInstruction;
    impl SplDiscriminate for TestInstruction {
        const SPL_DISCRIMINATOR: ArrayDiscriminator =
            ArrayDiscriminator::new([1; ArrayDiscriminator::LENGTH]);
    }

    pub struct TestOtherInstruction;
    impl SplDiscriminate for TestOtherInstruction {
        const SPL_DISCRIMINATOR: ArrayDiscriminator =
            ArrayDiscriminator::new([2; ArrayDiscriminator::LENGTH]);
    }

    async fn unexpected_fetch(_address: Pubkey) -> AccountDataResult {
        Err("no fetch expected for this resolution".into())
    }

    fn init_data(metas: &[ExtraAccountMeta]) -> Vec<u8> {
        let mut data = vec![0u8; ExtraAccountMetaList::size_of(metas.len()).unwrap()];
        ExtraAccountMetaList::init::<TestInstruction>(&mut data, metas).unwrap();
        data
    }

    #[test]
    fn record_size_is_fixed() {
        assert_eq!(size_of::<ExtraAccountMeta>(), 35);
        assert_eq!(ExtraAccountMetaList::size_of(3).unwrap(), 8 + 4 + 4 + 3 * 35);
    }

    #[test]
    fn init_and_unpack_roundtrip() {
        let metas = [
            ExtraAccountMeta::new_with_pubkey(&Pubkey::new_unique(), false, true).unwrap(),
            ExtraAccountMeta::new_with_pubkey(&Pubkey::new_unique(), true, false).unwrap(),
            ExtraAccountMeta::new_with_seeds(
                &[
                    Seed::Literal {
                        bytes: b"seed_prefix".to_vec(),
                    },
                    Seed::AccountKey { index: 1 },
                ],
                false,
                true,
            )
            .unwrap(),
        ];
        let data = init_data(&metas);
        let unpacked = ExtraAccountMetaList::unpack::<TestInstruction>(&data).unwrap();
        assert_eq!(unpacked, metas);
    }

    #[test]
    fn unpack_wrong_discriminator_fails() {
        let data = init_data(&[]);
        assert_eq!(
            ExtraAccountMetaList::unpack::<TestOtherInstruction>(&data).unwrap_err(),
            AccountResolutionError::InvalidDiscriminator.into(),
        );
    }

    #[test]
    fn unpack_truncated_table_fails() {
        let metas = [
            ExtraAccountMeta::new_with_pubkey(&Pubkey::new_unique(), false, false).unwrap(),
            ExtraAccountMeta::new_with_pubkey(&Pubkey::new_unique(), false, false).unwrap(),
        ];
        let data = init_data(&metas);
        assert_eq!(
            ExtraAccountMetaList::unpack::<TestInstruction>(&data[..data.len() - 1]).unwrap_err(),
            AccountResolutionError::TruncatedTable.into(),
        );
        assert_eq!(
            ExtraAccountMetaList::unpack::<TestInstruction>(&data[..4]).unwrap_err(),
            AccountResolutionError::TruncatedTable.into(),
        );
    }

    #[test]
    fn unpack_ignores_capacity_past_count() {
        // One live record, one zeroed capacity record, length covering both
        let meta = ExtraAccountMeta::new_with_pubkey(&Pubkey::new_unique(), false, true).unwrap();
        let mut data = vec![0u8; ExtraAccountMetaList::size_of(2).unwrap()];
        ExtraAccountMetaList::init::<TestInstruction>(&mut data, &[meta]).unwrap();
        let length = (4 + 2 * 35u32).to_le_bytes();
        data[DISCRIMINATOR_END..LENGTH_END].copy_from_slice(&length);

        let unpacked = ExtraAccountMetaList::unpack::<TestInstruction>(&data).unwrap();
        assert_eq!(unpacked, vec![meta]);
    }

    #[tokio::test]
    async fn empty_table_appends_nothing() {
        let data = init_data(&[]);
        let program_id = Pubkey::new_unique();
        let accounts = vec![
            AccountMeta::new(Pubkey::new_unique(), false),
            AccountMeta::new_readonly(Pubkey::new_unique(), true),
        ];
        let mut instruction =
            Instruction::new_with_bytes(program_id, &[1, 2, 3], accounts.clone());
        ExtraAccountMetaList::add_to_instruction::<TestInstruction, _, _>(
            &mut instruction,
            unexpected_fetch,
            &data,
        )
        .await
        .unwrap();
        assert_eq!(instruction.accounts, accounts);
    }

    #[tokio::test]
    async fn fixed_and_seeded_entries_resolve_without_fetching() {
        let program_id = Pubkey::new_unique();
        let extra_meta_1 = Pubkey::new_unique();
        let metas = [
            ExtraAccountMeta::new_with_pubkey(&extra_meta_1, true, false).unwrap(),
            ExtraAccountMeta::new_with_seeds(
                &[
                    Seed::Literal {
                        bytes: b"seed_prefix".to_vec(),
                    },
                    Seed::InstructionArg {
                        offset: 1,
                        length: 8,
                    },
                    // the fixed extra account appended just before
                    Seed::AccountKey { index: 1 },
                ],
                false,
                true,
            )
            .unwrap(),
        ];
        let data = init_data(&metas);

        let ix_account = AccountMeta::new(Pubkey::new_unique(), false);
        let ix_data = vec![0, 1, 2, 3, 4, 5, 6, 7, 8];
        let mut instruction =
            Instruction::new_with_bytes(program_id, &ix_data, vec![ix_account.clone()]);
        ExtraAccountMetaList::add_to_instruction::<TestInstruction, _, _>(
            &mut instruction,
            unexpected_fetch,
            &data,
        )
        .await
        .unwrap();

        let check_pda = Pubkey::find_program_address(
            &[b"seed_prefix", &ix_data[1..9], extra_meta_1.as_ref()],
            &program_id,
        )
        .0;
        let check_metas = vec![
            ix_account,
            AccountMeta::new_readonly(extra_meta_1, true),
            AccountMeta::new(check_pda, false),
        ];
        assert_eq!(instruction.accounts, check_metas);
    }

    #[tokio::test]
    async fn account_data_seed_resolves_through_fetch() {
        let program_id = Pubkey::new_unique();
        let source = Pubkey::new_from_array([7u8; 32]);

        async fn fetch(address: Pubkey) -> AccountDataResult {
            if address == Pubkey::new_from_array([7u8; 32]) {
                Ok(Some((0u8..16).collect()))
            } else {
                Ok(None)
            }
        }

        let metas = [ExtraAccountMeta::new_with_seeds(
            &[Seed::AccountData {
                account_index: 0,
                data_offset: 4,
                length: 8,
            }],
            false,
            true,
        )
        .unwrap()];
        let data = init_data(&metas);

        let mut instruction = Instruction::new_with_bytes(
            program_id,
            &[],
            vec![AccountMeta::new(source, false)],
        );
        ExtraAccountMetaList::add_to_instruction::<TestInstruction, _, _>(
            &mut instruction,
            fetch,
            &data,
        )
        .await
        .unwrap();

        let source_data: Vec<u8> = (0u8..16).collect();
        let check_pda = Pubkey::find_program_address(&[&source_data[4..12]], &program_id).0;
        assert_eq!(
            instruction.accounts.last().unwrap(),
            &AccountMeta::new(check_pda, false),
        );
    }

    #[tokio::test]
    async fn missing_account_data_aborts_resolution() {
        let program_id = Pubkey::new_unique();
        async fn fetch(_address: Pubkey) -> AccountDataResult {
            Ok(None)
        }

        let metas = [ExtraAccountMeta::new_with_seeds(
            &[Seed::AccountData {
                account_index: 0,
                data_offset: 0,
                length: 8,
            }],
            false,
            true,
        )
        .unwrap()];
        let data = init_data(&metas);

        let mut instruction = Instruction::new_with_bytes(
            program_id,
            &[],
            vec![AccountMeta::new(Pubkey::new_unique(), false)],
        );
        let err = ExtraAccountMetaList::add_to_instruction::<TestInstruction, _, _>(
            &mut instruction,
            fetch,
            &data,
        )
        .await
        .unwrap_err();
        assert_eq!(
            *err.downcast::<ProgramError>().unwrap(),
            AccountResolutionError::AccountDataNotFound.into(),
        );
    }

    #[tokio::test]
    async fn repeated_account_keeps_union_of_privileges() {
        let program_id = Pubkey::new_unique();
        let repeated = Pubkey::new_unique();
        // The instruction already carries the account as a readonly signer;
        // the table wants it writable but not signing
        let metas =
            [ExtraAccountMeta::new_with_pubkey(&repeated, false, true).unwrap()];
        let data = init_data(&metas);

        let mut instruction = Instruction::new_with_bytes(
            program_id,
            &[],
            vec![AccountMeta::new_readonly(repeated, true)],
        );
        ExtraAccountMetaList::add_to_instruction::<TestInstruction, _, _>(
            &mut instruction,
            unexpected_fetch,
            &data,
        )
        .await
        .unwrap();

        assert_eq!(
            instruction.accounts,
            vec![
                AccountMeta::new_readonly(repeated, true),
                AccountMeta {
                    pubkey: repeated,
                    is_signer: true,
                    is_writable: true,
                },
            ],
        );
    }

    #[tokio::test]
    async fn resolution_is_idempotent() {
        let program_id = Pubkey::new_unique();
        let metas = [
            ExtraAccountMeta::new_with_pubkey(&Pubkey::new_unique(), true, false).unwrap(),
            ExtraAccountMeta::new_with_seeds(&[Seed::AccountKey { index: 0 }], false, true)
                .unwrap(),
        ];
        let data = init_data(&metas);

        let base = Instruction::new_with_bytes(
            program_id,
            &[9, 9, 9],
            vec![AccountMeta::new(Pubkey::new_unique(), true)],
        );
        let mut first = base.clone();
        let mut second = base.clone();
        ExtraAccountMetaList::add_to_instruction::<TestInstruction, _, _>(
            &mut first,
            unexpected_fetch,
            &data,
        )
        .await
        .unwrap();
        ExtraAccountMetaList::add_to_instruction::<TestInstruction, _, _>(
            &mut second,
            unexpected_fetch,
            &data,
        )
        .await
        .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cpi_instruction_resolves_metas_and_infos() {
        let program_id = Pubkey::new_unique();
        let owner = Pubkey::new_unique();

        let ix_pubkey = Pubkey::new_unique();
        let mut ix_lamports = 0;
        let mut ix_data = [];
        let ix_account_info = AccountInfo::new(
            &ix_pubkey,
            false,
            true,
            &mut ix_lamports,
            &mut ix_data,
            &owner,
            false,
            Epoch::default(),
        );

        let fixed_pubkey = Pubkey::new_unique();
        let mut fixed_lamports = 0;
        let mut fixed_data = [];
        let fixed_account_info = AccountInfo::new(
            &fixed_pubkey,
            true,
            false,
            &mut fixed_lamports,
            &mut fixed_data,
            &owner,
            false,
            Epoch::default(),
        );

        let pda_pubkey =
            Pubkey::find_program_address(&[b"cpi", ix_pubkey.as_ref()], &program_id).0;
        let mut pda_lamports = 0;
        let mut pda_data = [];
        let pda_account_info = AccountInfo::new(
            &pda_pubkey,
            false,
            true,
            &mut pda_lamports,
            &mut pda_data,
            &owner,
            false,
            Epoch::default(),
        );

        let metas = [
            ExtraAccountMeta::new_with_pubkey(&fixed_pubkey, true, false).unwrap(),
            ExtraAccountMeta::new_with_seeds(
                &[
                    Seed::Literal {
                        bytes: b"cpi".to_vec(),
                    },
                    Seed::AccountKey { index: 0 },
                ],
                false,
                true,
            )
            .unwrap(),
        ];
        let mut data = vec![0u8; ExtraAccountMetaList::size_of(metas.len()).unwrap()];
        ExtraAccountMetaList::init::<TestInstruction>(&mut data, &metas).unwrap();

        let mut cpi_instruction = Instruction::new_with_bytes(
            program_id,
            &[],
            vec![AccountMeta::new(ix_pubkey, false)],
        );
        let mut cpi_account_infos = vec![ix_account_info.clone()];
        let account_infos = vec![
            ix_account_info.clone(),
            fixed_account_info.clone(),
            pda_account_info.clone(),
        ];

        ExtraAccountMetaList::add_to_cpi_instruction::<TestInstruction>(
            &mut cpi_instruction,
            &mut cpi_account_infos,
            &data,
            &account_infos,
        )
        .unwrap();

        let check_metas = vec![
            AccountMeta::new(ix_pubkey, false),
            AccountMeta::new_readonly(fixed_pubkey, true),
            AccountMeta::new(pda_pubkey, false),
        ];
        assert_eq!(cpi_instruction.accounts, check_metas);

        let check_infos = vec![ix_account_info, fixed_account_info, pda_account_info];
        assert_eq!(cpi_account_infos.len(), check_infos.len());
        for (resolved, check) in std::iter::zip(cpi_account_infos, check_infos) {
            assert_eq!(resolved.key, check.key);
            assert_eq!(resolved.is_signer, check.is_signer);
            assert_eq!(resolved.is_writable, check.is_writable);
        }
    }

    #[test]
    fn cpi_instruction_missing_info_fails() {
        let program_id = Pubkey::new_unique();
        let fixed_pubkey = Pubkey::new_unique();
        let metas = [ExtraAccountMeta::new_with_pubkey(&fixed_pubkey, false, false).unwrap()];
        let mut data = vec![0u8; ExtraAccountMetaList::size_of(metas.len()).unwrap()];
        ExtraAccountMetaList::init::<TestInstruction>(&mut data, &metas).unwrap();

        let mut cpi_instruction = Instruction::new_with_bytes(program_id, &[], vec![]);
        let mut cpi_account_infos = vec![];
        assert_eq!(
            ExtraAccountMetaList::add_to_cpi_instruction::<TestInstruction>(
                &mut cpi_instruction,
                &mut cpi_account_infos,
                &data,
                &[],
            )
            .unwrap_err(),
            AccountResolutionError::IncorrectAccount.into(),
        );
    }
}
