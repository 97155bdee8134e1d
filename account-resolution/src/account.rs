//! Struct for one extra required account stored in validation data: either a
//! fixed-address `AccountMeta` or a derived address described by a collection
//! of seed configs

use {
    crate::{error::AccountResolutionError, seeds::Seed},
    bytemuck::{Pod, Zeroable},
    solana_program::{
        account_info::AccountInfo, instruction::AccountMeta, program_error::ProgramError,
        pubkey::Pubkey,
    },
    spl_pod::primitives::PodBool,
};

/// Discriminators with the top bit set carry an index into the accounts list
/// for the target program, rather than an entry type
const EXTERNAL_PDA_BASE: u8 = 1 << 7;

/// Resolve a derived address from the instruction data and the accounts that
/// have already been resolved
fn resolve_pda<'a, F>(
    seeds: &[Seed],
    instruction_data: &[u8],
    program_id: &Pubkey,
    get_account_key_data_fn: F,
) -> Result<Pubkey, ProgramError>
where
    F: Fn(usize) -> Option<(&'a Pubkey, Option<&'a [u8]>)>,
{
    let mut pda_seeds: Vec<&[u8]> = vec![];
    for config in seeds {
        match config {
            Seed::Uninitialized => (),
            Seed::Literal { bytes } => pda_seeds.push(bytes),
            Seed::InstructionArg { offset, length } => {
                let arg_start = *offset as usize;
                let arg_end = arg_start + *length as usize;
                if arg_end > instruction_data.len() {
                    return Err(AccountResolutionError::InvalidSeed.into());
                }
                pda_seeds.push(&instruction_data[arg_start..arg_end]);
            }
            Seed::AccountKey { index } => {
                let address = get_account_key_data_fn(*index as usize)
                    .ok_or::<ProgramError>(AccountResolutionError::InvalidSeed.into())?
                    .0;
                pda_seeds.push(address.as_ref());
            }
            Seed::AccountData {
                account_index,
                data_offset,
                length,
            } => {
                let account_data = get_account_key_data_fn(*account_index as usize)
                    .ok_or::<ProgramError>(AccountResolutionError::InvalidSeed.into())?
                    .1
                    .ok_or::<ProgramError>(AccountResolutionError::AccountDataNotFound.into())?;
                let arg_start = *data_offset as usize;
                let arg_end = arg_start + *length as usize;
                if account_data.len() < arg_end {
                    return Err(AccountResolutionError::InvalidSeed.into());
                }
                pda_seeds.push(&account_data[arg_start..arg_end]);
            }
        }
    }
    // A config can name a seed the chain cannot accept, such as an
    // instruction-data slice longer than the maximum seed length. Malformed
    // validation data must surface as an error, not a panic.
    Pubkey::try_find_program_address(&pda_seeds, program_id)
        .map(|(pubkey, _)| pubkey)
        .ok_or_else(|| AccountResolutionError::SeedResolutionFailed.into())
}

/// `Pod` type for one required account in a validation account.
///
/// This can either be a standard `AccountMeta` or a derived address.
/// Fixed 35-byte layout: discriminator, 32-byte address config, two flags.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ExtraAccountMeta {
    /// Discriminator to tell whether this represents a standard
    /// `AccountMeta` or a derived address, and under which program
    pub discriminator: u8,
    /// The pubkey of the account, taken verbatim, or the seed configs used
    /// to derive the pubkey from provided inputs
    pub address_config: [u8; 32],
    /// Whether the account should sign
    pub is_signer: PodBool,
    /// Whether the account should be writable
    pub is_writable: PodBool,
}

impl ExtraAccountMeta {
    /// Create a `ExtraAccountMeta` from a public key,
    /// thus representing a standard `AccountMeta`
    pub fn new_with_pubkey(
        pubkey: &Pubkey,
        is_signer: bool,
        is_writable: bool,
    ) -> Result<Self, ProgramError> {
        Ok(Self {
            discriminator: 0,
            address_config: pubkey.to_bytes(),
            is_signer: is_signer.into(),
            is_writable: is_writable.into(),
        })
    }

    /// Create a `ExtraAccountMeta` from a list of seed configs, representing
    /// an address derived under the program the table belongs to
    pub fn new_with_seeds(
        seeds: &[Seed],
        is_signer: bool,
        is_writable: bool,
    ) -> Result<Self, ProgramError> {
        Ok(Self {
            discriminator: 1,
            address_config: Seed::pack_into_address_config(seeds)?,
            is_signer: is_signer.into(),
            is_writable: is_writable.into(),
        })
    }

    /// Create a `ExtraAccountMeta` from a list of seed configs, representing
    /// an address derived under the program whose id sits at `program_index`
    /// in the accounts list
    pub fn new_external_pda_with_seeds(
        program_index: u8,
        seeds: &[Seed],
        is_signer: bool,
        is_writable: bool,
    ) -> Result<Self, ProgramError> {
        Ok(Self {
            discriminator: program_index
                .checked_add(EXTERNAL_PDA_BASE)
                .ok_or(AccountResolutionError::InvalidSeed)?,
            address_config: Seed::pack_into_address_config(seeds)?,
            is_signer: is_signer.into(),
            is_writable: is_writable.into(),
        })
    }

    /// Indices of the accounts whose raw data resolving this entry will
    /// read. Entries holding a fixed address never read any.
    pub fn required_account_data_indices(&self) -> Result<Vec<usize>, ProgramError> {
        match self.discriminator {
            0 => Ok(vec![]),
            x if x == 1 || x >= EXTERNAL_PDA_BASE => {
                let seeds = Seed::unpack_address_config(&self.address_config)?;
                Ok(Seed::account_data_indices(&seeds))
            }
            _ => Err(ProgramError::InvalidAccountData),
        }
    }

    /// Resolve an `ExtraAccountMeta` into an `AccountMeta`, deriving the
    /// address if the entry calls for one.
    ///
    /// The lookup function maps an index in the accounts list resolved so
    /// far to that account's pubkey and, when available, its raw data; only
    /// `AccountData` seeds ever look at the data half.
    pub fn resolve<'a, F>(
        &self,
        instruction_data: &[u8],
        program_id: &Pubkey,
        get_account_key_data_fn: F,
    ) -> Result<AccountMeta, ProgramError>
    where
        F: Fn(usize) -> Option<(&'a Pubkey, Option<&'a [u8]>)>,
    {
        match self.discriminator {
            0 => AccountMeta::try_from(self),
            x if x == 1 || x >= EXTERNAL_PDA_BASE => {
                let program_id = if x == 1 {
                    program_id
                } else {
                    get_account_key_data_fn((x - EXTERNAL_PDA_BASE) as usize)
                        .ok_or::<ProgramError>(
                            AccountResolutionError::InvalidAccountReference.into(),
                        )?
                        .0
                };
                let seeds = Seed::unpack_address_config(&self.address_config)?;
                Ok(AccountMeta {
                    pubkey: resolve_pda(
                        &seeds,
                        instruction_data,
                        program_id,
                        get_account_key_data_fn,
                    )?,
                    is_signer: self.is_signer.into(),
                    is_writable: self.is_writable.into(),
                })
            }
            _ => Err(ProgramError::InvalidAccountData),
        }
    }
}

// Conversions to `ExtraAccountMeta`
impl From<&AccountMeta> for ExtraAccountMeta {
    fn from(meta: &AccountMeta) -> Self {
        Self {
            discriminator: 0,
            address_config: meta.pubkey.to_bytes(),
            is_signer: meta.is_signer.into(),
            is_writable: meta.is_writable.into(),
        }
    }
}
impl From<AccountMeta> for ExtraAccountMeta {
    fn from(meta: AccountMeta) -> Self {
        ExtraAccountMeta::from(&meta)
    }
}
impl From<&AccountInfo<'_>> for ExtraAccountMeta {
    fn from(account_info: &AccountInfo) -> Self {
        Self {
            discriminator: 0,
            address_config: account_info.key.to_bytes(),
            is_signer: account_info.is_signer.into(),
            is_writable: account_info.is_writable.into(),
        }
    }
}
impl From<AccountInfo<'_>> for ExtraAccountMeta {
    fn from(account_info: AccountInfo) -> Self {
        ExtraAccountMeta::from(&account_info)
    }
}

// Conversion from `ExtraAccountMeta`, only valid for fixed-address entries
impl TryFrom<&ExtraAccountMeta> for AccountMeta {
    type Error = ProgramError;

    fn try_from(pod: &ExtraAccountMeta) -> Result<Self, Self::Error> {
        if pod.discriminator == 0 {
            Ok(AccountMeta {
                pubkey: Pubkey::from(pod.address_config),
                is_signer: pod.is_signer.into(),
                is_writable: pod.is_writable.into(),
            })
        } else {
            Err(ProgramError::InvalidAccountData)
        }
    }
}
