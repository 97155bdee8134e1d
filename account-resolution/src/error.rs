//! Error types

use {
    num_derive::FromPrimitive,
    solana_program::{
        decode_error::DecodeError,
        msg,
        program_error::{PrintProgramError, ProgramError},
    },
    thiserror::Error,
};

/// Errors that may be returned by the account resolution library.
///
/// Note: Error codes range from 40_000 - (40_000 + n)
#[derive(Clone, Copy, Debug, Eq, Error, FromPrimitive, PartialEq)]
pub enum AccountResolutionError {
    /// Validation data does not begin with the expected discriminator
    #[error("Validation data does not begin with the expected discriminator")]
    InvalidDiscriminator = 40_000, // Error code offset
    /// Fewer bytes in the validation data than its entry count implies
    #[error("Fewer bytes in the validation data than its entry count implies")]
    TruncatedTable,
    /// Seed configuration references data out of bounds or overflows its
    /// 32-byte window
    #[error("Seed configuration references data out of bounds or overflows its 32-byte window")]
    InvalidSeed,
    /// No data found for an account referenced by a seed configuration
    #[error("No data found for an account referenced by a seed configuration")]
    AccountDataNotFound,
    /// Entry references an account not present in the resolved list
    #[error("Entry references an account not present in the resolved list")]
    InvalidAccountReference,
    /// Address could not be derived from the resolved seeds
    #[error("Address could not be derived from the resolved seeds")]
    SeedResolutionFailed,
    /// Incorrect account provided
    #[error("Incorrect account provided")]
    IncorrectAccount,
    /// Provided byte buffer too small for the validation data
    #[error("Provided byte buffer too small for the validation data")]
    BufferTooSmall,
    /// Error in checked math operation
    #[error("Error in checked math operation")]
    CalculationFailure,
}

impl From<AccountResolutionError> for ProgramError {
    fn from(e: AccountResolutionError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for AccountResolutionError {
    fn type_of() -> &'static str {
        "AccountResolutionError"
    }
}

impl PrintProgramError for AccountResolutionError {
    fn print<E>(&self)
    where
        E: 'static
            + std::error::Error
            + DecodeError<E>
            + PrintProgramError
            + num_traits::FromPrimitive,
    {
        match self {
            AccountResolutionError::InvalidDiscriminator => {
                msg!("Validation data does not begin with the expected discriminator")
            }
            AccountResolutionError::TruncatedTable => {
                msg!("Fewer bytes in the validation data than its entry count implies")
            }
            AccountResolutionError::InvalidSeed => {
                msg!("Seed configuration references data out of bounds or overflows its 32-byte window")
            }
            AccountResolutionError::AccountDataNotFound => {
                msg!("No data found for an account referenced by a seed configuration")
            }
            AccountResolutionError::InvalidAccountReference => {
                msg!("Entry references an account not present in the resolved list")
            }
            AccountResolutionError::SeedResolutionFailed => {
                msg!("Address could not be derived from the resolved seeds")
            }
            AccountResolutionError::IncorrectAccount => {
                msg!("Incorrect account provided")
            }
            AccountResolutionError::BufferTooSmall => {
                msg!("Provided byte buffer too small for the validation data")
            }
            AccountResolutionError::CalculationFailure => {
                msg!("Error in checked math operation")
            }
        }
    }
}
