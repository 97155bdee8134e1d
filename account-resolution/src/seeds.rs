//! Types for the seed configurations packed into an entry's 32-byte address
//! config.
//!
//! Configs are packed back-to-back: a one-byte discriminator, then the fields
//! of that variant. A zero discriminator ends the sequence early; otherwise
//! decoding stops at the end of the window.

use {crate::error::AccountResolutionError, solana_program::program_error::ProgramError};

/// Enum to describe a required seed for a derived address
#[derive(Clone, Debug, PartialEq)]
pub enum Seed {
    /// Uninitialized configuration byte space
    Uninitialized,
    /// A literal hard-coded argument
    Literal {
        /// The literal value represented as a vector of bytes.
        /// For example, if a literal value is a string literal,
        /// such as "my-seed", this value would be
        /// `"my-seed".as_bytes().to_vec()`.
        bytes: Vec<u8>,
    },
    /// An argument to be resolved from the instruction data of the
    /// instruction being extended, not the hook's own data
    InstructionArg {
        /// The offset where the bytes of the argument begin
        offset: u8,
        /// The length of the argument (number of bytes)
        ///
        /// Note: Max seed length is 32 bytes, so `u8` is appropriate here
        length: u8,
    },
    /// The public key of an account from the entire accounts list, extra
    /// resolved accounts included
    AccountKey {
        /// The index of the account in the entire accounts list
        index: u8,
    },
    /// An argument to be resolved from the raw data of some account in the
    /// accounts list. The only variant whose resolution requires the
    /// account-data fetch capability.
    AccountData {
        /// The index of the account in the entire accounts list
        account_index: u8,
        /// The offset where the bytes of the argument begin within that
        /// account's data
        data_offset: u8,
        /// The length of the argument (number of bytes)
        length: u8,
    },
}

impl Seed {
    /// Get the number of bytes the packed form of a seed config occupies
    pub fn packed_len(&self) -> usize {
        match self {
            Self::Uninitialized => 0,
            // 1 for the discriminator, 1 for the length, then the raw bytes
            Self::Literal { bytes } => 1 + 1 + bytes.len(),
            // 1 for the discriminator, 1 for the offset, 1 for the length
            Self::InstructionArg { .. } => 1 + 1 + 1,
            // 1 for the discriminator, 1 for the index
            Self::AccountKey { .. } => 1 + 1,
            // 1 for the discriminator, then index, offset, length
            Self::AccountData { .. } => 1 + 1 + 1 + 1,
        }
    }

    /// Packs a seed config into a slice of exactly `packed_len` bytes
    fn pack(&self, dst: &mut [u8]) -> Result<(), ProgramError> {
        if dst.len() != self.packed_len() {
            return Err(AccountResolutionError::InvalidSeed.into());
        }
        match self {
            Self::Uninitialized => return Err(AccountResolutionError::InvalidSeed.into()),
            Self::Literal { bytes } => {
                if bytes.len() > u8::MAX as usize {
                    return Err(AccountResolutionError::InvalidSeed.into());
                }
                dst[0] = 1;
                dst[1] = bytes.len() as u8;
                dst[2..].copy_from_slice(bytes);
            }
            Self::InstructionArg { offset, length } => {
                dst[0] = 2;
                dst[1] = *offset;
                dst[2] = *length;
            }
            Self::AccountKey { index } => {
                dst[0] = 3;
                dst[1] = *index;
            }
            Self::AccountData {
                account_index,
                data_offset,
                length,
            } => {
                dst[0] = 4;
                dst[1] = *account_index;
                dst[2] = *data_offset;
                dst[3] = *length;
            }
        }
        Ok(())
    }

    /// Packs a sequence of seed configs into a 32-byte address config,
    /// zero-filling the tail. Errors if the packed forms overflow the window.
    pub fn pack_into_address_config(seeds: &[Self]) -> Result<[u8; 32], ProgramError> {
        let mut packed = [0u8; 32];
        let mut i: usize = 0;
        for seed in seeds {
            let end = i
                .checked_add(seed.packed_len())
                .ok_or::<ProgramError>(AccountResolutionError::CalculationFailure.into())?;
            if end > packed.len() {
                return Err(AccountResolutionError::InvalidSeed.into());
            }
            seed.pack(&mut packed[i..end])?;
            i = end;
        }
        Ok(packed)
    }

    /// Unpacks a single seed config from the front of a slice
    pub fn unpack(bytes: &[u8]) -> Result<Self, ProgramError> {
        let (discriminator, rest) = bytes
            .split_first()
            .ok_or::<ProgramError>(AccountResolutionError::InvalidSeed.into())?;
        match discriminator {
            0 => Ok(Self::Uninitialized),
            1 => unpack_literal(rest),
            2 => unpack_instruction_arg(rest),
            3 => unpack_account_key(rest),
            4 => unpack_account_data(rest),
            _ => Err(AccountResolutionError::InvalidSeed.into()),
        }
    }

    /// Unpacks all seed configs from a 32-byte address config, stopping at
    /// the first zero discriminator.
    ///
    /// The cursor advances by at least two bytes for every live config, so
    /// the loop is bounded by the window itself; no byte past the window is
    /// ever read.
    pub fn unpack_address_config(address_config: &[u8; 32]) -> Result<Vec<Self>, ProgramError> {
        let mut seeds = vec![];
        let mut i = 0;
        while i < address_config.len() {
            let seed = Self::unpack(&address_config[i..])?;
            if seed == Self::Uninitialized {
                break;
            }
            i += seed.packed_len();
            seeds.push(seed);
        }
        Ok(seeds)
    }

    /// Get the indices of all accounts whose raw data the given configs
    /// slice into
    pub fn account_data_indices(seeds: &[Self]) -> Vec<usize> {
        seeds
            .iter()
            .filter_map(|seed| match seed {
                Self::AccountData { account_index, .. } => Some(*account_index as usize),
                _ => None,
            })
            .collect()
    }
}

fn unpack_literal(bytes: &[u8]) -> Result<Seed, ProgramError> {
    let (length, rest) = bytes
        .split_first()
        // Should be at least 1 byte
        .ok_or::<ProgramError>(AccountResolutionError::InvalidSeed.into())?;
    let length = *length as usize;
    if rest.len() < length {
        // Should be at least `length` bytes
        return Err(AccountResolutionError::InvalidSeed.into());
    }
    Ok(Seed::Literal {
        bytes: rest[..length].to_vec(),
    })
}

fn unpack_instruction_arg(bytes: &[u8]) -> Result<Seed, ProgramError> {
    if bytes.len() < 2 {
        // Should be at least 2 bytes
        return Err(AccountResolutionError::InvalidSeed.into());
    }
    Ok(Seed::InstructionArg {
        offset: bytes[0],
        length: bytes[1],
    })
}

fn unpack_account_key(bytes: &[u8]) -> Result<Seed, ProgramError> {
    if bytes.is_empty() {
        // Should be at least 1 byte
        return Err(AccountResolutionError::InvalidSeed.into());
    }
    Ok(Seed::AccountKey { index: bytes[0] })
}

fn unpack_account_data(bytes: &[u8]) -> Result<Seed, ProgramError> {
    if bytes.len() < 3 {
        // Should be at least 3 bytes
        return Err(AccountResolutionError::InvalidSeed.into());
    }
    Ok(Seed::AccountData {
        account_index: bytes[0],
        data_offset: bytes[1],
        length: bytes[2],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_and_unpack_roundtrip() {
        let seeds = vec![
            Seed::Literal {
                bytes: b"seed_prefix".to_vec(),
            },
            Seed::InstructionArg {
                offset: 8,
                length: 8,
            },
            Seed::AccountKey { index: 3 },
            Seed::AccountData {
                account_index: 1,
                data_offset: 4,
                length: 8,
            },
        ];
        let packed = Seed::pack_into_address_config(&seeds).unwrap();
        let unpacked = Seed::unpack_address_config(&packed).unwrap();
        assert_eq!(seeds, unpacked);
    }

    #[test]
    fn unpack_literal_config() {
        // Literal "ABCD", then terminator
        let mut config = [0u8; 32];
        config[..6].copy_from_slice(&[1, 4, 0x41, 0x42, 0x43, 0x44]);
        let seeds = Seed::unpack_address_config(&config).unwrap();
        assert_eq!(
            seeds,
            vec![Seed::Literal {
                bytes: vec![0x41, 0x42, 0x43, 0x44],
            }]
        );
    }

    #[test]
    fn unpack_account_key_config() {
        let mut config = [0u8; 32];
        config[..2].copy_from_slice(&[3, 0]);
        let seeds = Seed::unpack_address_config(&config).unwrap();
        assert_eq!(seeds, vec![Seed::AccountKey { index: 0 }]);
    }

    #[test]
    fn exact_window_decodes() {
        // A literal filling the window exactly: 1 + 1 + 30 = 32
        let seeds = vec![Seed::Literal {
            bytes: vec![7; 30],
        }];
        let packed = Seed::pack_into_address_config(&seeds).unwrap();
        let unpacked = Seed::unpack_address_config(&packed).unwrap();
        assert_eq!(seeds, unpacked);
    }

    #[test]
    fn overflowing_window_fails() {
        // 31 bytes of literal would need a 33rd byte
        let seeds = vec![Seed::Literal {
            bytes: vec![7; 31],
        }];
        assert_eq!(
            Seed::pack_into_address_config(&seeds).unwrap_err(),
            AccountResolutionError::InvalidSeed.into(),
        );

        // Hand-built config declaring a literal running past the window
        let mut config = [0u8; 32];
        config[0] = 1;
        config[1] = 31;
        assert_eq!(
            Seed::unpack_address_config(&config).unwrap_err(),
            AccountResolutionError::InvalidSeed.into(),
        );
    }

    #[test]
    fn trailing_config_cut_off_fails() {
        // An account-key discriminator in the last byte has no index byte
        let mut config = [0u8; 32];
        config[31] = 3;
        assert_eq!(
            Seed::unpack_address_config(&config).unwrap_err(),
            AccountResolutionError::InvalidSeed.into(),
        );
    }

    #[test]
    fn unknown_discriminator_fails() {
        let mut config = [0u8; 32];
        config[0] = 9;
        assert_eq!(
            Seed::unpack_address_config(&config).unwrap_err(),
            AccountResolutionError::InvalidSeed.into(),
        );
    }

    #[test]
    fn account_data_indices() {
        let seeds = vec![
            Seed::AccountKey { index: 2 },
            Seed::AccountData {
                account_index: 1,
                data_offset: 0,
                length: 8,
            },
            Seed::AccountData {
                account_index: 4,
                data_offset: 32,
                length: 32,
            },
        ];
        assert_eq!(Seed::account_data_indices(&seeds), vec![1, 4]);
    }
}
