//! Encryption oracles: black boxes that sandwich attacker input between hidden bytes and hand
//! back only the ciphertext.
//!
//! The attack in [`super::attack`] sees nothing but [`EncryptionOracle`]. The key, prefix and
//! suffix of an [`AffixingOracle`] are private to this module.

use rand::Rng;

use super::{
    aes_128::{Aes128, BLOCK_SIZE},
    gen_random_bytes,
    modes::{encrypt_cbc, encrypt_ecb},
};
use crate::error::Result;

pub trait EncryptionOracle {
    /// Encrypt attacker-chosen `input` and return the ciphertext.
    ///
    /// # Errors
    ///
    /// Whatever the oracle's cipher reports. Attacks abort on the first failure.
    fn query(&self, input: &[u8]) -> Result<Vec<u8>>;
}

impl<O: EncryptionOracle + ?Sized> EncryptionOracle for &O {
    fn query(&self, input: &[u8]) -> Result<Vec<u8>> {
        (**self).query(input)
    }
}

/// Adapts a plain query function into an [`EncryptionOracle`].
pub struct OracleFn<F>(pub F);

impl<F> EncryptionOracle for OracleFn<F>
where
    F: Fn(&[u8]) -> Result<Vec<u8>>,
{
    fn query(&self, input: &[u8]) -> Result<Vec<u8>> {
        (self.0)(input)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleMode {
    /// Deterministic: the same input always yields the same ciphertext.
    Ecb,
    /// A fresh random IV on every query. The ECB attack cannot work against this.
    CbcRandomIv,
}

/// Encrypts `prefix || input || suffix` under a key fixed at construction.
pub struct AffixingOracle {
    mode: OracleMode,
    cipher: Aes128,
    prefix: Vec<u8>,
    suffix: Vec<u8>,
}

impl std::fmt::Debug for AffixingOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffixingOracle")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl AffixingOracle {
    /// # Errors
    ///
    /// [`crate::error::LengthError`] unless `key` is 16 bytes.
    pub fn new_ecb(key: &[u8], prefix: Vec<u8>, suffix: Vec<u8>) -> Result<Self> {
        Ok(AffixingOracle {
            mode: OracleMode::Ecb,
            cipher: Aes128::new(key)?,
            prefix,
            suffix,
        })
    }

    /// ECB under a random key, with a random prefix of 0 to 47 bytes in front of the input.
    pub fn new_random_ecb(suffix: Vec<u8>) -> Self {
        let prefix_len = rand::thread_rng().gen_range(0..3 * BLOCK_SIZE);
        AffixingOracle {
            mode: OracleMode::Ecb,
            cipher: Aes128::new_random(),
            prefix: gen_random_bytes(prefix_len),
            suffix,
        }
    }

    /// CBC under a random key, drawing a new IV for every query.
    pub fn new_random_cbc(prefix: Vec<u8>, suffix: Vec<u8>) -> Self {
        AffixingOracle {
            mode: OracleMode::CbcRandomIv,
            cipher: Aes128::new_random(),
            prefix,
            suffix,
        }
    }

    pub fn mode(&self) -> OracleMode {
        self.mode
    }
}

impl EncryptionOracle for AffixingOracle {
    fn query(&self, input: &[u8]) -> Result<Vec<u8>> {
        let affixed = [self.prefix.as_slice(), input, &self.suffix].concat();
        match self.mode {
            OracleMode::Ecb => encrypt_ecb(&self.cipher, &affixed),
            OracleMode::CbcRandomIv => {
                encrypt_cbc(&self.cipher, &affixed, &gen_random_bytes(BLOCK_SIZE))
            }
        }
    }
}
