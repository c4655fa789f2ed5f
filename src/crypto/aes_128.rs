//! The block cipher primitive: raw AES-128, one block at a time, courtesy of openssl.

use openssl::symm::{self, Crypter, Mode};

use crate::error::{LengthError, Result};

pub const BLOCK_SIZE: usize = 16;
pub const KEY_SIZE: usize = 16;

/// A keyed permutation over fixed-length blocks. Mode functions in [`super::modes`] only see
/// this trait.
pub trait BlockCipher {
    fn block_size(&self) -> usize;

    /// Encrypt exactly one block.
    ///
    /// # Errors
    ///
    /// [`LengthError`] if `block` is not [`BlockCipher::block_size`] bytes.
    fn encrypt_block(&self, block: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt exactly one block.
    ///
    /// # Errors
    ///
    /// [`LengthError`] if `block` is not [`BlockCipher::block_size`] bytes.
    fn decrypt_block(&self, block: &[u8]) -> Result<Vec<u8>>;
}

/// AES-128 with its key. Debug output never shows the key.
#[derive(Clone)]
pub struct Aes128 {
    key: [u8; KEY_SIZE],
}

impl std::fmt::Debug for Aes128 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aes128").finish_non_exhaustive()
    }
}

impl Aes128 {
    /// # Errors
    ///
    /// [`LengthError`] unless `key` is 16 bytes.
    pub fn new(key: &[u8]) -> Result<Self> {
        let key = key.try_into().map_err(|_| LengthError::Exact {
            what: "AES-128 key",
            expected: KEY_SIZE,
            actual: key.len(),
        })?;
        Ok(Aes128 { key })
    }

    pub fn new_random() -> Self {
        let mut key = [0; KEY_SIZE];
        key.copy_from_slice(&super::gen_random_bytes(KEY_SIZE));
        Aes128 { key }
    }

    fn crypt_block(&self, block: &[u8], mode: Mode) -> Result<Vec<u8>> {
        if block.len() != BLOCK_SIZE {
            return Err(LengthError::Exact {
                what: "AES block",
                expected: BLOCK_SIZE,
                actual: block.len(),
            }
            .into());
        }

        // always use ECB with padding off: chaining and padding are done by hand in `modes`
        let openssl_cipher = symm::Cipher::aes_128_ecb();
        let mut crypter = Crypter::new(openssl_cipher, mode, &self.key, None)?;
        crypter.pad(false);

        let mut out = vec![0; BLOCK_SIZE + openssl_cipher.block_size()];
        let mut count = crypter.update(block, &mut out)?;
        count += crypter.finalize(&mut out[count..])?;
        out.truncate(count);

        Ok(out)
    }
}

impl BlockCipher for Aes128 {
    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    fn encrypt_block(&self, block: &[u8]) -> Result<Vec<u8>> {
        self.crypt_block(block, Mode::Encrypt)
    }

    fn decrypt_block(&self, block: &[u8]) -> Result<Vec<u8>> {
        self.crypt_block(block, Mode::Decrypt)
    }
}
