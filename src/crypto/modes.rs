//! ECB, CBC and CTR over any [`BlockCipher`]. Keys, IVs and nonces are only ever borrowed.

use std::collections::HashSet;

use super::{
    aes_128::BlockCipher,
    padding::{pad_pkcs7, unpad_pkcs7},
};
use crate::{
    bytes_ext::BytesExt,
    error::{Error, LengthError, Result},
};

fn ensure_block_multiple(what: &'static str, data: &[u8], block_size: usize) -> Result<()> {
    if data.len() % block_size == 0 {
        Ok(())
    } else {
        Err(LengthError::NotBlockMultiple {
            what,
            block_size,
            actual: data.len(),
        }
        .into())
    }
}

fn ensure_iv(iv: &[u8], block_size: usize) -> Result<()> {
    if iv.len() == block_size {
        Ok(())
    } else {
        Err(LengthError::Exact {
            what: "CBC IV",
            expected: block_size,
            actual: iv.len(),
        }
        .into())
    }
}

/// Pad, then encrypt every block independently.
///
/// # Errors
///
/// Only if the block cipher fails.
pub fn encrypt_ecb<C: BlockCipher + ?Sized>(cipher: &C, plaintext: &[u8]) -> Result<Vec<u8>> {
    let block_size = cipher.block_size();
    let mut padded_plaintext = plaintext.to_vec();
    pad_pkcs7(&mut padded_plaintext, block_size);

    let mut ciphertext = Vec::with_capacity(padded_plaintext.len());
    for block in padded_plaintext.chunks_exact(block_size) {
        ciphertext.extend_from_slice(&cipher.encrypt_block(block)?);
    }

    Ok(ciphertext)
}

/// Decrypt every block independently, then unpad.
///
/// # Errors
///
/// [`LengthError`] if the ciphertext is not whole blocks, [`crate::error::PaddingError`] if the
/// decrypted trailer is malformed.
pub fn decrypt_ecb<C: BlockCipher + ?Sized>(cipher: &C, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let block_size = cipher.block_size();
    ensure_block_multiple("ECB ciphertext", ciphertext, block_size)?;

    let mut plaintext = Vec::with_capacity(ciphertext.len());
    for block in ciphertext.chunks_exact(block_size) {
        plaintext.extend_from_slice(&cipher.decrypt_block(block)?);
    }

    unpad_pkcs7(&mut plaintext, block_size)?;
    Ok(plaintext)
}

/// # Errors
///
/// [`LengthError`] if `iv` is not exactly one block.
pub fn encrypt_cbc<C: BlockCipher + ?Sized>(
    cipher: &C,
    plaintext: &[u8],
    iv: &[u8],
) -> Result<Vec<u8>> {
    let block_size = cipher.block_size();
    ensure_iv(iv, block_size)?;

    let mut padded_plaintext = plaintext.to_vec();
    pad_pkcs7(&mut padded_plaintext, block_size);

    let mut ciphertext = Vec::with_capacity(padded_plaintext.len());
    let mut last_ciphertext_block = iv.to_vec();

    for block in padded_plaintext.chunks_exact(block_size) {
        last_ciphertext_block = cipher.encrypt_block(&block.xor(&last_ciphertext_block))?;
        ciphertext.extend_from_slice(&last_ciphertext_block);
    }

    Ok(ciphertext)
}

/// # Errors
///
/// [`LengthError`] on a bad IV or partial block, [`crate::error::PaddingError`] on a malformed
/// trailer.
pub fn decrypt_cbc<C: BlockCipher + ?Sized>(
    cipher: &C,
    ciphertext: &[u8],
    iv: &[u8],
) -> Result<Vec<u8>> {
    let block_size = cipher.block_size();
    ensure_iv(iv, block_size)?;
    ensure_block_multiple("CBC ciphertext", ciphertext, block_size)?;

    let mut plaintext = Vec::with_capacity(ciphertext.len());
    let mut prev = iv;

    for block in ciphertext.chunks_exact(block_size) {
        let mut decrypted = cipher.decrypt_block(block)?;
        decrypted.xor_in_place(prev);
        plaintext.extend_from_slice(&decrypted);
        prev = block;
    }

    unpad_pkcs7(&mut plaintext, block_size)?;
    Ok(plaintext)
}

/// CTR keystream as a pure function of the block index: block `i` is
/// `E(nonce || little-endian(i))`, where the counter fills the rest of the block.
pub struct Keystream<'a, C: ?Sized> {
    cipher: &'a C,
    nonce: &'a [u8],
}

impl<'a, C: BlockCipher + ?Sized> Keystream<'a, C> {
    /// # Errors
    ///
    /// [`LengthError`] unless the nonce leaves at least one counter byte.
    pub fn new(cipher: &'a C, nonce: &'a [u8]) -> Result<Self> {
        let block_size = cipher.block_size();
        if nonce.len() >= block_size {
            return Err(LengthError::TooLong {
                what: "CTR nonce",
                limit: block_size,
                actual: nonce.len(),
            }
            .into());
        }
        Ok(Keystream { cipher, nonce })
    }

    fn counter_len(&self) -> usize {
        self.cipher.block_size() - self.nonce.len()
    }

    /// # Errors
    ///
    /// [`Error::CounterExhausted`] if `index` does not fit in the counter bytes.
    pub fn block(&self, index: u64) -> Result<Vec<u8>> {
        let counter_len = self.counter_len();
        let counter = index.to_le_bytes();

        // counter bytes beyond what fits must be zero, otherwise the counter has wrapped
        if counter.iter().skip(counter_len).any(|&b| b != 0) {
            return Err(Error::CounterExhausted {
                blocks: 1 << (8 * counter_len),
            });
        }

        let mut input = self.nonce.to_vec();
        input.extend(counter.iter().take(counter_len));
        input.resize(self.cipher.block_size(), 0);

        self.cipher.encrypt_block(&input)
    }
}

/// XOR `data` with the CTR keystream. Encryption and decryption are the same operation, and the
/// output is exactly as long as the input.
///
/// # Errors
///
/// [`LengthError`] on an oversized nonce, [`Error::CounterExhausted`] if `data` outruns the
/// counter.
pub fn apply_ctr<C: BlockCipher + ?Sized>(
    cipher: &C,
    nonce: &[u8],
    data: &[u8],
) -> Result<Vec<u8>> {
    let keystream = Keystream::new(cipher, nonce)?;
    let mut out = Vec::with_capacity(data.len());

    for (index, chunk) in (0u64..).zip(data.chunks(cipher.block_size())) {
        let key_block = keystream.block(index)?;
        out.extend(chunk.xor(&key_block[..chunk.len()]));
    }

    Ok(out)
}

/// Determine if a ciphertext is likely ECB encrypted by looking for duplicate blocks.
///
/// A `false` means it's either not ECB, the ciphertext is too short, or the plaintext had no
/// duplicate blocks.
pub fn is_likely_ecb_encrypted(ciphertext: &[u8], block_size: usize) -> bool {
    let blocks = ciphertext.chunks_exact(block_size);
    let unique_blocks = blocks.clone().collect::<HashSet<_>>();
    blocks.len() != unique_blocks.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        b64::base64_decode,
        crypto::{aes_128::Aes128, gen_random_bytes},
        error::PaddingError,
    };

    const KEY: &[u8] = b"This is 16 bytes";
    const PLAINTEXTS: &[&[u8]] = &[
        // general
        b"My name is Ozymandias, King of Kings;\n\
        Look on my Works, ye Mighty, and despair!",
        // exactly 1 block
        b"0123456789abcdef",
        // one short of a block
        b"0123456789abcde",
        // empty
        b"",
    ];

    fn cipher() -> Aes128 {
        Aes128::new(KEY).unwrap()
    }

    #[test]
    fn test_ecb_encryption() {
        use openssl::symm::{encrypt, Cipher};

        for &plaintext in PLAINTEXTS {
            let expected = encrypt(Cipher::aes_128_ecb(), KEY, None, plaintext).unwrap();
            let actual = encrypt_ecb(&cipher(), plaintext).unwrap();

            assert_eq!(
                actual,
                expected,
                r#"plaintext: "{}""#,
                plaintext.escape_ascii()
            );
        }
    }

    #[test]
    fn test_ecb_decryption() {
        use openssl::symm::{encrypt, Cipher};

        for &plaintext in PLAINTEXTS {
            // encrypt with openssl first, so we know the ciphertext is correct
            let ciphertext = encrypt(Cipher::aes_128_ecb(), KEY, None, plaintext).unwrap();
            let actual = decrypt_ecb(&cipher(), &ciphertext).unwrap();

            assert_eq!(
                actual,
                plaintext,
                r#"plaintext: "{}""#,
                plaintext.escape_ascii()
            );
        }
    }

    #[test]
    fn test_cbc_encryption() {
        use openssl::symm::{encrypt, Cipher};

        for &plaintext in PLAINTEXTS {
            let iv = gen_random_bytes(16);
            let expected = encrypt(Cipher::aes_128_cbc(), KEY, Some(&iv), plaintext).unwrap();
            let actual = encrypt_cbc(&cipher(), plaintext, &iv).unwrap();

            assert_eq!(
                actual,
                expected,
                r#"plaintext: "{}""#,
                plaintext.escape_ascii()
            );
        }
    }

    #[test]
    fn test_cbc_decryption() {
        use openssl::symm::{encrypt, Cipher};

        for &plaintext in PLAINTEXTS {
            let iv = gen_random_bytes(16);
            let ciphertext = encrypt(Cipher::aes_128_cbc(), KEY, Some(&iv), plaintext).unwrap();
            let actual = decrypt_cbc(&cipher(), &ciphertext, &iv).unwrap();

            assert_eq!(
                actual,
                plaintext,
                r#"plaintext: "{}""#,
                plaintext.escape_ascii()
            );
        }
    }

    #[test]
    fn test_round_trips_with_random_keys() {
        for len in 0..64 {
            let cipher = Aes128::new_random();
            let plaintext = gen_random_bytes(len);
            let iv = gen_random_bytes(16);
            let nonce = gen_random_bytes(8);

            let ecb = encrypt_ecb(&cipher, &plaintext).unwrap();
            assert_eq!(ecb.len() % 16, 0);
            assert_eq!(decrypt_ecb(&cipher, &ecb).unwrap(), plaintext, "len: {len}");

            let cbc = encrypt_cbc(&cipher, &plaintext, &iv).unwrap();
            assert_eq!(cbc.len() % 16, 0);
            assert_eq!(decrypt_cbc(&cipher, &cbc, &iv).unwrap(), plaintext, "len: {len}");

            let ctr = apply_ctr(&cipher, &nonce, &plaintext).unwrap();
            assert_eq!(ctr.len(), plaintext.len());
            assert_eq!(apply_ctr(&cipher, &nonce, &ctr).unwrap(), plaintext, "len: {len}");
        }
    }

    #[test]
    fn test_deterministic() {
        let plaintext = PLAINTEXTS[0];
        let iv = [7; 16];

        assert_eq!(
            encrypt_ecb(&cipher(), plaintext).unwrap(),
            encrypt_ecb(&cipher(), plaintext).unwrap()
        );
        assert_eq!(
            encrypt_cbc(&cipher(), plaintext, &iv).unwrap(),
            encrypt_cbc(&cipher(), plaintext, &iv).unwrap()
        );
    }

    #[test]
    fn test_ecb_repeats_identical_blocks() {
        let ciphertext = encrypt_ecb(&cipher(), &[b'A'; 48]).unwrap();
        assert_eq!(ciphertext[..16], ciphertext[16..32]);
        assert!(is_likely_ecb_encrypted(&ciphertext, 16));

        let ciphertext = encrypt_cbc(&cipher(), &[b'A'; 48], &[0; 16]).unwrap();
        assert!(!is_likely_ecb_encrypted(&ciphertext, 16));
    }

    #[test]
    fn test_cbc_bit_flip_propagation() {
        let cipher = cipher();
        let iv = gen_random_bytes(16);
        // 40 bytes: three ciphertext blocks, the last holding 8 bytes of padding
        let plaintext = b"Ozymandias, King of Kings; look on my Wo".to_vec();
        let mut ciphertext = encrypt_cbc(&cipher, &plaintext, &iv).unwrap();
        assert_eq!(ciphertext.len(), 48);

        let (flip_byte, flip_mask) = (5, 0b0000_0100);
        ciphertext[flip_byte] ^= flip_mask;
        let tampered = decrypt_cbc(&cipher, &ciphertext, &iv).unwrap();

        // block 0 is scrambled, block 1 has exactly the flipped bit, block 2 is untouched
        assert_ne!(tampered[..16], plaintext[..16]);
        let mut expected_block_1 = plaintext[16..32].to_vec();
        expected_block_1[flip_byte] ^= flip_mask;
        assert_eq!(tampered[16..32], expected_block_1);
        assert_eq!(tampered[32..], plaintext[32..]);
    }

    #[test]
    fn test_decrypt_rejects_bad_padding() {
        let cipher = cipher();
        let iv = [0; 16];

        // a final block that decrypts to a trailing 0x00
        let mut bad_trailer = vec![b'X'; 15];
        bad_trailer.push(0);
        let ecb = encrypt_ecb(&cipher, &bad_trailer).unwrap();
        let err = decrypt_ecb(&cipher, &ecb[..16]).unwrap_err();
        assert!(matches!(
            err,
            Error::Padding(PaddingError::OutOfRange { value: 0, .. })
        ));

        // flip the last padding byte through the previous ciphertext block: 0x10 -> 0x11
        let mut cbc = encrypt_cbc(&cipher, b"0123456789abcdef", &iv).unwrap();
        cbc[15] ^= 0x01;
        let err = decrypt_cbc(&cipher, &cbc, &iv).unwrap_err();
        assert!(matches!(
            err,
            Error::Padding(PaddingError::OutOfRange { value: 0x11, .. })
        ));
    }

    #[test]
    fn test_length_errors() {
        let cipher = cipher();

        let err = encrypt_cbc(&cipher, b"hi", &[0; 8]).unwrap_err();
        assert!(matches!(err, Error::Length(LengthError::Exact { actual: 8, .. })));

        let err = decrypt_cbc(&cipher, &[0; 17], &[0; 16]).unwrap_err();
        assert!(matches!(
            err,
            Error::Length(LengthError::NotBlockMultiple { actual: 17, .. })
        ));

        let err = decrypt_ecb(&cipher, &[0; 20]).unwrap_err();
        assert!(matches!(
            err,
            Error::Length(LengthError::NotBlockMultiple { actual: 20, .. })
        ));

        let err = apply_ctr(&cipher, &[0; 16], b"hi").unwrap_err();
        assert!(matches!(err, Error::Length(LengthError::TooLong { actual: 16, .. })));
    }

    #[test]
    fn test_ctr_known_vector() {
        let ciphertext = base64_decode(
            "L77na/nrFsKvynd6HzOoG7GHTLXsTVu9qvY/2syLXzhPweyyMTJULu/6/kXX0KSvoOLSFQ==",
        )
        .unwrap();
        let cipher = Aes128::new(b"YELLOW SUBMARINE").unwrap();

        let plaintext = apply_ctr(&cipher, &[0; 8], &ciphertext).unwrap();
        assert_eq!(plaintext, b"Yo, VIP Let's kick it Ice, Ice, baby Ice, Ice, baby ");
    }

    #[test]
    fn test_keystream_is_random_access() {
        let cipher = cipher();
        let nonce = [9; 8];
        let keystream = Keystream::new(&cipher, &nonce).unwrap();

        let in_order = (0..8).map(|i| keystream.block(i).unwrap()).collect::<Vec<_>>();
        for i in [5, 0, 7, 3, 3, 1] {
            assert_eq!(keystream.block(i).unwrap(), in_order[i as usize], "index: {i}");
        }

        // applying CTR is XOR with the concatenated keystream blocks
        let zeros = apply_ctr(&cipher, &nonce, &[0; 128]).unwrap();
        assert_eq!(zeros, in_order.concat());
    }

    #[test]
    fn test_ctr_counter_is_little_endian() {
        let cipher = cipher();
        let keystream = Keystream::new(&cipher, &[0; 8]).unwrap();

        let mut counter_block = [0; 16];
        counter_block[8] = 0x02;
        counter_block[9] = 0x01;
        assert_eq!(
            keystream.block(0x0102).unwrap(),
            cipher.encrypt_block(&counter_block).unwrap()
        );
    }

    #[test]
    fn test_ctr_counter_exhausted() {
        let cipher = cipher();
        // one counter byte: 256 blocks, then the counter would wrap
        let nonce = [0; 15];
        let keystream = Keystream::new(&cipher, &nonce).unwrap();

        assert!(keystream.block(255).is_ok());
        assert!(matches!(
            keystream.block(256),
            Err(Error::CounterExhausted { blocks: 256 })
        ));
        assert!(apply_ctr(&cipher, &nonce, &[0; 256 * 16]).is_ok());
        assert!(matches!(
            apply_ctr(&cipher, &nonce, &[0; 256 * 16 + 1]),
            Err(Error::CounterExhausted { blocks: 256 })
        ));
    }
}
