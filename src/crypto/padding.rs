//! PKCS#7 padding.

use crate::error::PaddingError;

/// Pad `data` to a multiple of `block_size`. Padding is never empty: already-aligned data gets a
/// full block of `block_size` bytes.
pub fn pad_pkcs7(data: &mut Vec<u8>, block_size: usize) {
    assert!(
        (1..=255).contains(&block_size),
        "PKCS#7 block size must be in 1..=255, got {block_size}"
    );
    let pad_len = block_size - data.len() % block_size;
    #[allow(clippy::cast_possible_truncation)]
    data.resize(data.len() + pad_len, pad_len as u8);
}

/// Strip PKCS#7 padding from `data`, leaving it untouched on error.
///
/// # Errors
///
/// Fails if `data` is empty, the last byte `k` is outside `1..=block_size`, or the final `k`
/// bytes are not all `k`.
pub fn unpad_pkcs7(data: &mut Vec<u8>, block_size: usize) -> Result<(), PaddingError> {
    let pad_len = *data.last().ok_or(PaddingError::Empty)?;

    if pad_len == 0 || usize::from(pad_len) > block_size {
        return Err(PaddingError::OutOfRange {
            value: pad_len,
            block_size,
        });
    }
    if usize::from(pad_len) > data.len() {
        return Err(PaddingError::Overrun {
            value: pad_len,
            len: data.len(),
        });
    }

    let unpadded_len = data.len() - usize::from(pad_len);
    if !data[unpadded_len..].iter().all(|&x| x == pad_len) {
        return Err(PaddingError::Inconsistent { value: pad_len });
    }

    data.truncate(unpadded_len);
    Ok(())
}
