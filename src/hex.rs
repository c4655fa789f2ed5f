use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum HexError {
    #[error("invalid hex digit {0:?}")]
    InvalidDigit(char),
    #[error("hex input has odd length {0}")]
    OddLength(usize),
}

pub fn hex_encode<B: AsRef<[u8]>>(data: B, upper: bool) -> String {
    data.as_ref()
        .iter()
        .flat_map(|byte| [byte >> 4, byte & 0b0000_1111])
        .map(|nibble| {
            if nibble < 10 {
                b'0' + nibble
            } else if upper {
                b'A' + nibble - 10
            } else {
                b'a' + nibble - 10
            }
        })
        .map(char::from)
        .collect()
}

fn map_to_nibble(c: u8) -> Result<u8, HexError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(HexError::InvalidDigit(char::from(c))),
    }
}

/// Decodes a hex string. Both cases are accepted.
///
/// # Errors
///
/// Returns [`HexError`] if `data` has an odd length or contains a non-hex character.
pub fn hex_decode<B: AsRef<[u8]>>(data: B) -> Result<Vec<u8>, HexError> {
    let data = data.as_ref();
    if data.len() % 2 != 0 {
        return Err(HexError::OddLength(data.len()));
    }

    data.chunks_exact(2)
        .map(|pair| -> Result<u8, HexError> {
            Ok(map_to_nibble(pair[0])? << 4 | map_to_nibble(pair[1])?)
        })
        .collect()
}
