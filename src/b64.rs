use thiserror::Error;

const BASE64_PAD: u8 = b'=';

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum Base64Error {
    #[error("invalid base64 character {0:?} at index {1}")]
    InvalidCharacter(char, usize),
    #[error("misplaced padding at index {0}")]
    InvalidPadding(usize),
}

enum B64Sextet {
    Pad,
    Sextet(u8),
    Invalid,
}

impl B64Sextet {
    fn from_char(c: u8) -> Self {
        match c {
            BASE64_PAD => B64Sextet::Pad,
            b'A'..=b'Z' => B64Sextet::Sextet(c - b'A'),
            b'a'..=b'z' => B64Sextet::Sextet(c - b'a' + 26),
            b'0'..=b'9' => B64Sextet::Sextet(c - b'0' + 52),
            b'+' => B64Sextet::Sextet(62),
            b'/' => B64Sextet::Sextet(63),
            _ => B64Sextet::Invalid,
        }
    }
}

/// Decodes standard (`+/`, `=`-padded) base64.
///
/// # Errors
///
/// Returns [`Base64Error`] on characters outside the alphabet or padding anywhere other than
/// the final one or two positions of a partial group.
pub fn base64_decode<B: AsRef<[u8]>>(data: B) -> Result<Vec<u8>, Base64Error> {
    let data = data.as_ref();
    let mut out: Vec<u8> = Vec::with_capacity(data.len() * 3 / 4);
    // bits still owed to the last byte in `out`: 0, 6, 4 or 2
    let mut bit_pos = 0usize;
    let mut pad_count = 0usize;

    for (idx, &byte) in data.iter().enumerate() {
        match B64Sextet::from_char(byte) {
            B64Sextet::Invalid => {
                return Err(Base64Error::InvalidCharacter(char::from(byte), idx));
            }
            B64Sextet::Sextet(_) if pad_count > 0 => {
                return Err(Base64Error::InvalidPadding(idx));
            }
            B64Sextet::Sextet(s) => {
                if let (Some(last), true) = (out.last_mut(), bit_pos != 0) {
                    *last |= s >> (bit_pos - 2);
                }
                match bit_pos {
                    0 => {
                        out.push(s << 2);
                        bit_pos = 6;
                    }
                    6 => {
                        out.push(s << 4);
                        bit_pos = 4;
                    }
                    4 => {
                        out.push(s << 6);
                        bit_pos = 2;
                    }
                    _ => bit_pos = 0,
                }
            }
            B64Sextet::Pad => {
                if idx + 2 < data.len() {
                    return Err(Base64Error::InvalidPadding(idx));
                }
                pad_count += 1;
            }
        }
    }

    match (pad_count, bit_pos) {
        (0, _) => {}
        // one pad closes a 3-sextet group, two close a 2-sextet group; either way the last
        // pushed byte holds only leftover zero bits
        (1, 2) | (2, 4) => {
            out.pop();
        }
        _ => return Err(Base64Error::InvalidPadding(data.len() - pad_count)),
    }

    Ok(out)
}
