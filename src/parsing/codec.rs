//! Decoder for the compressed matrix cells shipped in Lucid key bundles.
//!
//! Each taxon's score row and each (character, taxon) measurement is stored as an
//! LZ-string payload in its base64 form. The payload expands to UTF-16 text:
//!
//! - score rows are one code unit per character, `'0'`-based (`"0124"` is `[0, 1, 2, 4]`)
//! - measurements are colon-delimited decimals (`"mean:5:10"`)
//!
//! Decoding is pure: the same payload always yields the same output, and a bad payload
//! yields a [`CodecError`] for that cell alone.

use thiserror::Error;

use crate::utils::validation::{parse_measure_field, MAX_DECODED_UNITS};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Empty payload")]
    Empty,

    #[error("Invalid base64 character {found:?} at position {position}")]
    InvalidCharacter { found: char, position: usize },

    #[error("Payload ended before the end-of-stream marker")]
    Truncated,

    #[error("Dictionary reference {code} is out of range (dictionary size {size})")]
    BadReference { code: usize, size: usize },

    #[error("Decoded payload exceeds {MAX_DECODED_UNITS} code units")]
    TooLarge,

    #[error("Decoded payload is not valid UTF-16 text")]
    InvalidText,
}

/// The 65-symbol alphabet; `=` pads and decodes as 64
const BASE64_ALPHABET: &[u8; 65] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/=";

/// Each base64 symbol carries 6 bits, read most significant first
const SYMBOL_HIGH_BIT: u32 = 32;

/// Offset between a score code unit and its integer code (`'0'`)
const SCORE_CODE_BASE: i32 = 48;

fn symbol_value(byte: u8, position: usize) -> Result<u32, CodecError> {
    BASE64_ALPHABET
        .iter()
        .position(|&b| b == byte)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or(CodecError::InvalidCharacter {
            found: char::from(byte),
            position,
        })
}

/// Reads little-endian bit groups out of the symbol stream
struct BitReader<'a> {
    input: &'a [u8],
    value: u32,
    mask: u32,
    index: usize,
}

impl<'a> BitReader<'a> {
    fn new(input: &'a [u8]) -> Result<Self, CodecError> {
        let first = input.first().ok_or(CodecError::Empty)?;
        Ok(Self {
            input,
            value: symbol_value(*first, 0)?,
            mask: SYMBOL_HIGH_BIT,
            index: 1,
        })
    }

    /// Reading past the end yields zero bits; callers detect truncation via `exhausted`
    fn next_symbol(&mut self) -> Result<u32, CodecError> {
        let value = match self.input.get(self.index) {
            Some(&byte) => symbol_value(byte, self.index)?,
            None => 0,
        };
        self.index += 1;
        Ok(value)
    }

    fn read(&mut self, width: u32) -> Result<u32, CodecError> {
        let mut bits = 0;
        for shift in 0..width {
            let set = self.value & self.mask != 0;
            self.mask >>= 1;
            if self.mask == 0 {
                self.mask = SYMBOL_HIGH_BIT;
                self.value = self.next_symbol()?;
            }
            if set {
                bits |= 1 << shift;
            }
        }
        Ok(bits)
    }

    fn exhausted(&self) -> bool {
        self.index > self.input.len()
    }
}

/// Decompress an LZ-string base64 payload into UTF-16 code units.
///
/// # Errors
///
/// Returns a [`CodecError`] if the payload contains a character outside the alphabet,
/// ends before its end-of-stream marker, references a dictionary entry that does not
/// exist, expands past [`MAX_DECODED_UNITS`], or decodes to nothing.
pub fn decompress_from_base64(input: &str) -> Result<Vec<u16>, CodecError> {
    let mut reader = BitReader::new(input.as_bytes())?;

    // Codes 0, 1 and 2 are reserved: literal byte, literal u16, end of stream
    let mut dictionary: Vec<Vec<u16>> = vec![Vec::new(); 3];
    let mut enlarge_in: u32 = 4;
    let mut num_bits: u32 = 3;

    let first = match reader.read(2)? {
        0 => reader.read(8)?,
        1 => reader.read(16)?,
        _ => return Err(CodecError::Empty),
    };
    #[allow(clippy::cast_possible_truncation)] // read(16) never exceeds u16
    let first = first as u16;
    dictionary.push(vec![first]);
    let mut previous = vec![first];
    let mut output = vec![first];

    loop {
        if reader.exhausted() {
            return Err(CodecError::Truncated);
        }

        let mut code = reader.read(num_bits)? as usize;
        match code {
            0 | 1 => {
                let width = if code == 0 { 8 } else { 16 };
                #[allow(clippy::cast_possible_truncation)]
                let literal = reader.read(width)? as u16;
                dictionary.push(vec![literal]);
                code = dictionary.len() - 1;
                enlarge_in -= 1;
            }
            2 => return Ok(output),
            _ => {}
        }

        if enlarge_in == 0 {
            enlarge_in = 1 << num_bits;
            num_bits += 1;
        }

        let entry = if code < dictionary.len() {
            dictionary[code].clone()
        } else if code == dictionary.len() {
            let mut entry = previous.clone();
            entry.push(previous[0]);
            entry
        } else {
            return Err(CodecError::BadReference {
                code,
                size: dictionary.len(),
            });
        };

        output.extend_from_slice(&entry);
        if output.len() > MAX_DECODED_UNITS {
            return Err(CodecError::TooLarge);
        }

        let mut grown = previous;
        grown.push(entry[0]);
        dictionary.push(grown);
        enlarge_in -= 1;
        previous = entry;

        if enlarge_in == 0 {
            enlarge_in = 1 << num_bits;
            num_bits += 1;
        }
        if num_bits > 31 {
            return Err(CodecError::TooLarge);
        }
    }
}

/// Decode one taxon's score row: one integer code per character, in declaration order.
///
/// # Errors
///
/// Returns a [`CodecError`] if the payload cannot be decompressed.
pub fn decode_scores(payload: &str) -> Result<Vec<i32>, CodecError> {
    let units = decompress_from_base64(payload)?;
    Ok(units
        .into_iter()
        .map(|unit| i32::from(unit) - SCORE_CODE_BASE)
        .collect())
}

/// Decode one (character, taxon) measurement: colon-delimited decimals.
///
/// Element 0 is a label or qualifier; the remaining elements bound the observed range.
/// Fields that are not numbers decode as NaN.
///
/// # Errors
///
/// Returns a [`CodecError`] if the payload cannot be decompressed or is not text.
pub fn decode_measures(payload: &str) -> Result<Vec<f64>, CodecError> {
    let units = decompress_from_base64(payload)?;
    let text = String::from_utf16(&units).map_err(|_| CodecError::InvalidText)?;
    Ok(text.split(':').map(parse_measure_field).collect())
}
