//! BIP173 bech32 encoding for witness version 0 addresses.
//!
//! The codec itself is `bitcoin::bech32`; this module maps its errors onto
//! [`DecodeError`] so decoding reports the exact defect (mixed case, bad
//! character, checksum with the expected and received values).

use bitcoin::bech32::primitives::decode::{
    CharError, ChecksumError, UncheckedHrpstring, UncheckedHrpstringError,
};
use bitcoin::bech32::primitives::hrp;
use bitcoin::bech32::segwit::{self, EncodeError};
use bitcoin::bech32::{Bech32, Fe32, Fe32IterExt, Hrp};

use crate::error::DecodeError;

const CHECKSUM_LEN: usize = 6;
const MAX_LEN: usize = 90;
const MIN_LEN: usize = 8;

/// Encodes a version 0 witness program under `hrp`. The output is lowercase.
pub fn encode_segwit(hrp: &str, program: &[u8]) -> Result<String, DecodeError> {
    let hrp = Hrp::parse(hrp).map_err(|e| hrp_error(hrp, e))?;
    segwit::encode_v0(hrp, program).map_err(|e| match e {
        EncodeError::TooLong(len) => DecodeError::InvalidLength(len.0),
        _ => DecodeError::InvalidWitnessProgram(program.len()),
    })
}

/// Decodes a segregated witness address and returns its lowercase HRP,
/// witness version and program.
///
/// Only witness version 0 with a 20- or 32-byte program is accepted.
pub fn decode_segwit(s: &str) -> Result<(String, u8, Vec<u8>), DecodeError> {
    if s.len() < MIN_LEN || s.len() > MAX_LEN {
        return Err(DecodeError::InvalidLength(s.len()));
    }
    for (pos, ch) in s.chars().enumerate() {
        if !(33..=126).contains(&(ch as u32)) {
            return Err(DecodeError::InvalidCharacter { ch, pos });
        }
    }

    let unchecked = UncheckedHrpstring::new(s).map_err(|e| parse_error(s, e))?;
    match unchecked.validate_checksum::<Bech32>() {
        Ok(()) => {}
        Err(ChecksumError::InvalidResidue) => return Err(checksum_mismatch(&unchecked)),
        Err(_) => return Err(DecodeError::InvalidLength(s.len())),
    }

    let mut checked = unchecked.remove_checksum::<Bech32>();
    let hrp = checked.hrp().to_lowercase();
    let &first = checked
        .data_part_ascii_no_checksum()
        .first()
        .ok_or(DecodeError::InvalidLength(0))?;
    let version = Fe32::from_char_unchecked(first).to_u8();
    if version != 0 {
        return Err(DecodeError::UnsupportedWitnessVersion(version));
    }
    checked.remove_witness_version();
    checked
        .validate_segwit_padding()
        .map_err(|_| DecodeError::InvalidPadding)?;

    let program: Vec<u8> = checked.byte_iter().collect();
    if program.len() != 20 && program.len() != 32 {
        return Err(DecodeError::InvalidWitnessProgram(program.len()));
    }
    Ok((hrp, version, program))
}

/// Recomputes the checksum over the received data so the error can show
/// both values.
fn checksum_mismatch(unchecked: &UncheckedHrpstring<'_>) -> DecodeError {
    let data = unchecked.data_part_ascii();
    let (body, received) = data.split_at(data.len() - CHECKSUM_LEN);
    let hrp = unchecked.hrp();
    let encoded: String = body
        .iter()
        .map(|&b| Fe32::from_char_unchecked(b))
        .with_checksum::<Bech32>(&hrp)
        .chars()
        .collect();
    DecodeError::Bech32Checksum {
        expected: encoded[encoded.len() - CHECKSUM_LEN..].to_string(),
        actual: received
            .iter()
            .map(|&b| char::from(b).to_ascii_lowercase())
            .collect(),
    }
}

fn parse_error(s: &str, e: UncheckedHrpstringError) -> DecodeError {
    match e {
        UncheckedHrpstringError::Char(CharError::MissingSeparator) => DecodeError::MissingSeparator,
        UncheckedHrpstringError::Char(CharError::MixedCase) => DecodeError::MixedCase,
        // The codec scans from the right, so the offending character is the
        // last occurrence of `ch`.
        UncheckedHrpstringError::Char(CharError::InvalidChar(ch)) => DecodeError::InvalidCharacter {
            ch,
            pos: s.rfind(ch).unwrap_or_default(),
        },
        UncheckedHrpstringError::Hrp(e) => hrp_error(s, e),
        _ => DecodeError::InvalidLength(s.len()),
    }
}

fn hrp_error(s: &str, e: hrp::Error) -> DecodeError {
    match e {
        hrp::Error::MixedCase => DecodeError::MixedCase,
        hrp::Error::NonAsciiChar(ch) => DecodeError::InvalidCharacter {
            ch,
            pos: s.chars().position(|c| c == ch).unwrap_or_default(),
        },
        hrp::Error::InvalidAsciiByte(b) => DecodeError::InvalidCharacter {
            ch: char::from(b),
            pos: s.bytes().position(|c| c == b).unwrap_or_default(),
        },
        _ => DecodeError::InvalidLength(s.len()),
    }
}
