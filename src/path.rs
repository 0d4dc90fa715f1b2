//! Textual derivation paths.
//!
//! Grammar: an optional leading `m`, then `/`-separated segments. A segment is a decimal
//! `u32`, optionally followed by `h`, `H` or `'` to harden it. `0h/1/2'` and `m/0h/1/2h`
//! parse to the same path.
//!
//! An unsuffixed index at or above [`HARDENED_OFFSET`] is taken verbatim as an already
//! hardened index. Adding a hardening suffix to such an index is an error: it would leave
//! the 32-bit index space.

use bitcoin::bip32::{ChildNumber, DerivationPath};

use crate::error::{Result, SsmError};

pub const HARDENED_OFFSET: u32 = 1 << 31;

/// Moves `index` into the hardened half of the index space.
pub fn harden(index: u32) -> Option<u32> {
    if index >= HARDENED_OFFSET {
        None
    } else {
        Some(index + HARDENED_OFFSET)
    }
}

pub fn parse(text: &str) -> Result<DerivationPath> {
    let trimmed = text.trim();
    let body = match trimmed.strip_prefix('m') {
        Some("") => return Err(SsmError::invalid_path(text, "path is empty")),
        Some(rest) => rest
            .strip_prefix('/')
            .ok_or_else(|| SsmError::invalid_path(text, "expected '/' after 'm'"))?,
        None => trimmed,
    };
    if body.is_empty() {
        return Err(SsmError::invalid_path(text, "path is empty"));
    }

    body.split('/')
        .map(|segment| parse_segment(text, segment))
        .collect::<Result<Vec<_>>>()
        .map(DerivationPath::from)
}

fn parse_segment(path: &str, segment: &str) -> Result<ChildNumber> {
    let (digits, hardened) = match segment.strip_suffix(['h', 'H', '\'']) {
        Some(digits) => (digits, true),
        None => (segment, false),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SsmError::invalid_path(
            path,
            format!("segment {segment:?} is not a number"),
        ));
    }
    let index: u32 = digits.parse().map_err(|_| {
        SsmError::invalid_path(path, format!("segment {segment:?} overflows 32 bits"))
    })?;

    let raw = if hardened {
        harden(index).ok_or_else(|| {
            SsmError::invalid_path(path, format!("index {index} cannot be hardened"))
        })?
    } else {
        index
    };
    Ok(ChildNumber::from(raw))
}
