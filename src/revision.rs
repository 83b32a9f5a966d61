//! PCB revision text ⇄ (major, sub-revision nibble).
//!
//! `"3a"` is major revision 3 with sub-revision `a`. Sub-revisions are
//! the letters `a..=o`, stored as nibble values 1..=15; 0 means "none" and
//! renders as the literal `"0"`.

use crate::error::{EepromError, Result};

const REV_A_OFFSET: u8 = b'a' - 1;
/// Highest sub-revision a nibble can hold (`'o'`).
pub const MAX_SUB_REVISION: u8 = 0x0F;

/// Split a revision string into its decimal major part and sub-revision
/// nibble. Anything after the sub-revision letter is ignored.
pub fn parse_revision(text: &str) -> Result<(u32, u8)> {
    let digits = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let major = text[..digits]
        .parse::<u32>()
        .map_err(|_| EepromError::MalformedRevision(text.to_string()))?;

    let sub = match text[digits..].chars().next() {
        None => 0,
        Some(c) if c.is_ascii_lowercase() => c as u8 - REV_A_OFFSET,
        Some(_) => return Err(EepromError::MalformedRevision(text.to_string())),
    };
    if sub > MAX_SUB_REVISION {
        return Err(EepromError::MalformedRevision(text.to_string()));
    }
    Ok((major, sub))
}

/// Render a sub-revision nibble: `0` → `"0"`, `1..=15` → `"a"..="o"`.
pub fn render_sub_revision(nibble: u8) -> Result<String> {
    match nibble {
        0 => Ok("0".to_string()),
        1..=MAX_SUB_REVISION => Ok(((nibble + REV_A_OFFSET) as char).to_string()),
        _ => Err(EepromError::OutOfBounds {
            field: "sub-revision",
            value: nibble as u64,
            max:   MAX_SUB_REVISION as u64,
        }),
    }
}

/// Human form of a full revision: `"3a"`, or just `"3"` without a
/// sub-revision.
pub fn format_revision(major: u8, sub: u8) -> String {
    match render_sub_revision(sub) {
        Ok(letter) if sub != 0 => format!("{major}{letter}"),
        _ => major.to_string(),
    }
}
