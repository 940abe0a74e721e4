//! Reimplementations of the identifier-derivation routines from RimWorld's
//! `Verse` namespace. Interop requires matching the game's output bit for
//! bit, so these iterate UTF-16 code units (C# string semantics) and use
//! wrapping 32-bit arithmetic rather than anything more natural in Rust.

use crate::diag::Diagnostics;

/// `Verse.GenText.StableStringHash`: seed 23, `num = num * 31 + c` over each
/// UTF-16 code unit, with 32-bit wraparound.
pub fn stable_string_hash(s: &str) -> i32 {
    let mut num: i32 = 23;
    for unit in s.encode_utf16() {
        num = num.wrapping_mul(31).wrapping_add(i32::from(unit));
    }
    num
}

/// `Verse.ModMetaData.ModMetaDataInternal.ConvertToASCII`: every code unit
/// that is not an ASCII letter or digit folds to `(c % 25) + 65`, landing in
/// `A`..=`Y`. This folds ASCII punctuation too; the game does the same.
pub fn convert_to_ascii(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for unit in s.encode_utf16() {
        if is_ascii_letter_or_digit(unit) {
            out.push(unit as u8 as char);
        } else {
            out.push(((unit % 25) as u8 + 65) as char);
        }
    }
    out
}

fn is_ascii_letter_or_digit(c: u16) -> bool {
    (0x30..=0x39).contains(&c) || (0x41..=0x5a).contains(&c) || (0x61..=0x7a).contains(&c)
}

/// Substitute-identifier synthesis from `TryParsePackageId`, used when a
/// descriptor carries no `<packageId/>`. When the description is empty the
/// literal `"none"` leaks into the folded author part; that is a RimWorld
/// bug reproduced intentionally.
pub fn synthesize_package_id(
    name: &str,
    author: Option<&str>,
    description: Option<&str>,
    diag: &mut Diagnostics,
) -> String {
    let author = match author {
        Some(author) if !author.is_empty() => author,
        _ => {
            diag.error(
                name,
                "no <author/> found while generating substitute <packageId/>",
            );
            ""
        }
    };

    let salt = match description {
        Some(description) if !description.is_empty() => {
            // The game hashes the description with Windows line endings.
            let normalized = description.replace('\n', "\r\n");
            let digits = stable_string_hash(&normalized).unsigned_abs().to_string();
            let len = digits.len().min(3);
            digits[..len].to_string()
        }
        _ => {
            diag.error(
                name,
                "no <description/> found while generating substitute <packageId/>",
            );
            "none".to_string()
        }
    };

    let package_id = format!(
        "{}.{}",
        convert_to_ascii(&format!("{author}{salt}")),
        convert_to_ascii(name)
    );
    diag.warn(name, format!("no <packageId/> found; generated {package_id}"));
    package_id
}
