//! ASCII folding for printer-safe text
//!
//! The printer speaks plain ASCII, so every character must map to something
//! printable. Processing order per character:
//!
//! 1. ASCII passes through unchanged
//! 2. Unicode-to-ASCII transliteration (`unidecode`)
//! 3. If transliteration comes back empty, the character's canonical
//!    Unicode name in bracket notation, e.g. `[SNOWMAN WITHOUT SNOW]`
//! 4. `[x]` when no name resolves either
//!
//! No character is ever skipped.

use std::fmt::Write;

/// Fold arbitrary text into printable ASCII
pub fn ascii_fold(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii() {
            out.push(c);
            continue;
        }
        let transliterated = unidecode::unidecode_char(c);
        // Text::Unidecode marks unmapped characters as "[?]"
        if !transliterated.is_empty() && transliterated != "[?]" {
            out.push_str(transliterated);
        } else if let Some(name) = unicode_names2::name(c) {
            let _ = write!(out, "[{}]", name);
        } else {
            out.push_str("[x]");
        }
    }
    out
}
