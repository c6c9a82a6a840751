//! XML name validation
//!
//! Names matter twice in a scan: schema element and attribute names must be
//! writable into the generated document, and taint markers must be usable as
//! element or attribute names when a rule injects them into name positions.

use once_cell::sync::Lazy;
use regex::Regex;

// Simplified XML Name production, ASCII plus Latin-1 letters
static NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}][A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\-\.0-9\u{B7}]*$")
        .unwrap()
});

/// Check if a string is a valid NCName (non-colonized name)
pub fn is_valid_ncname(name: &str) -> bool {
    !name.is_empty() && NAME.is_match(name)
}

/// Check if a string is a valid QName (qualified name)
pub fn is_valid_qname(name: &str) -> bool {
    if let Some((prefix, local)) = name.split_once(':') {
        is_valid_ncname(prefix) && is_valid_ncname(local)
    } else {
        is_valid_ncname(name)
    }
}

/// Check whether a marker can appear as an element or attribute name and as a
/// host name label. Markers are restricted to lowercase ASCII letters and digits,
/// starting with a letter.
pub fn is_marker_safe(marker: &str) -> bool {
    let mut chars = marker.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        }
        _ => false,
    }
}
