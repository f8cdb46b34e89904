//! 26-character, creation-time-orderable identifiers for `lore_entries.id`.
//!
//! Grounded in the pack's use of the `ulid` crate for the same purpose
//! (`DecapodLabs-decapod`'s broker mints intent ids with `Ulid::new()`).

use ulid::Ulid;

/// Generate a new id: 26 characters, Crockford base32, lexicographically
/// sortable by creation time.
pub fn new_id() -> String {
    Ulid::new().to_string()
}

/// `true` if `s` has the shape of a ULID (26 Crockford-base32 characters).
/// Used to distinguish a caller-supplied raw id from a session reference or
/// a fuzzy content match in [`crate::session::SessionRegistry`].
pub fn looks_like_id(s: &str) -> bool {
    s.len() == 26 && s.parse::<Ulid>().is_ok()
}
