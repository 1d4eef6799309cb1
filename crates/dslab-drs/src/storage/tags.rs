//! Storage tag matching.

/// Returns true if every required tag is present among available tags.
///
/// Empty requirements always match, while non-empty requirements never match empty available tags.
pub fn matches<R: AsRef<str>, A: AsRef<str>>(required: &[R], available: &[A]) -> bool {
    required
        .iter()
        .all(|tag| available.iter().any(|other| other.as_ref() == tag.as_ref()))
}

/// Same as [`matches`] for optional lists, absent list is treated as empty.
pub fn matches_opt<R: AsRef<str>, A: AsRef<str>>(required: Option<&[R]>, available: Option<&[A]>) -> bool {
    matches(required.unwrap_or(&[]), available.unwrap_or(&[]))
}
