//! Room slugs.
//!
//! A slug is the stable, URL-safe identifier in an owner's room link
//! (`https://rooms.example.com/alice`). Slugs are derived once, when the
//! owner account is created, and validated on every routed request before
//! anything touches the store.
//!
//! # Shape
//!
//! 1-50 characters of `[a-z0-9-]`, starting and ending with an alphanumeric.

/// Maximum slug length accepted by routing.
pub const MAX_SLUG_LEN: usize = 50;

/// Literal used when neither the display name nor the email yields anything.
pub const FALLBACK_SLUG: &str = "user";

/// Longest base slug produced by [`normalize`].
///
/// Leaves room for a numeric collision suffix of up to four digits.
pub const MAX_BASE_SLUG_LEN: usize = MAX_SLUG_LEN - 4;

/// Derive a base slug from an owner's display name and email.
///
/// The display name is preferred; the local part of the email is used when
/// the display name normalizes to nothing, and [`FALLBACK_SLUG`] when both do.
/// A punctuation-only display name therefore yields the email local part.
///
/// ```rust
/// use common::slug::normalize;
///
/// assert_eq!(normalize("John", "john@example.com"), "john");
/// assert_eq!(normalize("", "Jane.Doe+1@example.com"), "jane-doe-1");
/// assert_eq!(normalize("", ""), "user");
/// ```
#[must_use]
pub fn normalize(display_name: &str, email: &str) -> String {
    let local_part = email.split('@').next().unwrap_or_default();

    [display_name, local_part]
        .iter()
        .map(|candidate| slugify(candidate))
        .find(|slug| !slug.is_empty())
        .unwrap_or_else(|| FALLBACK_SLUG.to_string())
}

/// Lowercase, replace every run of non-alphanumerics with one hyphen, and
/// strip hyphens from both ends.
fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_separator = false;

    for c in input.trim().chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }

    if slug.len() > MAX_BASE_SLUG_LEN {
        slug.truncate(MAX_BASE_SLUG_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }

    slug
}

/// Pick the first free slug for `base`.
///
/// Returns `base` itself when `exists(base)` is false, otherwise the first of
/// `base2`, `base3`, ... that is free. Terminates because the set of taken
/// slugs is finite at call time. When a suffix would push the slug past
/// [`MAX_SLUG_LEN`], the base is shortened to make room.
///
/// ```rust
/// use common::slug::allocate;
/// use std::collections::HashSet;
///
/// let taken: HashSet<&str> = ["john", "john2", "john3"].into_iter().collect();
/// assert_eq!(allocate("john", |s| taken.contains(s)), "john4");
/// assert_eq!(allocate("alice", |s| taken.contains(s)), "alice");
/// ```
#[must_use]
pub fn allocate<F>(base: &str, exists: F) -> String
where
    F: Fn(&str) -> bool,
{
    if !exists(base) {
        return base.to_string();
    }

    (2u64..)
        .map(|n| with_suffix(base, n))
        .find(|candidate| !exists(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// `base` followed by `n`, cut so the result stays within [`MAX_SLUG_LEN`].
fn with_suffix(base: &str, n: u64) -> String {
    let suffix = n.to_string();
    let room = MAX_SLUG_LEN.saturating_sub(suffix.len());
    let stem = base.get(..room).unwrap_or(base).trim_end_matches('-');
    format!("{stem}{suffix}")
}

/// Check that `slug` has the routable shape.
///
/// Must be called before any store lookup keyed by a user-supplied slug.
#[must_use]
pub fn is_valid_slug(slug: &str) -> bool {
    let bytes = slug.as_bytes();

    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };

    bytes.len() <= MAX_SLUG_LEN
        && first.is_ascii_alphanumeric()
        && last.is_ascii_alphanumeric()
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_normalize_uses_display_name() {
        assert_eq!(normalize("John", "john@x.com"), "john");
        assert_eq!(normalize("  Mary Ann  ", "m@x.com"), "mary-ann");
    }

    #[test]
    fn test_normalize_collapses_separators() {
        assert_eq!(normalize("José -- García!!", "x@x.com"), "jos-garc-a");
        assert_eq!(normalize("--a__b--", "x@x.com"), "a-b");
    }

    #[test]
    fn test_normalize_falls_back_to_email_local_part() {
        assert_eq!(normalize("", "Jane.Doe+1@x.com"), "jane-doe-1");
        assert_eq!(normalize("!!!", "bob@x.com"), "bob");
    }

    #[test]
    fn test_normalize_falls_back_to_literal() {
        assert_eq!(normalize("", ""), FALLBACK_SLUG);
        assert_eq!(normalize("???", "@x.com"), FALLBACK_SLUG);
    }

    #[test]
    fn test_normalize_truncates_long_names() {
        let long_name = "a".repeat(80);
        let slug = normalize(&long_name, "x@x.com");
        assert_eq!(slug.len(), MAX_BASE_SLUG_LEN);
        assert!(is_valid_slug(&slug));
    }

    #[test]
    fn test_normalize_truncation_never_ends_with_hyphen() {
        // 45 letters, a separator, then more letters: the cut lands on the hyphen
        let name = format!("{} {}", "a".repeat(45), "b".repeat(10));
        let slug = normalize(&name, "x@x.com");
        assert!(!slug.ends_with('-'));
        assert!(is_valid_slug(&slug));
    }

    #[test]
    fn test_allocate_appends_first_free_suffix() {
        let existing: HashSet<&str> = ["john", "john2", "john3"].into_iter().collect();
        assert_eq!(allocate("john", |s| existing.contains(s)), "john4");
    }

    #[test]
    fn test_allocate_keeps_long_slugs_within_limit() {
        let base = "a".repeat(MAX_BASE_SLUG_LEN);
        let slug = allocate(&base, |s| !s.ends_with("10000"));
        assert_eq!(slug.len(), MAX_SLUG_LEN);
        assert!(slug.ends_with("10000"));
        assert!(is_valid_slug(&slug));

        let full = format!("{}-b", "x".repeat(MAX_SLUG_LEN - 2));
        let slug = allocate(&full, |s| s == full);
        assert_eq!(slug, format!("{}2", "x".repeat(MAX_SLUG_LEN - 2)));
        assert!(is_valid_slug(&slug));
    }

    #[test]
    fn test_allocate_returns_base_when_free() {
        let existing: HashSet<&str> = HashSet::new();
        assert_eq!(allocate("alice", |s| existing.contains(s)), "alice");
    }

    #[test]
    fn test_allocate_fills_gaps_from_two() {
        let existing: HashSet<&str> = ["john", "john3"].into_iter().collect();
        assert_eq!(allocate("john", |s| existing.contains(s)), "john2");
    }

    #[test]
    fn test_valid_slugs() {
        for slug in ["a", "alice", "john4", "mary-ann", "a-b-c", "9lives"] {
            assert!(is_valid_slug(slug), "{slug} should be valid");
        }
        assert!(is_valid_slug(&"a".repeat(MAX_SLUG_LEN)));
    }

    #[test]
    fn test_invalid_slugs() {
        for slug in [
            "",
            "Not Valid!",
            "Alice",
            "-alice",
            "alice-",
            "al_ice",
            "al.ice",
            "ålice",
            "../etc",
        ] {
            assert!(!is_valid_slug(slug), "{slug:?} should be invalid");
        }
        assert!(!is_valid_slug(&"a".repeat(MAX_SLUG_LEN + 1)));
    }
}
