//! Slug generation and validation.

/// Maximum length of a post slug (and title).
pub const MAX_SLUG_LEN: usize = 250;

/// Convert free text into a URL-safe slug.
///
/// Lowercases the input, drops every character that is not ASCII
/// alphanumeric, `_`, `-` or whitespace, collapses runs of whitespace and
/// hyphens into a single hyphen, and strips leading/trailing `-` and `_`.
/// Non-ASCII characters are dropped rather than transliterated.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else if c == '-' || c.is_whitespace() {
            pending_separator = true;
        }
    }

    let mut slug = slug.trim_matches(|c| c == '-' || c == '_').to_string();
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        slug = slug.trim_end_matches('-').to_string();
    }
    slug
}

/// Whether `value` matches the slug path segment grammar `[-a-zA-Z0-9_]+`.
pub fn is_slug(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
