//! URL slug helpers shared by products and insights posts.

/// Turns a title into a lowercase, dash-separated ASCII slug.
///
/// Runs of anything other than ASCII letters and digits become a single `-`.
/// A title with no usable characters yields `"item"`.
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "item".to_string()
    } else {
        slug
    }
}

/// The `attempt`-th candidate for `base`: `base`, `base-2`, `base-3`, ...
#[must_use]
pub fn candidate(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{base}-{attempt}")
    }
}
