//! Locale-aware ordering of entity names.
//!
//! Directory listings are sorted the way a reader expects from a printed index:
//! case and diacritics do not separate otherwise equal names (`ёж` sits next to
//! `еж`, `Атех` next to `атех`). Ties are broken by case-folded text and finally
//! by the raw string, so the order is total and stable across runs.

use std::cmp::Ordering;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Primary collation key: decomposed, combining marks stripped, lowercased.
pub fn primary_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    for c in name.chars() {
        // Short i is a letter of its own, not и with a mark.
        if matches!(c, 'й' | 'Й') {
            key.push('й');
            continue;
        }
        key.extend(
            std::iter::once(c)
                .nfkd()
                .filter(|d| !is_combining_mark(*d))
                .flat_map(char::to_lowercase),
        );
    }
    key
}

/// Compare two names for display order.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    primary_key(a)
        .cmp(&primary_key(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| a.cmp(b))
}

/// Sort any slice of named items by [`compare_names`].
pub fn sort_by_name<T>(items: &mut [T], name: impl Fn(&T) -> &str) {
    items.sort_by(|x, y| compare_names(name(x), name(y)));
}
