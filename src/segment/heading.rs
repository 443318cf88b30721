//! Heading detection and article name derivation.
//!
//! A heading candidate is a line indented by exactly five spaces whose first
//! token is an all-caps word of two or more letters (`АТЕХ`, `БРАНКОВИЧ`,
//! `LIBER`), optionally preceded by an abbreviation prefix such as `Д-р`.

use std::sync::LazyLock;

use regex::Regex;

/// Leading indent that marks a heading line.
pub const HEADING_INDENT: &str = "     ";

static RE_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {5}(?:(?:Д-р|Dr\.)\s+)?\p{Lu}{2,}[\p{Lu}\-]*").unwrap()
});

static RE_MARKER_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*[@*]+\s*.*").unwrap());

static RE_PAREN_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\(.*").unwrap());

static RE_DASH_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+-\s+.*").unwrap());

static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Whether `line` has the shape of an article heading.
///
/// This says nothing about context: the segmenter additionally requires two
/// blank lines before a candidate before treating it as a boundary.
pub fn is_heading_candidate(line: &str) -> bool {
    RE_HEADING.is_match(line)
}

/// Derive the slug name of an article from its heading line.
///
/// Drops the indent and any trailing annotation (`@`/`*` markers, a
/// parenthesised year range, a ` - description` suffix), then joins the
/// remaining words with `-`.
pub fn derive_name(line: &str) -> String {
    let body = line.strip_prefix(HEADING_INDENT).unwrap_or(line);
    let body = RE_MARKER_SUFFIX.replace(body, "");
    let body = RE_PAREN_SUFFIX.replace(&body, "");
    let body = RE_DASH_SUFFIX.replace(&body, "");
    let joined = RE_WHITESPACE.replace_all(body.trim(), "-");
    joined
        .trim_end_matches('-')
        .replace(['/', '\\'], "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_all_caps_headings() {
        assert!(is_heading_candidate("     АТЕХ - частный случай"));
        assert!(is_heading_candidate("     БРАНКОВИЧ АВРАМ (1651-1689)"));
        assert!(is_heading_candidate("     LIBER COSRI"));
        assert!(is_heading_candidate("     Д-р СУК ИСАЙЛО"));
        assert!(is_heading_candidate("     Dr. SUK"));
        assert!(is_heading_candidate("     КАГАН-БЕК"));
    }

    #[test]
    fn rejects_non_headings() {
        // Single capital letter.
        assert!(!is_heading_candidate("     А также"));
        // Capitalised but not all caps.
        assert!(!is_heading_candidate("     Атех"));
        // Wrong indent.
        assert!(!is_heading_candidate("    АТЕХ"));
        assert!(!is_heading_candidate("      АТЕХ"));
        assert!(!is_heading_candidate("АТЕХ"));
        assert!(!is_heading_candidate(""));
    }

    #[test]
    fn name_drops_dash_description() {
        assert_eq!(derive_name("     АТЕХ - частный случай"), "АТЕХ");
    }

    #[test]
    fn name_drops_year_range() {
        assert_eq!(
            derive_name("     БРАНКОВИЧ АВРАМ (1651-1689)"),
            "БРАНКОВИЧ-АВРАМ"
        );
    }

    #[test]
    fn name_drops_markers() {
        assert_eq!(derive_name("     КАГАН @ * см. также"), "КАГАН");
        assert_eq!(derive_name("     КАГАН*"), "КАГАН");
    }

    #[test]
    fn name_keeps_prefix_and_hyphens() {
        assert_eq!(derive_name("     Д-р СУК ИСАЙЛО"), "Д-р-СУК-ИСАЙЛО");
        assert_eq!(derive_name("     Dr. SUK"), "Dr.-SUK");
        assert_eq!(derive_name("     КАГАН-БЕК"), "КАГАН-БЕК");
    }

    #[test]
    fn name_strips_trailing_separators() {
        assert_eq!(derive_name("     ХАЗАРЫ -"), "ХАЗАРЫ");
        assert_eq!(derive_name("     ХАЗАРЫ   "), "ХАЗАРЫ");
    }
}
