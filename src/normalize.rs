//! Canonical form for free-text vehicle body identifiers.
//!
//! Bus taps and realization records spell the same vehicle differently
//! (`b12`, `B-012`, ` B 12x`). Both sides of the route join go through
//! [`normalize_body_no`] so they meet on the same `LLL-DDD` key.

/// Maps a body identifier to its canonical `LLL-DDD` form.
///
/// The value is uppercased and trimmed, then the first run of ASCII letters
/// and the first run of ASCII digits are taken independently of each other.
/// Letters are cut to three characters and digits are zero-padded to at
/// least three. When either run is absent, the uppercased and trimmed value
/// is returned as is. Missing input stays missing.
pub fn normalize_body_no(value: Option<&str>) -> Option<String> {
    let cleaned = value?.trim().to_uppercase();

    match (
        first_run(&cleaned, |c| c.is_ascii_alphabetic()),
        first_run(&cleaned, |c| c.is_ascii_digit()),
    ) {
        (Some(letters), Some(digits)) => {
            let prefix: String = letters.chars().take(3).collect();
            Some(format!("{prefix}-{digits:0>3}"))
        }
        _ => Some(cleaned),
    }
}

/// Returns the first maximal run of characters matching `class`.
fn first_run(s: &str, class: impl Fn(char) -> bool) -> Option<&str> {
    let start = s.find(|c: char| class(c))?;
    let rest = &s[start..];
    let len = rest.find(|c: char| !class(c)).unwrap_or(rest.len());
    Some(&rest[..len])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(s: &str) -> String {
        normalize_body_no(Some(s)).unwrap()
    }

    #[test]
    fn test_missing_stays_missing() {
        assert_eq!(normalize_body_no(None), None);
    }

    #[test]
    fn test_first_runs_only() {
        assert_eq!(norm(" b123-9x "), "B-123");
    }

    #[test]
    fn test_pads_and_truncates() {
        assert_eq!(norm("trj7"), "TRJ-007");
        assert_eq!(norm("TRANS 45"), "TRA-045");
        assert_eq!(norm("ab-12345"), "AB-12345");
    }

    #[test]
    fn test_digits_before_letters() {
        assert_eq!(norm("12 bus"), "BUS-012");
    }

    #[test]
    fn test_single_class_unchanged() {
        assert_eq!(norm("7788"), "7788");
        assert_eq!(norm(" depot "), "DEPOT");
        assert_eq!(norm(""), "");
        assert_eq!(norm("--"), "--");
    }

    #[test]
    fn test_idempotent() {
        for s in [
            " b123-9x ",
            "trj7",
            "12 bus",
            "7788",
            "depot",
            "",
            "ABCD-0001",
            "x.1.y.2",
            "mw 010 a",
        ] {
            let once = norm(s);
            assert_eq!(norm(&once), once, "not idempotent for {s:?}");
        }
    }
}
