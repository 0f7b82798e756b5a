use std::sync::LazyLock;

use regex::Regex;

use super::locate::Fields;

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static COMMA_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",+").unwrap());

/// Clean one raw fragment: whitespace runs to a single space, comma runs to
/// a single comma, then trim. Total; garbage in, empty string out.
pub fn clean(raw: &str) -> String {
    let spaced = WHITESPACE_RUN.replace_all(raw, " ");
    let decommaed = COMMA_RUN.replace_all(&spaced, ",");
    decommaed.trim().to_string()
}

/// Clean each role independently.
pub fn clean_fields(raw: &Fields) -> Fields {
    Fields {
        street: clean(&raw.street),
        city: clean(&raw.city),
        state: clean(&raw.state),
        zip: clean(&raw.zip),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(clean("5904  E\t7\n St"), "5904 E 7 St");
    }

    #[test]
    fn collapses_comma_runs_and_trims() {
        assert_eq!(clean("  Tulsa,,  "), "Tulsa,");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(clean(""), "");
        assert_eq!(clean("   \n\t "), "");
    }

    #[test]
    fn idempotent() {
        for raw in ["  Tulsa,,  ", "a ,, b", ",,,", "already clean", ""] {
            let once = clean(raw);
            assert_eq!(clean(&once), once, "not a fixpoint for {raw:?}");
        }
    }

    #[test]
    fn fields_cleaned_independently() {
        let raw = Fields {
            street: " 5904  E 7 St ".into(),
            city: "Tulsa,,".into(),
            state: "\nOK".into(),
            zip: String::new(),
        };
        let cleaned = clean_fields(&raw);
        assert_eq!(cleaned.street, "5904 E 7 St");
        assert_eq!(cleaned.city, "Tulsa,");
        assert_eq!(cleaned.state, "OK");
        assert_eq!(cleaned.zip, "");
    }
}
