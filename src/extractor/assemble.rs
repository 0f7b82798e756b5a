use std::sync::LazyLock;

use regex::Regex;

use super::locate::Fields;

// Joining omitted fields can leave a space stranded before a comma.
static SPACE_BEFORE_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+,").unwrap());

/// Compose the canonical "Street, City, ST ZIP" line from cleaned fields.
/// Any subset may be empty; present fields keep their separators, absent
/// ones drop out along with the separator. Empty when nothing is present.
pub fn compose(fields: &Fields) -> String {
    let locality = join_present(&[&fields.city, &fields.state], ", ");
    let tail = join_present(&[&locality, &fields.zip], " ");
    let full = join_present(&[&fields.street, &tail], ", ");
    SPACE_BEFORE_COMMA.replace_all(&full, ",").into_owned()
}

fn join_present(parts: &[&str], sep: &str) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(sep)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(street: &str, city: &str, state: &str, zip: &str) -> Fields {
        Fields {
            street: street.into(),
            city: city.into(),
            state: state.into(),
            zip: zip.into(),
        }
    }

    #[test]
    fn full_address() {
        let f = fields("5904 E 7 St", "Tulsa", "OK", "74112");
        assert_eq!(compose(&f), "5904 E 7 St, Tulsa, OK 74112");
    }

    #[test]
    fn city_and_state_only() {
        let f = fields("", "Tulsa", "OK", "");
        assert_eq!(compose(&f), "Tulsa, OK");
    }

    #[test]
    fn street_only() {
        let f = fields("5904 E 7 St", "", "", "");
        assert_eq!(compose(&f), "5904 E 7 St");
    }

    #[test]
    fn zip_only() {
        let f = fields("", "", "", "74112");
        assert_eq!(compose(&f), "74112");
    }

    #[test]
    fn street_and_zip() {
        let f = fields("5904 E 7 St", "", "", "74112");
        assert_eq!(compose(&f), "5904 E 7 St, 74112");
    }

    #[test]
    fn state_and_zip() {
        let f = fields("", "", "OK", "74112");
        assert_eq!(compose(&f), "OK 74112");
    }

    #[test]
    fn street_city_zip_without_state() {
        let f = fields("5904 E 7 St", "Tulsa", "", "74112");
        assert_eq!(compose(&f), "5904 E 7 St, Tulsa 74112");
    }

    #[test]
    fn all_empty_composes_empty() {
        assert_eq!(compose(&Fields::default()), "");
    }

    #[test]
    fn no_separator_artifacts_for_any_subset() {
        let values = ["5904 E 7 St", "Tulsa", "OK", "74112"];
        for mask in 0u8..16 {
            let f = fields(
                if mask & 1 != 0 { values[0] } else { "" },
                if mask & 2 != 0 { values[1] } else { "" },
                if mask & 4 != 0 { values[2] } else { "" },
                if mask & 8 != 0 { values[3] } else { "" },
            );
            let full = compose(&f);
            assert!(!full.contains(" ,"), "stray space-comma in {full:?}");
            assert!(!full.contains(",,"), "doubled comma in {full:?}");
            assert!(!full.contains("  "), "doubled space in {full:?}");
            assert_eq!(full.trim(), full, "untrimmed output {full:?}");
            for (i, v) in values.iter().enumerate() {
                assert_eq!(
                    full.contains(v),
                    mask & (1 << i) != 0,
                    "field presence mismatch in {full:?}"
                );
            }
        }
    }
}
