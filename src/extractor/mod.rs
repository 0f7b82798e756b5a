pub mod assemble;
pub mod locate;
pub mod normalize;
pub mod source;

use thiserror::Error;

pub use locate::Fields;
pub use source::{AddressSource, HtmlPage, QueryError};

/// One successful extraction. `full_address` is non-empty and derived from
/// the four fields; an individual field is empty when it was not captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub url: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub full_address: String,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    /// Every role came back empty.
    #[error("Could not find address fields on the page.")]
    NoFields,
    /// The document could not be queried at all.
    #[error("{0}")]
    Query(#[from] QueryError),
}

/// Three-stage pipeline: locate raw fragments → clean each → compose the
/// canonical line. Read-only on the page and deterministic; every failure
/// surfaces as the error variant, callers never see a partial success.
pub fn extract_address<S: AddressSource>(page: &S, url: &str) -> Result<Capture, ExtractError> {
    let raw = locate::locate_fields(page)?;
    let fields = normalize::clean_fields(&raw);
    let full_address = assemble::compose(&fields);
    if full_address.is_empty() {
        return Err(ExtractError::NoFields);
    }
    Ok(Capture {
        url: url.to_string(),
        street: fields.street,
        city: fields.city,
        state: fields.state,
        zip: fields.zip,
        full_address,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn page(fixture: &str) -> HtmlPage {
        let html =
            std::fs::read_to_string(format!("tests/fixtures/{}.html", fixture)).unwrap();
        HtmlPage::parse(&html)
    }

    #[test]
    fn listing_full_address() {
        let c = extract_address(&page("listing"), "https://example.com/listing/1").unwrap();
        assert_eq!(c.street, "5904 E 7 St");
        assert_eq!(c.city, "Tulsa");
        assert_eq!(c.state, "OK");
        assert_eq!(c.zip, "74112");
        assert_eq!(c.full_address, "5904 E 7 St, Tulsa, OK 74112");
        assert_eq!(c.url, "https://example.com/listing/1");
    }

    #[test]
    fn street_outside_container_recovered() {
        let c = extract_address(&page("scattered"), "https://example.com/listing/2").unwrap();
        assert_eq!(c.street, "1201 S Boston Ave");
        assert_eq!(c.full_address, "1201 S Boston Ave, Tulsa, OK 74119");
    }

    #[test]
    fn page_without_container() {
        let c = extract_address(&page("unwrapped"), "https://example.com/listing/3").unwrap();
        assert_eq!(c.full_address, "36 W Main St, Jenks, OK 74037");
    }

    #[test]
    fn partial_fields_degrade() {
        let c = extract_address(&page("sparse"), "https://example.com/listing/4").unwrap();
        assert_eq!(c.street, "");
        assert_eq!(c.zip, "");
        assert_eq!(c.full_address, "Tulsa, OK");
    }

    #[test]
    fn no_fields_is_failure_with_fixed_message() {
        let err = extract_address(&page("blank"), "https://example.com/other").unwrap_err();
        assert!(matches!(err, ExtractError::NoFields));
        assert_eq!(err.to_string(), "Could not find address fields on the page.");
    }

    #[test]
    fn extraction_is_idempotent() {
        let p = page("listing");
        let first = extract_address(&p, "https://example.com/listing/1").unwrap();
        let second = extract_address(&p, "https://example.com/listing/1").unwrap();
        assert_eq!(first, second);
    }
}
