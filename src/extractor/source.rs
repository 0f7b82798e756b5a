use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

/// A selector string that could not be turned into a query.
#[derive(Debug, Clone, Error)]
#[error("cannot query {selector:?}: {reason}")]
pub struct QueryError {
    pub selector: String,
    pub reason: String,
}

/// What the locator needs from a document: a container probe and a scoped
/// attribute-substring text lookup. Markup shape is otherwise unknown.
pub trait AddressSource {
    /// Does an element with the given id exist anywhere in the document?
    fn has_container(&self, id: &str) -> Result<bool, QueryError>;

    /// Text of the first element whose `data-bind` value contains `needle`,
    /// searched inside the element identified by `scope` when given,
    /// document-wide otherwise. `None` means no matching element.
    fn role_text(&self, scope: Option<&str>, needle: &str) -> Result<Option<String>, QueryError>;
}

/// A parsed listing page backed by `scraper`'s error-tolerant HTML parser.
pub struct HtmlPage {
    doc: Html,
}

impl HtmlPage {
    pub fn parse(html: &str) -> Self {
        Self {
            doc: Html::parse_document(html),
        }
    }
}

impl AddressSource for HtmlPage {
    fn has_container(&self, id: &str) -> Result<bool, QueryError> {
        let sel = container_selector(id)?;
        Ok(self.doc.select(&sel).next().is_some())
    }

    fn role_text(&self, scope: Option<&str>, needle: &str) -> Result<Option<String>, QueryError> {
        let sel = role_selector(needle)?;
        let hit = match scope {
            Some(id) => {
                let container = container_selector(id)?;
                self.doc
                    .select(&container)
                    .next()
                    .and_then(|c| c.select(&sel).next())
            }
            None => self.doc.select(&sel).next(),
        };
        Ok(hit.map(element_text))
    }
}

fn container_selector(id: &str) -> Result<Selector, QueryError> {
    build_selector(format!("#{id}"))
}

fn role_selector(needle: &str) -> Result<Selector, QueryError> {
    build_selector(format!(r#"span[data-bind*="{needle}"]"#))
}

fn build_selector(raw: String) -> Result<Selector, QueryError> {
    let reason = match Selector::parse(&raw) {
        Ok(sel) => return Ok(sel),
        Err(e) => e.to_string(),
    };
    Err(QueryError { selector: raw, reason })
}

/// Element text with whitespace runs collapsed and ends trimmed. Nested
/// markup inside the element contributes its text nodes in order.
fn element_text(el: ElementRef) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <span id="propertyAddress">
            <span data-bind="PropertyDetails.City">Tulsa</span>
          </span>
          <span data-bind="PropertyDetails.Address">
            5904
            E 7 St
          </span>
          <span data-bind="PropertyDetails.City">Broken Arrow</span>
        </body></html>
    "#;

    #[test]
    fn container_probe() {
        let page = HtmlPage::parse(PAGE);
        assert!(page.has_container("propertyAddress").unwrap());
        assert!(!page.has_container("somethingElse").unwrap());
    }

    #[test]
    fn scoped_query_stays_inside_container() {
        let page = HtmlPage::parse(PAGE);
        let city = page
            .role_text(Some("propertyAddress"), "PropertyDetails.City")
            .unwrap();
        assert_eq!(city.as_deref(), Some("Tulsa"));
    }

    #[test]
    fn unscoped_query_sees_whole_document() {
        let page = HtmlPage::parse(PAGE);
        let street = page
            .role_text(None, "PropertyDetails.Address")
            .unwrap();
        assert_eq!(street.as_deref(), Some("5904 E 7 St"));
    }

    #[test]
    fn scoped_miss_is_none_not_error() {
        let page = HtmlPage::parse(PAGE);
        let zip = page
            .role_text(Some("propertyAddress"), "PropertyDetails.Zip")
            .unwrap();
        assert_eq!(zip, None);
    }

    #[test]
    fn substring_match_on_data_bind() {
        let html = r#"<span data-bind="ko: PropertyDetails.Zip, visible: true">74112</span>"#;
        let page = HtmlPage::parse(html);
        let zip = page.role_text(None, "PropertyDetails.Zip").unwrap();
        assert_eq!(zip.as_deref(), Some("74112"));
    }

    #[test]
    fn bad_container_id_is_query_error() {
        let page = HtmlPage::parse(PAGE);
        let err = page.has_container("").unwrap_err();
        assert_eq!(err.selector, "#");
    }
}
