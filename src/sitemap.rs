use anyhow::{Context, Result};
use regex::Regex;
use tracing::info;

/// Fetch a sitemap and return its page URLs, keeping only those matching
/// `filter` when one is given.
pub async fn fetch_page_urls(sitemap_url: &str, filter: Option<&str>) -> Result<Vec<String>> {
    let filter = filter
        .map(Regex::new)
        .transpose()
        .context("Invalid URL filter pattern")?;

    info!("Fetching sitemap: {}", sitemap_url);
    let xml = crate::fetch::client()?
        .get(sitemap_url)
        .send()
        .await?
        .text()
        .await
        .context("Failed to fetch sitemap")?;

    let all_urls = parse_urlset(&xml)?;
    info!("Total URLs in sitemap: {}", all_urls.len());

    let filtered: Vec<String> = match &filter {
        Some(re) => all_urls.into_iter().filter(|u| re.is_match(u)).collect(),
        None => all_urls,
    };
    info!("Listing pages after filtering: {}", filtered.len());
    Ok(filtered)
}

/// Parse a urlset XML and return all <loc> URLs.
fn parse_urlset(xml: &str) -> Result<Vec<String>> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_str(xml);
    let mut urls = Vec::new();
    let mut in_loc = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"loc" => in_loc = true,
            Ok(Event::End(e)) if e.name().as_ref() == b"loc" => in_loc = false,
            Ok(Event::Text(e)) if in_loc => {
                let url = e.unescape()?.trim().to_string();
                if !url.is_empty() {
                    urls.push(url);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(urls)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>https://example.com/listing/1</loc></url>
          <url>
            <loc>https://example.com/listing/2</loc>
            <lastmod>2024-11-02</lastmod>
          </url>
          <url><loc>https://example.com/agents/jane</loc></url>
        </urlset>"#;

    #[test]
    fn parses_loc_urls() {
        let urls = parse_urlset(URLSET).unwrap();
        assert_eq!(urls.len(), 3);
        assert_eq!(urls[0], "https://example.com/listing/1");
        assert_eq!(urls[2], "https://example.com/agents/jane");
    }

    #[test]
    fn escaped_entities_unescaped() {
        let xml = "<urlset><url><loc>https://example.com/search?a=1&amp;b=2</loc></url></urlset>";
        let urls = parse_urlset(xml).unwrap();
        assert_eq!(urls, vec!["https://example.com/search?a=1&b=2"]);
    }

    #[test]
    fn empty_urlset() {
        let urls = parse_urlset("<urlset></urlset>").unwrap();
        assert!(urls.is_empty());
    }
}
