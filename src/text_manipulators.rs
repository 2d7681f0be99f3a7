use regex::Regex;
use scraper::ElementRef;

pub fn extract_text(node: ElementRef) -> String {
    node.text().collect::<String>()
}

/// Collapses whitespace runs (markup indentation, `&nbsp;`) into single
/// spaces and trims the ends.
pub struct TextNormaliser {
    whitespace: Regex,
}

impl TextNormaliser {
    pub fn new() -> anyhow::Result<Self> {
        let whitespace = Regex::new(r"[\s\u{a0}]+")?;
        Ok(Self { whitespace })
    }

    pub fn normalise(&self, raw: &str) -> String {
        self.whitespace.replace_all(raw, " ").trim().to_string()
    }

    pub fn element_text(&self, node: ElementRef) -> String {
        self.normalise(&extract_text(node))
    }
}

/// `<source_base>/<page_number>`, tolerating a trailing slash on the base.
pub fn get_paginated_listing_url(source_base: &str, page: u32) -> String {
    format!("{}/{}", source_base.trim_end_matches('/'), page)
}
