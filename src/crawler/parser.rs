//! Link extraction from HTML and CSS bodies
//!
//! This module finds every reference a stored resource makes to another
//! resource:
//! - Navigation links and form targets in HTML
//! - Page assets (stylesheets, scripts, images, media, frames)
//! - `url(...)` and `@import` references in CSS, inline styles and `<style>` blocks
//!
//! Extraction never fails. Broken markup is parsed the way a browser would
//! and the parser's complaints come back as diagnostics.

use crate::crawler::css::css_references;
use crate::state::ResourceKind;
use crate::url::is_fetchable_reference;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use url::Url;

/// Element/attribute pairs whose value is a single reference
const REFERENCE_ATTRIBUTES: &[(&str, &str)] = &[
    ("a[href]", "href"),
    ("area[href]", "href"),
    ("link[href]", "href"),
    ("script[src]", "src"),
    ("img[src]", "src"),
    ("iframe[src]", "src"),
    ("frame[src]", "src"),
    ("embed[src]", "src"),
    ("audio[src]", "src"),
    ("video[src]", "src"),
    ("source[src]", "src"),
    ("track[src]", "src"),
    ("form[action]", "action"),
    ("video[poster]", "poster"),
];

/// Links found in one resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Distinct references, exactly as written in the document
    pub links: BTreeSet<String>,

    /// Parser complaints about malformed markup
    pub diagnostics: Vec<String>,

    /// URL relative references resolve against (`<base href>` if present)
    pub base: Option<Url>,
}

impl Extraction {
    /// Returns the effective base, falling back to the resource's own URL
    pub fn base_or<'a>(&'a self, resource_url: &'a Url) -> &'a Url {
        self.base.as_ref().unwrap_or(resource_url)
    }
}

/// Extracts the references of a fetched body
///
/// # Arguments
///
/// * `body` - The raw bytes of the resource
/// * `url` - The URL the body was served from
/// * `kind` - The classified kind; only HTML and CSS carry links
///
/// # Example
///
/// ```
/// use rewind::crawler::extract;
/// use rewind::ResourceKind;
/// use url::Url;
///
/// let html = br#"<a href="/about">About</a><img src="logo.png">"#;
/// let url = Url::parse("https://example.com/").unwrap();
/// let extraction = extract(html, &url, ResourceKind::Html);
/// assert!(extraction.links.contains("/about"));
/// assert!(extraction.links.contains("logo.png"));
/// ```
pub fn extract(body: &[u8], url: &Url, kind: ResourceKind) -> Extraction {
    let text = String::from_utf8_lossy(body);

    match kind {
        ResourceKind::Html => extract_html(&text, url),
        ResourceKind::Css => Extraction {
            links: css_links(&text),
            ..Default::default()
        },
        _ => Extraction::default(),
    }
}

fn extract_html(text: &str, url: &Url) -> Extraction {
    let document = Html::parse_document(text);
    let mut links = BTreeSet::new();

    for (selector, attribute) in REFERENCE_ATTRIBUTES {
        for element in select(&document, selector) {
            if let Some(value) = element.value().attr(attribute) {
                add_link(&mut links, value);
            }
        }
    }

    for element in select(&document, "img[srcset], source[srcset]") {
        if let Some(srcset) = element.value().attr("srcset") {
            for candidate in srcset_urls(srcset) {
                add_link(&mut links, candidate);
            }
        }
    }

    for element in select(&document, "[style]") {
        if let Some(style) = element.value().attr("style") {
            links.extend(css_links(style));
        }
    }

    for element in select(&document, "style") {
        let css: String = element.text().collect();
        links.extend(css_links(&css));
    }

    Extraction {
        links,
        diagnostics: document.errors.iter().map(|e| e.to_string()).collect(),
        base: document_base(&document, url),
    }
}

/// Resolves the document's `<base href>`, if it has a usable one
pub fn document_base(document: &Html, url: &Url) -> Option<Url> {
    select(document, "base[href]")
        .into_iter()
        .next()
        .and_then(|base| base.value().attr("href"))
        .and_then(|href| url.join(href.trim()).ok())
        .filter(|base| matches!(base.scheme(), "http" | "https"))
}

/// Splits a `srcset` value into its candidate URLs
pub fn srcset_urls(srcset: &str) -> impl Iterator<Item = &str> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
}

fn select<'a>(document: &'a Html, selector: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(selector) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn css_links(text: &str) -> BTreeSet<String> {
    let mut links = BTreeSet::new();
    for reference in css_references(text) {
        add_link(&mut links, &reference.value);
    }
    links
}

fn add_link(links: &mut BTreeSet<String>, raw: &str) {
    let raw = raw.trim();
    if is_fetchable_reference(raw) {
        links.insert(raw.to_string());
    }
}
