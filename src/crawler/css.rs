//! Reference scanning for CSS text
//!
//! Used both when extracting links from stylesheets and `<style>` blocks and
//! when rewriting those references during replay. Each match reports the byte
//! range of the reference itself (inside any quotes) so that callers can
//! splice a replacement in while leaving everything else untouched.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static CSS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^\s"')]*))\s*\)"#)
        .expect("CSS url() pattern is valid")
});

static CSS_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)@import\s+(?:"([^"]*)"|'([^']*)')"#)
        .expect("CSS @import pattern is valid")
});

/// One reference found in CSS text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssReference {
    /// Byte range of the reference within the scanned text
    pub range: Range<usize>,

    /// The reference as written
    pub value: String,
}

/// Finds every `url(...)` and quoted `@import` target, in source order
pub fn css_references(text: &str) -> Vec<CssReference> {
    let mut refs = Vec::new();

    for regex in [&*CSS_URL, &*CSS_IMPORT] {
        for caps in regex.captures_iter(text) {
            let found = (1..caps.len()).find_map(|i| caps.get(i));
            if let Some(m) = found {
                if !m.as_str().trim().is_empty() {
                    refs.push(CssReference {
                        range: m.range(),
                        value: m.as_str().to_string(),
                    });
                }
            }
        }
    }

    refs.sort_by_key(|r| r.range.start);
    refs
}
