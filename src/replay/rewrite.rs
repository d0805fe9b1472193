//! Reference rewriting for replayed documents
//!
//! The rewriter scans start tags and `<style>` blocks for references and
//! splices retargeted URLs in place. Everything it does not rewrite is copied
//! byte for byte, so the output only differs from the stored document where a
//! reference was changed.

use crate::crawler::css::css_references;
use crate::state::ResourceKind;
use crate::url::{is_fetchable_reference, normalize_url};
use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::ops::Range;
use url::Url;

/// Prefix of every replay address
pub const REPLAY_PREFIX: &str = "/web/";

/// Comments, or start tags with their attribute list in group 2
static MARKUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)<!--.*?-->|<([a-zA-Z][a-zA-Z0-9:-]*)((?:\s+[^\s"'>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+))?)*)\s*/?>"#,
    )
    .expect("markup pattern is valid")
});

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .expect("attribute pattern is valid")
});

static SRCSET_CANDIDATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|,)\s*([^\s,]+)").expect("srcset pattern is valid"));

/// Attributes holding a single reference
const URL_ATTRIBUTES: &[&str] = &["href", "src", "action", "poster"];

/// Maps each link captured by a job to its kind
pub type CapturedLinks = HashMap<String, ResourceKind>;

/// Everything needed to retarget the references of one document
pub struct RewriteContext<'a> {
    pub job_id: i64,
    /// URL relative references resolve against
    pub base: &'a Url,
    pub captured: &'a CapturedLinks,
}

/// Returns the replay modifier for a kind (`im_`, `cs_`, `js_` or empty)
pub fn kind_modifier(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Image => "im_",
        ResourceKind::Css => "cs_",
        ResourceKind::Js => "js_",
        _ => "",
    }
}

/// Builds the replay address of a captured resource
///
/// # Example
///
/// ```
/// use rewind::replay::replay_path;
/// use rewind::ResourceKind;
///
/// assert_eq!(
///     replay_path(7, "https://example.com/logo.png", ResourceKind::Image),
///     "/web/7im_/https%3A%2F%2Fexample.com%2Flogo.png"
/// );
/// ```
pub fn replay_path(job_id: i64, url: &str, kind: ResourceKind) -> String {
    format!(
        "{}{}{}/{}",
        REPLAY_PREFIX,
        job_id,
        kind_modifier(kind),
        urlencoding::encode(url)
    )
}

/// Splits a replay address back into its job id and original URL
///
/// Any fragment or query appended to the address itself is ignored.
///
/// # Returns
///
/// * `Some((job_id, url))` - The address was well formed
/// * `None` - Not a replay address
pub fn parse_replay_path(path: &str) -> Option<(i64, String)> {
    let rest = path.strip_prefix(REPLAY_PREFIX)?;
    let (job_part, encoded) = rest.split_once('/')?;

    let digits = job_part
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(job_part.len());
    let (id, modifier) = job_part.split_at(digits);
    if !matches!(modifier, "" | "im_" | "cs_" | "js_") {
        return None;
    }
    let job_id = id.parse().ok()?;

    let encoded = encoded.split(['#', '?']).next().unwrap_or_default();
    let url = urlencoding::decode(encoded).ok()?.into_owned();
    if url.is_empty() {
        return None;
    }

    Some((job_id, url))
}

/// Rewrites every reference of an HTML document
pub fn rewrite_html(html: &str, context: &RewriteContext<'_>) -> String {
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;

    while let Some(caps) = MARKUP.captures(&html[pos..]) {
        let Some(whole) = caps.get(0) else { break };
        let start = pos + whole.start();
        let end = pos + whole.end();
        out.push_str(&html[pos..start]);

        let (Some(name), Some(attrs)) = (caps.get(1), caps.get(2)) else {
            // Comment
            out.push_str(whole.as_str());
            pos = end;
            continue;
        };

        let name = name.as_str().to_ascii_lowercase();
        if name == "base" && has_attribute(attrs.as_str(), "href") {
            // Replayed references are already absolute or replay addresses
            pos = end;
            continue;
        }

        let tag = whole.as_str();
        let attrs_start = attrs.start() - whole.start();
        let attrs_end = attrs.end() - whole.start();
        out.push_str(&tag[..attrs_start]);
        out.push_str(&rewrite_attributes(attrs.as_str(), context));
        out.push_str(&tag[attrs_end..]);
        pos = end;

        if (name == "style" || name == "script") && !tag.ends_with("/>") {
            let close = find_close_tag(&html[pos..], &name)
                .map(|offset| pos + offset)
                .unwrap_or(html.len());
            let body = &html[pos..close];
            if name == "style" {
                out.push_str(&rewrite_css(body, context));
            } else {
                out.push_str(body);
            }
            pos = close;
        }
    }

    out.push_str(&html[pos..]);
    out
}

/// Rewrites `url(...)` and `@import` references in CSS text
pub fn rewrite_css(css: &str, context: &RewriteContext<'_>) -> String {
    rewrite_css_references(css, context, None)
}

/// How an attribute value is delimited in the source markup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Double,
    Single,
    Bare,
}

/// CSS references; `quote` is set when the text is an attribute value
fn rewrite_css_references(
    css: &str,
    context: &RewriteContext<'_>,
    quote: Option<Quote>,
) -> String {
    let replacements = css_references(css)
        .into_iter()
        .filter_map(|reference| {
            let url = match quote {
                Some(quote) => rewrite_reference(&decode_html_entities(&reference.value), context)
                    .map(|url| escape_attribute(&url, quote)),
                None => rewrite_reference(&reference.value, context),
            }?;
            Some((reference.range, url))
        })
        .collect();
    splice(css, replacements)
}

fn rewrite_attributes(attrs: &str, context: &RewriteContext<'_>) -> String {
    let mut replacements = Vec::new();

    for caps in ATTRIBUTE.captures_iter(attrs) {
        let Some(name) = caps.get(1) else { continue };
        let (value, quote) = match (caps.get(2), caps.get(3), caps.get(4)) {
            (Some(value), _, _) => (value, Quote::Double),
            (_, Some(value), _) => (value, Quote::Single),
            (_, _, Some(value)) => (value, Quote::Bare),
            _ => continue,
        };
        let name = name.as_str().to_ascii_lowercase();

        let rewritten = if URL_ATTRIBUTES.contains(&name.as_str()) {
            rewrite_reference(&decode_html_entities(value.as_str()), context)
                .map(|url| escape_attribute(&url, quote))
        } else if name == "srcset" {
            Some(rewrite_srcset(value.as_str(), context, quote))
        } else if name == "style" {
            Some(rewrite_css_references(value.as_str(), context, Some(quote)))
        } else {
            None
        };

        if let Some(rewritten) = rewritten.filter(|rewritten| rewritten != value.as_str()) {
            replacements.push((value.range(), rewritten));
        }
    }

    splice(attrs, replacements)
}

fn rewrite_srcset(srcset: &str, context: &RewriteContext<'_>, quote: Quote) -> String {
    let replacements = SRCSET_CANDIDATE
        .captures_iter(srcset)
        .filter_map(|caps| caps.get(1))
        .filter_map(|candidate| {
            rewrite_reference(&decode_html_entities(candidate.as_str()), context)
                .map(|url| (candidate.range(), escape_attribute(&url, quote)))
        })
        .collect();
    splice(srcset, replacements)
}

fn has_attribute(attrs: &str, wanted: &str) -> bool {
    ATTRIBUTE.captures_iter(attrs).any(|caps| {
        caps.get(1)
            .is_some_and(|name| name.as_str().eq_ignore_ascii_case(wanted))
    })
}

/// Escapes a rewritten URL for the quoting of the attribute it lands in
fn escape_attribute(url: &str, quote: Quote) -> String {
    match quote {
        Quote::Single => html_escape::encode_single_quoted_attribute(url).into_owned(),
        Quote::Double | Quote::Bare => {
            html_escape::encode_double_quoted_attribute(url).into_owned()
        }
    }
}

/// Retargets one reference
///
/// Captured resources point into the job's replay space, everything else
/// points at its absolute original URL. References that are not network
/// URLs return `None` and are left alone.
fn rewrite_reference(raw: &str, context: &RewriteContext<'_>) -> Option<String> {
    let raw = raw.trim();
    if !is_fetchable_reference(raw) {
        return None;
    }

    let absolute = context.base.join(raw).ok()?;
    if !matches!(absolute.scheme(), "http" | "https") {
        return None;
    }

    let captured = normalize_url(raw, Some(context.base))
        .ok()
        .and_then(|url| {
            context
                .captured
                .get(url.as_str())
                .map(|kind| replay_path(context.job_id, url.as_str(), *kind))
        });

    match captured {
        Some(path) => match absolute.fragment() {
            Some(fragment) => Some(format!("{}#{}", path, fragment)),
            None => Some(path),
        },
        None => Some(absolute.to_string()),
    }
}

/// Byte offset of the `</name` that ends a raw text element
///
/// `name` must be lowercase.
fn find_close_tag(text: &str, name: &str) -> Option<usize> {
    let needle = format!("</{}", name);
    text.as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

fn splice(text: &str, mut replacements: Vec<(Range<usize>, String)>) -> String {
    if replacements.is_empty() {
        return text.to_string();
    }

    replacements.sort_by_key(|(range, _)| range.start);
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    for (range, replacement) in replacements {
        if range.start < pos {
            continue;
        }
        out.push_str(&text[pos..range.start]);
        out.push_str(&replacement);
        pos = range.end;
    }
    out.push_str(&text[pos..]);
    out
}
