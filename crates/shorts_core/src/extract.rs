use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::host::organization_from_host;
use crate::reference::{find_reference, looks_like_reference};
use crate::text::{char_len, visible_text};
use crate::ContentRecord;

const TITLE_SELECTORS: &[&str] = &[
    "h1.sermon-title",
    "h1.entry-title",
    "h1.post-title",
    ".sermon-header h1",
    "article h1",
    "h1",
    "title",
];

const BODY_SELECTORS: &[&str] = &[
    ".sermon-content",
    ".entry-content",
    ".post-content",
    "article .content",
    ".main-content",
    "main",
    ".content",
];

const REFERENCE_SELECTORS: &[&str] = &[".scripture", ".bible-verse", ".verse", ".reference"];
const ATTRIBUTION_SELECTORS: &[&str] = &[".pastor", ".author", ".speaker", ".preacher"];
const ORGANIZATION_SELECTORS: &[&str] = &[".church-name", ".site-title", ".organization"];

/// Chrome stripped from selector matches.
const CONTENT_SKIP: &[&str] = &["nav", "footer"];
/// Chrome stripped when falling back to the whole `<body>`.
const PAGE_SKIP: &[&str] = &["nav", "footer", "header", "aside"];

const MIN_TITLE_CHARS: usize = 5;
const MIN_BODY_CHARS: usize = 100;
const MAX_ATTRIBUTION_CHARS: usize = 50;
const MAX_ORGANIZATION_CHARS: usize = 100;

pub trait Extractor: Send + Sync {
    /// `None` when the page has no usable title or body.
    fn extract(&self, html: &str, source_url: &str) -> Option<ContentRecord>;
}

/// Selector cascade tuned for church sermon pages:
/// - each field tries its selectors in order and keeps the first match that
///   passes the field's quality check
/// - title falls back to `<title>`, body to the visible text of `<body>`
/// - reference falls back to a citation scan of the whole page
/// - attribution falls back to `<meta name="author">`, organization to the URL host
#[derive(Debug, Default, Clone, Copy)]
pub struct SermonPageExtractor;

impl Extractor for SermonPageExtractor {
    fn extract(&self, html: &str, source_url: &str) -> Option<ContentRecord> {
        if !has_body_tag(html) {
            return None;
        }
        let doc = Html::parse_document(html);

        let title = extract_title(&doc)?;
        let body = extract_body(&doc)?;

        let record = ContentRecord::new(title, body, source_url)?
            .with_reference(extract_reference(&doc))
            .with_attribution(extract_attribution(&doc))
            .with_organization(extract_organization(&doc, source_url));
        Some(record)
    }
}

fn extract_title(doc: &Html) -> Option<String> {
    first_match(doc, TITLE_SELECTORS, &[], |text| {
        char_len(text) > MIN_TITLE_CHARS
    })
    .or_else(|| first_match(doc, &["title"], &[], |text| !text.is_empty()))
}

fn extract_body(doc: &Html) -> Option<String> {
    let substantial = |text: &str| char_len(text) > MIN_BODY_CHARS;
    first_match(doc, BODY_SELECTORS, CONTENT_SKIP, substantial)
        .or_else(|| first_match(doc, &["body"], PAGE_SKIP, substantial))
}

fn extract_reference(doc: &Html) -> Option<String> {
    first_match(doc, REFERENCE_SELECTORS, &[], looks_like_reference)
        .or_else(|| find_reference(&visible_text(doc.root_element(), &[])))
}

fn extract_attribution(doc: &Html) -> Option<String> {
    let short = |text: &str| !text.is_empty() && char_len(text) < MAX_ATTRIBUTION_CHARS;
    first_match(doc, ATTRIBUTION_SELECTORS, &[], short).or_else(|| {
        let sel = Selector::parse(r#"meta[name="author"]"#).ok()?;
        let content = doc.select(&sel).next()?.value().attr("content")?.trim();
        short(content).then(|| content.to_string())
    })
}

fn extract_organization(doc: &Html, source_url: &str) -> Option<String> {
    first_match(doc, ORGANIZATION_SELECTORS, &[], |text| {
        !text.is_empty() && char_len(text) < MAX_ORGANIZATION_CHARS
    })
    .or_else(|| organization_from_host(source_url))
}

/// Visible text of the first element for the first selector whose text is accepted.
fn first_match(
    doc: &Html,
    selectors: &[&str],
    skip: &[&str],
    accept: impl Fn(&str) -> bool,
) -> Option<String> {
    selectors
        .iter()
        .filter_map(|raw| Selector::parse(raw).ok())
        .find_map(|sel| {
            let element = doc.select(&sel).next()?;
            let text = visible_text(element, skip);
            accept(&text).then_some(text)
        })
}

// Comments and raw-text elements are matched whole so a `<body` inside them is skipped.
static BODY_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?is)<!--.*?(?:-->|\z)",
        r"|<(?:script|style|textarea|title)\b.*?(?:</(?:script|style|textarea|title)\s*>|\z)",
        r"|<body[\s/>]",
    ))
    .expect("BODY_TAG_RE should compile")
});

// html5ever always synthesizes a body element, so check the source.
fn has_body_tag(html: &str) -> bool {
    BODY_TAG_RE
        .find_iter(html)
        .any(|found| {
            found
                .as_str()
                .get(..5)
                .is_some_and(|start| start.eq_ignore_ascii_case("<body"))
        })
}
