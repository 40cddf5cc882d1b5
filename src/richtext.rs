//! Structured rich text as the content provider emits it, and its conversion
//! to plain text ([`RichText::as_text`]) and HTML ([`RichText::as_html`]).
//!
//! Provider content is not trusted. Every piece of text and every attribute
//! value is escaped, links and image sources are limited to a small set of URL
//! schemes, and embed blocks never pass the provider's raw markup through.
//! Input that doesn't look like rich text degrades to nothing rather than
//! failing; a malformed body renders as an empty string.

use pulldown_cmark::escape::{escape_href, escape_html};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value as Json};
use std::collections::BTreeSet;

/// An ordered sequence of rich-text [`Block`]s.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RichText(Vec<Block>);

/// A single rich-text unit (a paragraph, a heading, a list item, etc).
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub text: String,
    pub spans: Vec<Span>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BlockKind {
    Paragraph,
    Heading(u8),
    Preformatted,
    ListItem,
    OrderedListItem,
    Image { url: String, alt: Option<String> },
    Embed { url: String, title: Option<String> },
}

/// Inline formatting over a range of a block's text. `start` and `end` are
/// UTF-16 code unit offsets, which is what the provider emits.
#[derive(Clone, Debug, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub kind: SpanKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SpanKind {
    Strong,
    Em,
    Label(String),
    Hyperlink(Link),
}

/// The target of a hyperlink span.
#[derive(Clone, Debug, PartialEq)]
pub enum Link {
    /// A link to another document, identified by its `uid`.
    Document { uid: String },

    /// A link to an arbitrary URL (a web page or a media file).
    Web { url: String, new_tab: bool },
}

/// Resolves links to other documents into URLs.
pub trait LinkResolver {
    fn resolve_document(&self, uid: &str) -> Option<String>;
}

impl<F> LinkResolver for F
where
    F: Fn(&str) -> Option<String>,
{
    fn resolve_document(&self, uid: &str) -> Option<String> {
        self(uid)
    }
}

impl RichText {
    pub fn new(blocks: Vec<Block>) -> RichText {
        RichText(blocks)
    }

    /// Builds rich text from loosely-typed JSON. Anything that isn't an array
    /// yields empty rich text, and array elements that aren't recognizable
    /// blocks are skipped.
    pub fn from_json(value: &Json) -> RichText {
        match value {
            Json::Array(items) => RichText(items.iter().filter_map(Block::from_json).collect()),
            _ => RichText::default(),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the text of every text-bearing block joined by a single space.
    pub fn as_text(&self) -> String {
        self.0
            .iter()
            .filter(|b| b.kind.has_text())
            .map(|b| b.text.as_str())
            .collect::<Vec<&str>>()
            .join(" ")
    }

    /// Renders the blocks as HTML. Consecutive list items are grouped into a
    /// single `<ul>` or `<ol>`.
    pub fn as_html(&self, links: &dyn LinkResolver) -> String {
        let mut out = String::new();
        let mut open_list: Option<bool> = None;

        for block in &self.0 {
            let list = match block.kind {
                BlockKind::ListItem => Some(false),
                BlockKind::OrderedListItem => Some(true),
                _ => None,
            };
            if list != open_list {
                if let Some(ordered) = open_list {
                    out.push_str(if ordered { "</ol>" } else { "</ul>" });
                }
                if let Some(ordered) = list {
                    out.push_str(if ordered { "<ol>" } else { "<ul>" });
                }
                open_list = list;
            }
            block.push_html(&mut out, links);
        }

        if let Some(ordered) = open_list {
            out.push_str(if ordered { "</ol>" } else { "</ul>" });
        }
        out
    }
}

impl<'de> Deserialize<'de> for RichText {
    /// Deserializes leniently via [`RichText::from_json`]; this never fails
    /// on well-formed JSON.
    fn deserialize<D>(deserializer: D) -> Result<RichText, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(RichText::from_json(&Json::deserialize(deserializer)?))
    }
}

impl BlockKind {
    fn has_text(&self) -> bool {
        !matches!(self, BlockKind::Image { .. } | BlockKind::Embed { .. })
    }
}

impl Block {
    /// A paragraph without formatting.
    pub fn paragraph(text: &str) -> Block {
        Block {
            kind: BlockKind::Paragraph,
            text: text.to_owned(),
            spans: Vec::new(),
        }
    }

    fn from_json(value: &Json) -> Option<Block> {
        let obj = value.as_object()?;
        let kind = match obj.get("type")?.as_str()? {
            "paragraph" => BlockKind::Paragraph,
            "preformatted" => BlockKind::Preformatted,
            "list-item" => BlockKind::ListItem,
            "o-list-item" => BlockKind::OrderedListItem,
            "image" => BlockKind::Image {
                url: obj.get("url")?.as_str()?.to_owned(),
                alt: str_field(obj, "alt"),
            },
            "embed" => {
                let oembed = obj.get("oembed")?.as_object()?;
                BlockKind::Embed {
                    url: oembed.get("embed_url")?.as_str()?.to_owned(),
                    title: str_field(oembed, "title"),
                }
            }
            heading => match heading.strip_prefix("heading")?.parse::<u8>() {
                Ok(level @ 1..=6) => BlockKind::Heading(level),
                _ => return None,
            },
        };

        let text = str_field(obj, "text").unwrap_or_default();
        let spans = match obj.get("spans") {
            Some(Json::Array(spans)) => spans.iter().filter_map(Span::from_json).collect(),
            _ => Vec::new(),
        };
        Some(Block { kind, text, spans })
    }

    fn push_html(&self, out: &mut String, links: &dyn LinkResolver) {
        match &self.kind {
            BlockKind::Paragraph => {
                out.push_str("<p>");
                push_spans(out, &self.text, &self.spans, links);
                out.push_str("</p>");
            }
            BlockKind::Heading(level) => {
                out.push_str(&format!("<h{}>", level));
                push_spans(out, &self.text, &self.spans, links);
                out.push_str(&format!("</h{}>", level));
            }
            BlockKind::Preformatted => {
                out.push_str("<pre>");
                push_spans(out, &self.text, &self.spans, links);
                out.push_str("</pre>");
            }
            BlockKind::ListItem | BlockKind::OrderedListItem => {
                out.push_str("<li>");
                push_spans(out, &self.text, &self.spans, links);
                out.push_str("</li>");
            }
            BlockKind::Image { url, alt } => {
                if let Some(src) = safe_url(url) {
                    out.push_str("<p class=\"block-img\"><img src=\"");
                    push_href(out, src);
                    out.push_str("\" alt=\"");
                    push_escaped(out, alt.as_deref().unwrap_or(""));
                    out.push_str("\" /></p>");
                }
            }
            BlockKind::Embed { url, title } => {
                if let Some(href) = safe_url(url) {
                    out.push_str("<div data-oembed=\"");
                    push_href(out, href);
                    out.push_str("\"><a href=\"");
                    push_href(out, href);
                    out.push_str("\">");
                    push_escaped(out, title.as_deref().unwrap_or(href));
                    out.push_str("</a></div>");
                }
            }
        }
    }
}

impl Span {
    fn from_json(value: &Json) -> Option<Span> {
        let obj = value.as_object()?;
        let start = obj.get("start")?.as_u64()? as usize;
        let end = obj.get("end")?.as_u64()? as usize;
        if start >= end {
            return None;
        }
        let data = obj.get("data").and_then(Json::as_object);
        let kind = match obj.get("type")?.as_str()? {
            "strong" => SpanKind::Strong,
            "em" => SpanKind::Em,
            "label" => SpanKind::Label(str_field(data?, "label")?),
            "hyperlink" => SpanKind::Hyperlink(Link::from_json(data?)?),
            _ => return None,
        };
        Some(Span { start, end, kind })
    }
}

impl Link {
    fn from_json(data: &Map<String, Json>) -> Option<Link> {
        match data.get("link_type").and_then(Json::as_str) {
            Some("Document") => Some(Link::Document {
                uid: str_field(data, "uid")?,
            }),
            _ => Some(Link::Web {
                url: str_field(data, "url")?,
                new_tab: data.get("target").and_then(Json::as_str) == Some("_blank"),
            }),
        }
    }

    fn href(&self, links: &dyn LinkResolver) -> Option<String> {
        match self {
            Link::Document { uid } => links.resolve_document(uid),
            Link::Web { url, .. } => safe_url(url).map(str::to_owned),
        }
    }
}

fn str_field(obj: &Map<String, Json>, key: &str) -> Option<String> {
    obj.get(key).and_then(Json::as_str).map(str::to_owned)
}

/// Returns the trimmed URL if it's safe to emit as a link or image source:
/// `http`, `https`, `mailto`, or a relative reference.
pub(crate) fn safe_url(url: &str) -> Option<&str> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    match url::Url::parse(url) {
        Ok(parsed) => match parsed.scheme() {
            "http" | "https" | "mailto" => Some(url),
            _ => None,
        },
        Err(url::ParseError::RelativeUrlWithoutBase) => Some(url),
        Err(_) => None,
    }
}

// Writing into a `String` can't fail.
fn push_escaped(out: &mut String, text: &str) {
    let _ = escape_html(out, text);
}

fn push_href(out: &mut String, href: &str) {
    let _ = escape_href(out, href);
}

fn push_text(out: &mut String, text: &str) {
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push_str("<br />");
        }
        push_escaped(out, line);
    }
}

/// Converts a UTF-16 offset into a byte offset into `text`, clamped to the end
/// of the string.
fn byte_offset(text: &str, utf16: usize) -> usize {
    let mut units = 0;
    for (i, c) in text.char_indices() {
        if units >= utf16 {
            return i;
        }
        units += c.len_utf16();
    }
    text.len()
}

/// A span resolved against its block: byte offsets and the opening/closing
/// markup to emit.
struct Resolved {
    start: usize,
    end: usize,
    open: String,
    close: &'static str,
}

fn resolve_span(text: &str, span: &Span, links: &dyn LinkResolver) -> Option<Resolved> {
    let start = byte_offset(text, span.start);
    let end = byte_offset(text, span.end);
    if start >= end {
        return None;
    }
    let (open, close) = match &span.kind {
        SpanKind::Strong => ("<strong>".to_owned(), "</strong>"),
        SpanKind::Em => ("<em>".to_owned(), "</em>"),
        SpanKind::Label(label) => {
            let mut open = String::from("<span class=\"");
            push_escaped(&mut open, label);
            open.push_str("\">");
            (open, "</span>")
        }
        SpanKind::Hyperlink(link) => {
            // unsafe or unresolvable links render as plain text
            let href = link.href(links)?;
            let mut open = String::from("<a href=\"");
            push_href(&mut open, &href);
            open.push('"');
            if let Link::Web { new_tab: true, .. } = link {
                open.push_str(" target=\"_blank\" rel=\"noopener noreferrer\"");
            }
            open.push('>');
            (open, "</a>")
        }
    };
    Some(Resolved {
        start,
        end,
        open,
        close,
    })
}

/// Writes `text` with its spans applied. Spans may overlap arbitrarily; the
/// output is always properly nested, closing and reopening a span when one
/// that started inside it ends outside it.
fn push_spans(out: &mut String, text: &str, spans: &[Span], links: &dyn LinkResolver) {
    let spans: Vec<Resolved> = spans
        .iter()
        .filter_map(|s| resolve_span(text, s, links))
        .collect();

    let mut boundaries: BTreeSet<usize> = BTreeSet::new();
    boundaries.insert(0);
    boundaries.insert(text.len());
    for span in &spans {
        boundaries.insert(span.start);
        boundaries.insert(span.end);
    }
    let boundaries: Vec<usize> = boundaries.into_iter().collect();

    let mut stack: Vec<usize> = Vec::new();
    for window in boundaries.windows(2) {
        let (at, until) = (window[0], window[1]);

        let mut opening: Vec<usize> = Vec::new();
        if let Some(i) = stack.iter().position(|&s| spans[s].end <= at) {
            let popped = stack.split_off(i);
            for &s in popped.iter().rev() {
                out.push_str(spans[s].close);
            }
            opening.extend(popped.into_iter().filter(|&s| spans[s].end > at));
        }
        opening.extend((0..spans.len()).filter(|&s| spans[s].start == at));
        // outermost (longest-lived) first
        opening.sort_by(|&a, &b| spans[b].end.cmp(&spans[a].end).then(a.cmp(&b)));
        for s in opening {
            out.push_str(&spans[s].open);
            stack.push(s);
        }

        push_text(out, &text[at..until]);
    }

    for &s in stack.iter().rev() {
        out.push_str(spans[s].close);
    }
}
