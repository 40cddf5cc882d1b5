//! Defines the article types the site is built from, and the data shaping
//! that flattens provider [`Document`]s into them.

use crate::provider::{Cursor, Document, Response};
use crate::richtext::RichText;
use chrono::{DateTime, FixedOffset};
use std::convert::TryFrom;
use std::fmt;
use tracing::warn;

/// An article as it appears on a listing page.
#[derive(Clone, Debug, PartialEq)]
pub struct ArticleSummary {
    pub uid: String,
    pub published_at: Option<DateTime<FixedOffset>>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

/// A full article, as rendered on its own page.
#[derive(Clone, Debug, PartialEq)]
pub struct ArticleDetail {
    pub uid: String,
    pub published_at: Option<DateTime<FixedOffset>>,
    pub title: String,
    pub subtitle: String,
    pub banner_url: Option<String>,
    pub author: String,
    pub content: Vec<Section>,
}

/// A titled group of rich-text content within an article.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Section {
    pub heading: String,
    pub body: RichText,
}

/// An entry of the navigation index, the flat ordered list of every known
/// article.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavEntry {
    pub uid: String,
    pub title: String,
}

/// One fetched page of article summaries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListPage {
    /// The cursor for the next page. `None` means there are no more pages.
    pub next_page: Option<Cursor>,
    pub results: Vec<ArticleSummary>,
}

impl From<&ArticleSummary> for NavEntry {
    fn from(summary: &ArticleSummary) -> NavEntry {
        NavEntry {
            uid: summary.uid.clone(),
            title: summary.title.clone(),
        }
    }
}

impl TryFrom<Document> for ArticleSummary {
    type Error = Error;

    fn try_from(doc: Document) -> Result<ArticleSummary> {
        let published_at = published_at(&doc);
        Ok(ArticleSummary {
            uid: uid(&doc)?,
            published_at,
            title: doc.data.title,
            subtitle: doc.data.subtitle,
            author: doc.data.author,
        })
    }
}

impl TryFrom<Document> for ArticleDetail {
    type Error = Error;

    fn try_from(doc: Document) -> Result<ArticleDetail> {
        let published_at = published_at(&doc);
        Ok(ArticleDetail {
            uid: uid(&doc)?,
            published_at,
            title: doc.data.title,
            subtitle: doc.data.subtitle,
            banner_url: doc.data.banner_url,
            author: doc.data.author,
            content: doc.data.content,
        })
    }
}

impl TryFrom<Response> for ListPage {
    type Error = Error;

    /// Shapes every result of a provider response. Fails without a partial
    /// result if any document can't be shaped.
    fn try_from(response: Response) -> Result<ListPage> {
        Ok(ListPage {
            next_page: response.next_page,
            results: response
                .results
                .into_iter()
                .map(ArticleSummary::try_from)
                .collect::<Result<Vec<ArticleSummary>>>()?,
        })
    }
}

fn uid(doc: &Document) -> Result<String> {
    match &doc.uid {
        Some(uid) if !uid.is_empty() => Ok(uid.clone()),
        _ => Err(Error::MissingUid {
            id: doc.id.clone(),
        }),
    }
}

fn published_at(doc: &Document) -> Option<DateTime<FixedOffset>> {
    let raw = doc.first_publication_date.as_deref()?;
    let parsed = parse_timestamp(raw);
    if parsed.is_none() {
        warn!(id = %doc.id, date = raw, "ignoring unparseable publication date");
    }
    parsed
}

/// Parses the provider's timestamps, which look like
/// `2021-03-25T19:25:28+0000`. RFC 3339 is accepted too.
pub fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
}

/// The result of a data-shaping operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a provider document that can't be shaped into an article.
#[derive(Debug, PartialEq)]
pub enum Error {
    /// Returned when a document has no UID, so it can't be given a page.
    MissingUid { id: String },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MissingUid { id } => write!(f, "document `{}` has no uid", id),
        }
    }
}

impl std::error::Error for Error {}
