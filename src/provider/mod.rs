//! The boundary with the content provider: the [`Provider`] trait, the query
//! and response types it speaks, and its implementations.
//!
//! * [`prismic::Client`] talks to a hosted Prismic repository over HTTP.
//! * [`memory::Memory`] serves documents held in memory, optionally loaded
//!   from a directory of JSON files. Useful for offline builds and tests.
//! * [`retry::Retrying`] wraps another provider and retries transient
//!   failures.
//!
//! Response and document types mirror the provider's wire format; the
//! [`crate::content`] module flattens them into the shapes the rest of the
//! crate uses.

pub mod memory;
pub mod prismic;
pub mod retry;

use crate::content::Section;
use crate::richtext::RichText;
use serde::{Deserialize, Deserializer};
use serde_json::Value as Json;
use std::fmt;

/// An opaque pagination token. For Prismic this is itself the URL of the next
/// page of results, but callers must not rely on that.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new<S: Into<String>>(s: S) -> Cursor {
        Cursor(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A condition on documents in a [`Query`].
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    /// Matches documents whose field at `path` equals `value` (e.g.,
    /// `at(document.type, "post")`).
    At { path: String, value: String },
}

impl Predicate {
    pub fn at<P: Into<String>, V: Into<String>>(path: P, value: V) -> Predicate {
        Predicate::At {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Matches every document of `document_type`.
    pub fn document_type(document_type: &str) -> Predicate {
        Predicate::at("document.type", document_type)
    }

    /// Matches the document of `document_type` whose UID is `uid`.
    pub fn uid(document_type: &str, uid: &str) -> Predicate {
        Predicate::at(format!("my.{}.uid", document_type), uid)
    }
}

impl fmt::Display for Predicate {
    /// Renders the predicate in the provider's query language.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Predicate::At { path, value } => write!(
                f,
                "[at({}, \"{}\")]",
                path,
                value.replace('\\', "\\\\").replace('"', "\\\"")
            ),
        }
    }
}

/// A search for documents.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    pub predicates: Vec<Predicate>,

    /// The number of results per page. The provider picks a default (20 for
    /// Prismic) when absent.
    pub page_size: Option<usize>,

    /// Ordering expression, e.g. `[document.first_publication_date desc]`.
    pub orderings: Option<String>,
}

impl Query {
    pub fn new(predicate: Predicate) -> Query {
        Query {
            predicates: vec![predicate],
            page_size: None,
            orderings: None,
        }
    }

    pub fn page_size(mut self, page_size: usize) -> Query {
        self.page_size = Some(page_size);
        self
    }

    pub fn orderings(mut self, orderings: Option<String>) -> Query {
        self.orderings = orderings;
        self
    }

    /// Renders the predicates as the value of the provider's `q` parameter.
    pub fn q(&self) -> String {
        let predicates: String = self.predicates.iter().map(|p| p.to_string()).collect();
        format!("[{}]", predicates)
    }
}

/// One page of search results.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Response {
    /// The cursor for the next page, or `None` if this is the last page.
    #[serde(default)]
    pub next_page: Option<Cursor>,

    #[serde(default)]
    pub results: Vec<Document>,
}

/// A document as the provider returns it.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Document {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub uid: Option<String>,

    #[serde(default, rename = "type")]
    pub document_type: String,

    #[serde(default)]
    pub first_publication_date: Option<String>,

    #[serde(default)]
    pub data: DocumentData,
}

/// The custom fields of a post document. Every field is lenient: missing,
/// null, or malformed values degrade to empty ones.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DocumentData {
    #[serde(deserialize_with = "text_field")]
    pub title: String,

    #[serde(deserialize_with = "text_field")]
    pub subtitle: String,

    #[serde(deserialize_with = "text_field")]
    pub author: String,

    #[serde(rename = "banner", deserialize_with = "image_url")]
    pub banner_url: Option<String>,

    #[serde(deserialize_with = "sections")]
    pub content: Vec<Section>,
}

/// Flattens a text field, which may be a plain string or rich text, into a
/// string.
fn text_to_string(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        Json::Array(_) => RichText::from_json(value).as_text(),
        _ => String::new(),
    }
}

fn text_field<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(text_to_string(&Json::deserialize(deserializer)?))
}

fn image_url<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Json::deserialize(deserializer)?
        .get("url")
        .and_then(Json::as_str)
        .map(str::to_owned))
}

fn sections<'de, D>(deserializer: D) -> std::result::Result<Vec<Section>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Json::deserialize(deserializer)? {
        Json::Array(items) => items
            .iter()
            .filter(|item| item.is_object())
            .map(|item| Section {
                heading: item.get("heading").map(text_to_string).unwrap_or_default(),
                body: item
                    .get("body")
                    .map(RichText::from_json)
                    .unwrap_or_default(),
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// A source of documents.
pub trait Provider {
    /// Returns the first page of results for `query`.
    fn query(&self, query: &Query) -> Result<Response>;

    /// Returns the page of results that `cursor` points at.
    fn fetch(&self, cursor: &Cursor) -> Result<Response>;

    /// Returns the document of `document_type` whose UID is `uid`.
    fn get_by_uid(&self, document_type: &str, uid: &str) -> Result<Document>;
}

impl<P: Provider + ?Sized> Provider for Box<P> {
    fn query(&self, query: &Query) -> Result<Response> {
        (**self).query(query)
    }

    fn fetch(&self, cursor: &Cursor) -> Result<Response> {
        (**self).fetch(cursor)
    }

    fn get_by_uid(&self, document_type: &str, uid: &str) -> Result<Document> {
        (**self).get_by_uid(document_type, uid)
    }
}

/// The result of a fallible provider operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure talking to a provider.
#[derive(Debug)]
pub enum Error {
    /// Returned when the HTTP request itself fails (connection, timeout,
    /// etc).
    Http(reqwest::Error),

    /// Returned when the provider answers with a non-success status. The URL
    /// has any access token removed.
    Status { url: String, status: u16 },

    /// Returned when a response body isn't the expected JSON.
    Decode(serde_json::Error),

    /// Returned when there is a problem parsing URLs.
    UrlParse(url::ParseError),

    /// Returned for I/O errors reading documents from disk.
    Io(std::io::Error),

    /// Returned for WalkDir I/O errors.
    WalkDir(walkdir::Error),

    /// Returned when no document has the requested UID.
    NotFound { document_type: String, uid: String },

    /// Returned when the API root doesn't advertise a master ref.
    MissingMasterRef,

    /// Returned when a cursor wasn't issued by this provider.
    InvalidCursor(Cursor),

    /// Returned when a provider can't evaluate a predicate.
    UnsupportedPredicate(Predicate),

    /// An error with an annotation.
    Annotated(String, Box<Error>),
}

impl Error {
    /// Reports whether retrying the failed operation might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(err) => !(err.is_decode() || err.is_builder()),
            Error::Status { status, .. } => *status == 429 || *status >= 500,
            Error::Annotated(_, err) => err.is_transient(),
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Http(err) => err.fmt(f),
            Error::Status { url, status } => {
                write!(f, "provider returned HTTP {} for `{}`", status, url)
            }
            Error::Decode(err) => write!(f, "decoding provider response: {}", err),
            Error::UrlParse(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
            Error::WalkDir(err) => err.fmt(f),
            Error::NotFound { document_type, uid } => {
                write!(f, "no `{}` document with uid `{}`", document_type, uid)
            }
            Error::MissingMasterRef => write!(f, "provider API has no master ref"),
            Error::InvalidCursor(cursor) => write!(f, "invalid cursor `{}`", cursor),
            Error::UnsupportedPredicate(predicate) => {
                write!(f, "unsupported predicate `{}`", predicate)
            }
            Error::Annotated(annotation, err) => write!(f, "{}: {}", annotation, err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(err) => Some(err),
            Error::Decode(err) => Some(err),
            Error::UrlParse(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::WalkDir(err) => Some(err),
            Error::Annotated(_, err) => Some(err),
            Error::Status { .. }
            | Error::NotFound { .. }
            | Error::MissingMasterRef
            | Error::InvalidCursor(_)
            | Error::UnsupportedPredicate(_) => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Error {
        Error::Http(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Decode(err)
    }
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. It allows us to use
    /// the `?` operator for URL parsing and joining functions.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}
