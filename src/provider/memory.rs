//! A [`Provider`] that serves documents held in memory. Projects can point the
//! `directory` provider at a folder of JSON documents (one per file, in the
//! provider's document format) to build without network access.

use super::{Cursor, Document, Error, Predicate, Provider, Query, Response, Result};
use std::fs::File;
use std::path::Path;
use tracing::debug;
use url::{form_urlencoded, Url};
use walkdir::WalkDir;

/// The page size used when a query doesn't set one; it matches the hosted
/// provider's default.
const DEFAULT_PAGE_SIZE: usize = 20;

/// Serves a fixed set of documents. Results come back in the order the
/// documents were given, which for [`Memory::from_directory`] is newest first;
/// query orderings are ignored. Cursors are `memory:` URLs encoding the query
/// and page number.
pub struct Memory {
    documents: Vec<Document>,
}

impl Memory {
    pub fn new(documents: Vec<Document>) -> Memory {
        Memory { documents }
    }

    /// Loads every `.json` file under `dir` as a [`Document`] and orders the
    /// documents by publication date, most recent first.
    pub fn from_directory(dir: &Path) -> Result<Memory> {
        let mut documents = Vec::new();
        for result in WalkDir::new(dir).sort_by(|a, b| a.file_name().cmp(b.file_name())) {
            let entry = result?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("json")
            {
                continue;
            }
            let document: Document = serde_json::from_reader(File::open(path)?)
                .map_err(|e| {
                    Error::Annotated(
                        format!("reading document `{}`", path.display()),
                        Box::new(Error::Decode(e)),
                    )
                })?;
            documents.push(document);
        }

        // ISO-8601 timestamps in a single format sort chronologically as
        // strings.
        documents.sort_by(|a, b| b.first_publication_date.cmp(&a.first_publication_date));
        debug!(count = documents.len(), dir = %dir.display(), "loaded documents");
        Ok(Memory::new(documents))
    }

    fn matches(document: &Document, predicate: &Predicate) -> Result<bool> {
        let Predicate::At { path, value } = predicate;
        match path.as_str() {
            "document.type" => Ok(&document.document_type == value),
            "document.id" => Ok(&document.id == value),
            other => match other
                .strip_prefix("my.")
                .and_then(|rest| rest.strip_suffix(".uid"))
            {
                Some(document_type) => Ok(document.document_type == document_type
                    && document.uid.as_deref() == Some(value.as_str())),
                None => Err(Error::UnsupportedPredicate(predicate.clone())),
            },
        }
    }

    fn search(&self, predicates: &[Predicate]) -> Result<Vec<&Document>> {
        let mut found = Vec::new();
        for document in &self.documents {
            let mut matched = true;
            for predicate in predicates {
                matched = matched && Self::matches(document, predicate)?;
            }
            if matched {
                found.push(document);
            }
        }
        Ok(found)
    }

    /// Returns the 1-based `page` of results for `predicates`.
    fn page(&self, predicates: &[Predicate], page_size: usize, page: usize) -> Result<Response> {
        let found = self.search(predicates)?;
        let start = (page - 1).saturating_mul(page_size);
        let results = found
            .iter()
            .skip(start)
            .take(page_size)
            .map(|&d| d.clone())
            .collect();
        Ok(Response {
            next_page: if start.saturating_add(page_size) < found.len() {
                Some(cursor(predicates, page_size, page + 1))
            } else {
                None
            },
            results,
        })
    }
}

fn cursor(predicates: &[Predicate], page_size: usize, page: usize) -> Cursor {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("page", &page.to_string());
    query.append_pair("pageSize", &page_size.to_string());
    for Predicate::At { path, value } in predicates {
        query.append_pair("at", &format!("{}={}", path, value));
    }
    Cursor::new(format!("memory:search?{}", query.finish()))
}

fn parse_cursor(cursor: &Cursor) -> Option<(Vec<Predicate>, usize, usize)> {
    let url = Url::parse(cursor.as_str()).ok()?;
    if url.scheme() != "memory" {
        return None;
    }
    let (mut page, mut page_size, mut predicates) = (None, None, Vec::new());
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "page" => page = value.parse::<usize>().ok(),
            "pageSize" => page_size = value.parse::<usize>().ok(),
            "at" => {
                let (path, value) = value.split_once('=')?;
                predicates.push(Predicate::at(path, value));
            }
            _ => return None,
        }
    }
    match (page?, page_size?) {
        (0, _) | (_, 0) => None,
        // the page's first result must be addressable
        (page, page_size) => {
            (page - 1).checked_mul(page_size)?;
            Some((predicates, page_size, page))
        }
    }
}

impl Provider for Memory {
    fn query(&self, query: &Query) -> Result<Response> {
        let page_size = match query.page_size {
            Some(0) | None => DEFAULT_PAGE_SIZE,
            Some(n) => n,
        };
        self.page(&query.predicates, page_size, 1)
    }

    fn fetch(&self, cursor: &Cursor) -> Result<Response> {
        match parse_cursor(cursor) {
            Some((predicates, page_size, page)) => self.page(&predicates, page_size, page),
            None => Err(Error::InvalidCursor(cursor.clone())),
        }
    }

    fn get_by_uid(&self, document_type: &str, uid: &str) -> Result<Document> {
        self.search(&[Predicate::uid(document_type, uid)])?
            .first()
            .map(|&d| d.clone())
            .ok_or_else(|| Error::NotFound {
                document_type: document_type.to_owned(),
                uid: uid.to_owned(),
            })
    }
}
