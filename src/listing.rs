//! The listing aggregator. A [`Listing`] accumulates successive pages of
//! [`ArticleSummary`]s in fetch order, tracking the cursor for the next page,
//! the way a reader pressing "load more" would.

use crate::content::{self, ArticleSummary, ListPage};
use crate::provider::{self, Cursor, Provider, Query};
use std::convert::TryFrom;
use std::fmt;
use tracing::debug;

/// An append-only collection of article summaries plus the cursor for the
/// next page. Results are never reordered or deduplicated. Once the cursor is
/// gone, [`Listing::load_more`] never fetches again; only a new initial fetch
/// ([`Listing::fetch`]) starts over.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Listing {
    next_page: Option<Cursor>,
    results: Vec<ArticleSummary>,
}

/// The outcome of a successful [`Listing::load_more`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was fetched and merged; carries the number of new results.
    Loaded(usize),

    /// There was no next page, so nothing was fetched.
    Exhausted,
}

impl Listing {
    /// Starts a listing from an initial page.
    pub fn new(initial: ListPage) -> Listing {
        Listing {
            next_page: initial.next_page,
            results: initial.results,
        }
    }

    /// Performs the initial fetch for `query`.
    pub fn fetch(provider: &dyn Provider, query: &Query) -> Result<Listing> {
        let response = provider.query(query)?;
        let page = ListPage::try_from(response)?;
        debug!(
            results = page.results.len(),
            more = page.next_page.is_some(),
            "fetched initial listing page"
        );
        Ok(Listing::new(page))
    }

    /// Appends `page`'s results and adopts its cursor.
    pub fn merge(&mut self, page: ListPage) {
        self.results.extend(page.results);
        self.next_page = page.next_page;
    }

    /// Reports whether there's a next page to load.
    pub fn can_load_more(&self) -> bool {
        self.next_page.is_some()
    }

    /// Fetches the page at the current cursor and merges it. Performs exactly
    /// one fetch when a cursor is present and none otherwise. On error the
    /// listing is left exactly as it was.
    pub fn load_more(&mut self, provider: &dyn Provider) -> Result<LoadOutcome> {
        let cursor = match &self.next_page {
            Some(cursor) => cursor,
            None => return Ok(LoadOutcome::Exhausted),
        };
        let page = provider
            .fetch(cursor)
            .map_err(Error::Provider)
            .and_then(|response| ListPage::try_from(response).map_err(Error::Content))?;
        let loaded = page.results.len();
        debug!(
            results = loaded,
            more = page.next_page.is_some(),
            "loaded more listing results"
        );
        self.merge(page);
        Ok(LoadOutcome::Loaded(loaded))
    }

    pub fn results(&self) -> &[ArticleSummary] {
        &self.results
    }

    pub fn next_page(&self) -> Option<&Cursor> {
        self.next_page.as_ref()
    }
}

/// The result of a fallible listing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure loading a listing page.
#[derive(Debug)]
pub enum Error {
    /// Returned when the provider fails to deliver the page.
    Provider(provider::Error),

    /// Returned when the page can't be shaped into summaries.
    Content(content::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Provider(err) => write!(f, "fetching listing page: {}", err),
            Error::Content(err) => write!(f, "shaping listing page: {}", err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Provider(err) => Some(err),
            Error::Content(err) => Some(err),
        }
    }
}

impl From<provider::Error> for Error {
    fn from(err: provider::Error) -> Error {
        Error::Provider(err)
    }
}

impl From<content::Error> for Error {
    fn from(err: content::Error) -> Error {
        Error::Content(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::provider::memory::Memory;
    use crate::provider::{Document, DocumentData, Predicate, Response};
    use std::cell::Cell;

    fn summary(uid: &str) -> ArticleSummary {
        ArticleSummary {
            uid: uid.to_owned(),
            published_at: None,
            title: uid.to_uppercase(),
            subtitle: String::new(),
            author: String::new(),
        }
    }

    fn page(uids: &[&str], next: Option<&str>) -> ListPage {
        ListPage {
            next_page: next.map(Cursor::new),
            results: uids.iter().map(|uid| summary(uid)).collect(),
        }
    }

    fn uids(listing: &Listing) -> Vec<&str> {
        listing.results().iter().map(|s| s.uid.as_str()).collect()
    }

    fn post(uid: &str, date: &str) -> Document {
        Document {
            id: uid.to_uppercase(),
            uid: Some(uid.to_owned()),
            document_type: String::from("post"),
            first_publication_date: Some(date.to_owned()),
            data: DocumentData {
                title: uid.to_uppercase(),
                ..DocumentData::default()
            },
        }
    }

    /// Serves canned responses for cursors and counts fetches.
    struct Scripted {
        pages: Vec<(Cursor, provider::Result<Response>)>,
        fetches: Cell<usize>,
    }

    impl Provider for Scripted {
        fn query(&self, _: &Query) -> provider::Result<Response> {
            Err(provider::Error::MissingMasterRef)
        }

        fn fetch(&self, cursor: &Cursor) -> provider::Result<Response> {
            self.fetches.set(self.fetches.get() + 1);
            match self.pages.iter().find(|(c, _)| c == cursor) {
                Some((_, Ok(response))) => Ok(response.clone()),
                Some((_, Err(_))) => Err(provider::Error::Status {
                    url: cursor.to_string(),
                    status: 503,
                }),
                None => Err(provider::Error::InvalidCursor(cursor.clone())),
            }
        }

        fn get_by_uid(&self, document_type: &str, uid: &str) -> provider::Result<Document> {
            Err(provider::Error::NotFound {
                document_type: document_type.to_owned(),
                uid: uid.to_owned(),
            })
        }
    }

    #[test]
    fn test_merge_concatenates_in_order() {
        let pages = vec![
            page(&["a", "b"], Some("2")),
            page(&["c", "a"], Some("3")),
            page(&["d"], None),
        ];
        let mut listing = Listing::new(pages[0].clone());
        for p in &pages[1..] {
            listing.merge(p.clone());
        }
        assert_eq!(vec!["a", "b", "c", "a", "d"], uids(&listing));
        assert_eq!(None, listing.next_page());
        assert!(!listing.can_load_more());
    }

    #[test]
    fn test_merge_adopts_latest_cursor() {
        let mut listing = Listing::new(page(&["a"], Some("2")));
        listing.merge(page(&[], Some("3")));
        assert_eq!(Some(&Cursor::new("3")), listing.next_page());
        assert_eq!(vec!["a"], uids(&listing));
    }

    #[test]
    fn test_load_more_without_cursor_never_fetches() -> Result<()> {
        let provider = Scripted {
            pages: Vec::new(),
            fetches: Cell::new(0),
        };
        let mut listing = Listing::new(page(&["a"], None));
        assert_eq!(LoadOutcome::Exhausted, listing.load_more(&provider)?);
        assert_eq!(LoadOutcome::Exhausted, listing.load_more(&provider)?);
        assert_eq!(0, provider.fetches.get());
        assert_eq!(vec!["a"], uids(&listing));
        Ok(())
    }

    #[test]
    fn test_load_more_fetches_once_per_call() -> Result<()> {
        let provider = Scripted {
            pages: vec![(
                Cursor::new("2"),
                Ok(Response {
                    next_page: None,
                    results: vec![post("b", "2021-01-01T00:00:00+0000")],
                }),
            )],
            fetches: Cell::new(0),
        };
        let mut listing = Listing::new(page(&["a"], Some("2")));
        assert_eq!(LoadOutcome::Loaded(1), listing.load_more(&provider)?);
        assert_eq!(1, provider.fetches.get());
        assert_eq!(vec!["a", "b"], uids(&listing));

        // the cursor is gone and stays gone
        assert_eq!(LoadOutcome::Exhausted, listing.load_more(&provider)?);
        assert_eq!(1, provider.fetches.get());
        Ok(())
    }

    #[test]
    fn test_failed_load_more_leaves_listing_intact() {
        let provider = Scripted {
            pages: vec![(Cursor::new("2"), Err(provider::Error::MissingMasterRef))],
            fetches: Cell::new(0),
        };
        let mut listing = Listing::new(page(&["a", "b"], Some("2")));
        let before = listing.clone();
        match listing.load_more(&provider) {
            Err(Error::Provider(err)) => assert!(err.is_transient()),
            other => panic!("wanted provider error, got {:?}", other),
        }
        assert_eq!(before, listing);
        assert!(listing.can_load_more());
    }

    #[test]
    fn test_unshapeable_page_leaves_listing_intact() {
        let mut broken = post("b", "2021-01-01T00:00:00+0000");
        broken.uid = None;
        let provider = Scripted {
            pages: vec![(
                Cursor::new("2"),
                Ok(Response {
                    next_page: Some(Cursor::new("3")),
                    results: vec![post("c", "2021-01-01T00:00:00+0000"), broken],
                }),
            )],
            fetches: Cell::new(0),
        };
        let mut listing = Listing::new(page(&["a"], Some("2")));
        assert!(matches!(listing.load_more(&provider), Err(Error::Content(_))));
        assert_eq!(vec!["a"], uids(&listing));
        assert_eq!(Some(&Cursor::new("2")), listing.next_page());
    }

    #[test]
    fn test_fetch_and_drain_memory_provider() -> Result<()> {
        let provider = Memory::new(vec![
            post("c", "2021-03-03T00:00:00+0000"),
            post("b", "2021-03-02T00:00:00+0000"),
            post("a", "2021-03-01T00:00:00+0000"),
        ]);
        let query = Query::new(Predicate::document_type("post")).page_size(2);
        let mut listing = Listing::fetch(&provider, &query)?;
        assert_eq!(vec!["c", "b"], uids(&listing));
        assert!(listing.can_load_more());

        assert_eq!(LoadOutcome::Loaded(1), listing.load_more(&provider)?);
        assert_eq!(vec!["c", "b", "a"], uids(&listing));
        assert_eq!(LoadOutcome::Exhausted, listing.load_more(&provider)?);
        Ok(())
    }
}
