//! The library code for the `quill` static blog generator. A build has two
//! halves:
//!
//! 1. Fetching articles from a content provider ([`crate::provider`]) and
//!    shaping them into summaries and details ([`crate::content`])
//! 2. Rendering the listing and article pages to disk ([`crate::write`])
//!
//! The listing is rendered the way a reader pressing "load more" would see it.
//! A [`listing::Listing`] starts from the first page of summaries and grows by
//! one provider page per [`listing::Listing::load_more`], and each state is
//! written out as its own listing page linking to the next. Every article then
//! gets a page of its own, with its content rendered from rich text
//! ([`crate::richtext`]), a reading-time estimate ([`crate::reading`]),
//! previous/next links ([`crate::navigation`]) and, optionally, a comment
//! widget ([`crate::comments`]).
//!
//! [`build::build_site`] ties the steps together, driven by a
//! [`config::Config`].

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod comments;
pub mod config;
pub mod content;
pub mod feed;
pub mod listing;
pub mod navigation;
pub mod provider;
pub mod reading;
pub mod richtext;
pub mod write;
