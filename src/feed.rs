//! Support for creating Atom feeds from the site's articles.

use crate::config::Author;
use crate::content::ArticleDetail;
use atom_syndication::{Entry, Error as AtomError, Feed, Link, Person, Text};
use chrono::{DateTime, FixedOffset, Utc};
use std::fmt;
use std::io::Write;
use url::Url;

/// Bundled configuration for creating a feed.
pub struct FeedConfig {
    pub title: String,
    pub id: String,
    pub author: Option<Author>,
    pub home_page: Url,
}

/// Creates a feed from some configuration ([`FeedConfig`]) and the site's
/// articles, paired with their page URLs, and writes the result to a
/// [`std::io::Write`].
pub fn write_feed<W: Write>(
    config: FeedConfig,
    articles: &[(ArticleDetail, Url)],
    w: W,
) -> Result<()> {
    feed(config, articles, Utc::now().into()).write_to(w)?;
    Ok(())
}

/// Builds the feed. The feed's `updated` time is that of its newest article,
/// or `now` when no article has a publication date.
fn feed(
    config: FeedConfig,
    articles: &[(ArticleDetail, Url)],
    now: DateTime<FixedOffset>,
) -> Feed {
    let entries = feed_entries(&config, articles, now);
    let updated = articles
        .iter()
        .filter_map(|(article, _)| article.published_at)
        .max()
        .unwrap_or(now);

    let mut feed = Feed::default();
    feed.set_title(config.title);
    feed.set_id(config.id);
    feed.set_updated(updated);
    feed.set_authors(author_to_people(config.author));
    feed.set_links(vec![alternate(config.home_page.as_str())]);
    feed.set_entries(entries);
    feed
}

fn feed_entries(
    config: &FeedConfig,
    articles: &[(ArticleDetail, Url)],
    now: DateTime<FixedOffset>,
) -> Vec<Entry> {
    let mut entries: Vec<Entry> = Vec::with_capacity(articles.len());

    for (article, url) in articles {
        let mut entry = Entry::default();
        entry.set_id(url.to_string());
        entry.set_title(article.title.clone());
        entry.set_updated(article.published_at.unwrap_or(now));
        entry.set_published(article.published_at);
        entry.set_links(vec![alternate(url.as_str())]);
        if !article.subtitle.is_empty() {
            entry.set_summary(Some(Text::from(article.subtitle.clone())));
        }
        // the article's own byline wins over the site author
        entry.set_authors(match article.author.is_empty() {
            true => author_to_people(config.author.clone()),
            false => {
                let mut person = Person::default();
                person.set_name(article.author.clone());
                vec![person]
            }
        });
        entries.push(entry);
    }
    entries
}

fn alternate(href: &str) -> Link {
    let mut link = Link::default();
    link.set_href(href);
    link.set_rel("alternate");
    link
}

fn author_to_people(author: Option<Author>) -> Vec<Person> {
    match author {
        Some(author) => {
            let mut person = Person::default();
            person.set_name(author.name);
            person.set_email(author.email);
            vec![person]
        }
        None => Vec::new(),
    }
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed.
#[derive(Debug)]
pub enum Error {
    /// Returned when there is a generic I/O error.
    Io(std::io::Error),

    /// Returned when there is an Atom-related error.
    Atom(AtomError),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Atom(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Atom(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator in fallible feed operations.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<AtomError> for Error {
    /// Converts [`AtomError`]s into [`Error`]. This allows us to use the `?`
    /// operator in fallible feed operations.
    fn from(err: AtomError) -> Error {
        Error::Atom(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::content::parse_timestamp;

    fn article(uid: &str, date: Option<&str>, author: &str) -> (ArticleDetail, Url) {
        (
            ArticleDetail {
                uid: uid.to_owned(),
                published_at: date.and_then(parse_timestamp),
                title: uid.to_uppercase(),
                subtitle: format!("about {}", uid),
                banner_url: None,
                author: author.to_owned(),
                content: Vec::new(),
            },
            Url::parse(&format!("https://blog.example.org/posts/{}.html", uid)).unwrap(),
        )
    }

    fn config() -> FeedConfig {
        FeedConfig {
            title: String::from("blog"),
            id: String::from("https://blog.example.org/index.html"),
            author: Some(Author {
                name: String::from("Site"),
                email: None,
            }),
            home_page: Url::parse("https://blog.example.org/index.html").unwrap(),
        }
    }

    #[test]
    fn test_feed() {
        let now = parse_timestamp("2022-01-01T00:00:00+0000").unwrap();
        let articles = vec![
            article("b", Some("2021-04-01T10:00:00+0000"), "Ana"),
            article("a", Some("2021-03-25T19:25:28+0000"), ""),
            article("draft", None, ""),
        ];
        let feed = feed(config(), &articles, now);

        assert_eq!(
            parse_timestamp("2021-04-01T10:00:00+0000").unwrap(),
            *feed.updated()
        );
        assert_eq!(3, feed.entries().len());

        let first = &feed.entries()[0];
        assert_eq!("https://blog.example.org/posts/b.html", first.id());
        assert_eq!("Ana", first.authors()[0].name());
        assert_eq!("https://blog.example.org/posts/b.html", first.links()[0].href());

        let second = &feed.entries()[1];
        assert_eq!("Site", second.authors()[0].name());

        let draft = &feed.entries()[2];
        assert_eq!(None, draft.published());
        assert_eq!(now, *draft.updated());
    }

    #[test]
    fn test_write_feed() -> Result<()> {
        let mut out = Vec::new();
        write_feed(
            config(),
            &[article("a", Some("2021-03-25T19:25:28+0000"), "")],
            &mut out,
        )?;
        let xml = String::from_utf8(out).unwrap();
        assert!(xml.contains(">A</title>"));
        assert!(xml.contains("about a"));
        Ok(())
    }
}
