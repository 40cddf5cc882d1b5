use crate::comments::CommentWidget;
use crate::content::{ArticleDetail, ArticleSummary};
use crate::listing::Listing;
use crate::navigation::{Navigation, Target};
use crate::reading::Estimator;
use crate::richtext::safe_url;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Locale};
use gtmpl::{Context, Template};
use gtmpl_value::Value;
use pulldown_cmark::escape::{escape_href, escape_html};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use url::Url;

/// Responsible for templating and writing listing and post pages to disk.
///
/// Templates are Go templates ([`gtmpl`]), which don't escape anything, so
/// every string handed to a template is already HTML-escaped. Fields whose
/// names end in `_html` hold markup and are inserted as-is.
pub struct Writer<'a> {
    /// The template for post pages.
    pub posts_template: &'a Template,

    /// The template for listing pages.
    pub index_template: &'a Template,

    /// The base URL for listing pages. The first listing page is located at
    /// `{index_base_url}/index.html`, the next at `{index_base_url}/1.html`,
    /// etc.
    pub index_base_url: &'a Url,

    /// The directory in which listing pages are written.
    pub index_output_directory: &'a Path,

    /// The base URL for post pages. A post is located at
    /// `{posts_url}/{uid}.html`.
    pub posts_url: &'a Url,

    /// The directory in which post pages are written.
    pub posts_output_directory: &'a Path,

    /// The URL for the site's home page. Also the fallback destination for
    /// post navigation at either end of the article index.
    pub home_page: &'a Url,

    /// The URL for the static assets, typically for the theme's stylesheet.
    pub static_url: &'a Url,

    /// The URL of the site's Atom feed, for feed discovery links.
    pub atom_url: &'a Url,

    pub site_title: &'a str,
    pub dates: &'a DateFormat,
    pub reading: &'a Estimator,
    pub comments: Option<&'a CommentWidget>,
}

/// How dates are displayed: a `strftime`-style format and a locale for month
/// and day names.
#[derive(Clone, Debug, PartialEq)]
pub struct DateFormat {
    format: String,
    locale: Locale,
}

impl DateFormat {
    /// Validates `format` up front; rendering an invalid format would fail
    /// halfway through a page.
    pub fn new(format: &str, locale: Locale) -> Result<DateFormat> {
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(Error::DateFormat(format.to_owned()));
        }
        Ok(DateFormat {
            format: format.to_owned(),
            locale,
        })
    }

    pub fn render(&self, date: &DateTime<FixedOffset>) -> String {
        date.format_localized(&self.format, self.locale).to_string()
    }
}

impl Default for DateFormat {
    /// Day, abbreviated month, and year in Brazilian Portuguese (e.g.,
    /// `25 mar 2021`).
    fn default() -> Self {
        DateFormat {
            format: String::from("%d %b %Y"),
            locale: Locale::pt_BR,
        }
    }
}

impl Writer<'_> {
    /// Returns the URL of the post page for `uid`.
    pub fn post_url(&self, uid: &str) -> Result<Url> {
        Ok(self.posts_url.join(&post_file_name(uid)?)?)
    }

    /// Returns the URL of listing page `number` (zero-based).
    pub fn index_page_url(&self, number: usize) -> Result<Url> {
        Ok(self.index_base_url.join(&index_file_name(number))?)
    }

    /// Templates listing page `number`, which shows every result `listing`
    /// holds so far. Its `next` field is the "load more" link, present only
    /// while the listing has another page; `prev` is always nil since each
    /// page already includes everything before it. Returns the path written.
    pub fn write_index_page(&self, number: usize, listing: &Listing) -> Result<PathBuf> {
        let item = Value::Array(
            listing
                .results()
                .iter()
                .map(|s| self.summary_value(s))
                .collect::<Result<Vec<Value>>>()?,
        );
        let next = match listing.can_load_more() {
            true => url_value(&self.index_page_url(number + 1)?),
            false => Value::Nil,
        };
        let page = Page {
            item,
            file_path: self.index_output_directory.join(index_file_name(number)),
            prev: Value::Nil,
            next,
            extra: vec![("page", Value::String(number.to_string()))],
            template: self.index_template,
        };
        self.write_page(&page)?;
        Ok(page.file_path)
    }

    /// Templates the page for `article`, with previous/next links from
    /// `navigation`. Returns the path written.
    pub fn write_post(&self, article: &ArticleDetail, navigation: &Navigation) -> Result<PathBuf> {
        let page = Page {
            item: self.article_value(article)?,
            file_path: self.posts_output_directory.join(post_file_name(&article.uid)?),
            prev: self.target_value(&navigation.previous)?,
            next: self.target_value(&navigation.next)?,
            extra: vec![(
                "comments_html",
                match self.comments {
                    Some(widget) => Value::String(widget.to_html()),
                    None => Value::Nil,
                },
            )],
            template: self.posts_template,
        };
        self.write_page(&page)?;
        Ok(page.file_path)
    }

    /// Takes a single [`Page`], templates it, and writes it to disk.
    fn write_page(&self, page: &Page) -> Result<()> {
        let mut m = page.to_map();
        m.insert("home_page".to_owned(), url_value(self.home_page));
        m.insert("static_url".to_owned(), url_value(self.static_url));
        m.insert("atom_url".to_owned(), url_value(self.atom_url));
        m.insert("site_title".to_owned(), text(self.site_title));

        if let Some(dir) = page.file_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        page.template.execute(
            &mut std::fs::File::create(&page.file_path)?,
            &Context::from(Value::Object(m))?,
        )?;
        Ok(())
    }

    fn date_values(&self, m: &mut HashMap<String, Value>, date: &Option<DateTime<FixedOffset>>) {
        let (display, machine) = match date {
            Some(date) => (text(&self.dates.render(date)), text(&date.to_rfc3339())),
            None => (Value::Nil, Value::Nil),
        };
        m.insert("date".to_owned(), display);
        m.insert("datetime".to_owned(), machine);
    }

    fn summary_value(&self, summary: &ArticleSummary) -> Result<Value> {
        let mut m = HashMap::new();
        m.insert("uid".to_owned(), text(&summary.uid));
        m.insert("url".to_owned(), url_value(&self.post_url(&summary.uid)?));
        m.insert("title".to_owned(), text(&summary.title));
        m.insert("subtitle".to_owned(), text(&summary.subtitle));
        m.insert("author".to_owned(), text(&summary.author));
        self.date_values(&mut m, &summary.published_at);
        Ok(Value::Object(m))
    }

    fn article_value(&self, article: &ArticleDetail) -> Result<Value> {
        let resolve = |uid: &str| self.post_url(uid).ok().map(|url| url.to_string());

        let mut m = HashMap::new();
        m.insert("uid".to_owned(), text(&article.uid));
        m.insert("url".to_owned(), url_value(&self.post_url(&article.uid)?));
        m.insert("title".to_owned(), text(&article.title));
        m.insert("subtitle".to_owned(), text(&article.subtitle));
        m.insert("author".to_owned(), text(&article.author));
        m.insert(
            "banner_url".to_owned(),
            // unsafe schemes are dropped like rich-text image sources
            match article.banner_url.as_deref().and_then(safe_url) {
                Some(url) => href(url),
                None => Value::Nil,
            },
        );
        m.insert(
            "reading_minutes".to_owned(),
            Value::String(self.reading.estimate(&article.content).minutes.to_string()),
        );
        m.insert(
            "content".to_owned(),
            Value::Array(
                article
                    .content
                    .iter()
                    .map(|section| {
                        let mut s = HashMap::new();
                        s.insert("heading".to_owned(), text(&section.heading));
                        s.insert(
                            "body_html".to_owned(),
                            Value::String(section.body.as_html(&resolve)),
                        );
                        Value::Object(s)
                    })
                    .collect(),
            ),
        );
        self.date_values(&mut m, &article.published_at);
        Ok(Value::Object(m))
    }

    /// Converts a navigation target into a template value. The home fallback
    /// becomes nil so templates can branch on it.
    fn target_value(&self, target: &Target) -> Result<Value> {
        Ok(match target {
            Target::Home => Value::Nil,
            Target::Article(entry) => {
                let mut m = HashMap::new();
                m.insert("uid".to_owned(), text(&entry.uid));
                m.insert("title".to_owned(), text(&entry.title));
                m.insert("url".to_owned(), url_value(&self.post_url(&entry.uid)?));
                Value::Object(m)
            }
        })
    }
}

/// An object representing an output HTML file. A [`Page`] is rendered from a
/// map with the fields `item`, `prev`, and `next`, plus any `extra` fields.
struct Page<'a> {
    /// The main item for the page.
    item: Value,

    /// The target location on disk for the output file.
    file_path: PathBuf,

    prev: Value,
    next: Value,
    extra: Vec<(&'static str, Value)>,

    /// The template with which the page will be rendered.
    template: &'a Template,
}

impl Page<'_> {
    fn to_map(&self) -> HashMap<String, Value> {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("item".to_owned(), self.item.clone());
        m.insert("prev".to_owned(), self.prev.clone());
        m.insert("next".to_owned(), self.next.clone());
        for (key, value) in &self.extra {
            m.insert((*key).to_owned(), value.clone());
        }
        m
    }
}

fn index_file_name(number: usize) -> String {
    match number {
        0 => String::from("index.html"),
        _ => format!("{}.html", number),
    }
}

/// Returns the file name for a post. UIDs end up in paths on disk, so only
/// slug-like UIDs are accepted.
fn post_file_name(uid: &str) -> Result<String> {
    let valid = !uid.is_empty()
        && !uid.starts_with('.')
        && uid
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.');
    match valid {
        true => Ok(format!("{}.html", uid)),
        false => Err(Error::InvalidUid(uid.to_owned())),
    }
}

fn text(s: &str) -> Value {
    let mut escaped = String::with_capacity(s.len());
    let _ = escape_html(&mut escaped, s);
    Value::String(escaped)
}

fn href(url: &str) -> Value {
    let mut escaped = String::with_capacity(url.len());
    let _ = escape_href(&mut escaped, url);
    Value::String(escaped)
}

fn url_value(url: &Url) -> Value {
    href(url.as_str())
}

/// The result of a fallible page-writing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a page-writing operation.
#[derive(Debug)]
pub enum Error {
    /// An error during templating.
    Template(String),

    /// An error writing the output files.
    Io(io::Error),

    /// Returned when there is a problem building page URLs.
    UrlParse(url::ParseError),

    /// Returned when a UID can't be used as a file name.
    InvalidUid(String),

    /// Returned when a date format string is invalid.
    DateFormat(String),
}

impl From<io::Error> for Error {
    /// Converts an [`io::Error`] into an [`Error`]. This allows us to use the
    /// `?` operator for fallible I/O operations.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<String> for Error {
    /// Converts a template error message ([`String`]) into an [`Error`]. This
    /// allows us to use the `?` operator for fallible template operations.
    fn from(err: String) -> Error {
        Error::Template(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Template(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
            Error::UrlParse(err) => err.fmt(f),
            Error::InvalidUid(uid) => write!(f, "uid `{}` can't be used as a file name", uid),
            Error::DateFormat(format) => write!(f, "invalid date format `{}`", format),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::UrlParse(err) => Some(err),
            Error::Template(_) | Error::InvalidUid(_) | Error::DateFormat(_) => None,
        }
    }
}
