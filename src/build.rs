//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output static site: fetching the listing one page at
//! a time ([`crate::listing`]), fetching and rendering every article
//! ([`crate::write`]), copying the static source directory into the static
//! output directory, and generating the Atom feed.

use crate::config::{self, Config};
use crate::content::{self, ArticleDetail, ListPage, NavEntry};
use crate::feed::{self, write_feed, FeedConfig};
use crate::listing::{self, Listing, LoadOutcome};
use crate::navigation;
use crate::provider::{self, Provider};
use crate::write::{self, Writer};
use gtmpl::Template;
use std::collections::HashSet;
use std::convert::TryFrom;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;
use walkdir::WalkDir;

/// What a build produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    /// The number of listing pages written.
    pub listing_pages: usize,

    /// The uids of the articles written, in listing order.
    pub articles: Vec<String>,

    /// The number of static files copied.
    pub static_files: usize,
}

/// Builds the site from a [`Config`] object, opening the provider it
/// configures. See [`build_site_with`].
pub fn build_site(config: &Config) -> Result<Report> {
    let provider = config.connect()?;
    build_site_with(config, &provider)
}

/// Builds the site from documents served by `provider`. The listing is
/// rendered the way a reader would see it: the first page, then once more
/// after every "load more" until the provider runs out of pages. Every
/// article in the listing then gets its own page, linked to its neighbors.
pub fn build_site_with(config: &Config, provider: &dyn Provider) -> Result<Report> {
    // Parse the template files.
    let index_template = parse_template(config.index_template.iter())?;
    let posts_template = parse_template(config.posts_template.iter())?;

    // Blow away the old output directories so we don't have any collisions.
    // The root output directory itself is left alone in case the user passes
    // the wrong directory.
    rmdir(&config.posts_output_directory)?;
    rmdir(&config.index_output_directory)?;
    rmdir(&config.static_output_directory)?;

    let writer = Writer {
        posts_template: &posts_template,
        index_template: &index_template,
        index_base_url: &config.index_url,
        index_output_directory: &config.index_output_directory,
        posts_url: &config.posts_url,
        posts_output_directory: &config.posts_output_directory,
        home_page: &config.home_page,
        static_url: &config.static_url,
        atom_url: &config.atom_url,
        site_title: &config.title,
        dates: &config.dates,
        reading: &config.reading,
        comments: config.comments.as_ref(),
    };
    let mut report = Report::default();

    // write the listing pages
    let mut listing = Listing::fetch(provider, &config.query())?;
    writer.write_index_page(0, &listing)?;
    report.listing_pages = 1;
    loop {
        match listing.load_more(provider)? {
            LoadOutcome::Exhausted => break,
            LoadOutcome::Loaded(0) if listing.can_load_more() => {
                // an empty page that still points further would never end
                warn!(
                    cursor = ?listing.next_page(),
                    "provider returned an empty page with a cursor; stopping"
                );
                // the last page written links to a page that won't exist
                let finished = Listing::new(ListPage {
                    next_page: None,
                    results: listing.results().to_vec(),
                });
                writer.write_index_page(report.listing_pages - 1, &finished)?;
                break;
            }
            LoadOutcome::Loaded(loaded) => {
                writer.write_index_page(report.listing_pages, &listing)?;
                debug!(page = report.listing_pages, loaded, "wrote listing page");
                report.listing_pages += 1;
            }
        }
    }
    info!(
        pages = report.listing_pages,
        articles = listing.results().len(),
        "wrote listing"
    );

    // write the article pages
    let index: Vec<NavEntry> = listing.results().iter().map(NavEntry::from).collect();
    let mut written = HashSet::new();
    let mut articles: Vec<(ArticleDetail, Url)> = Vec::with_capacity(index.len());
    for entry in &index {
        if !written.insert(entry.uid.as_str()) {
            debug!(uid = %entry.uid, "skipping repeated listing entry");
            continue;
        }
        let document = provider.get_by_uid(&config.document_type, &entry.uid)?;
        let article = ArticleDetail::try_from(document)?;
        let path = writer.write_post(&article, &navigation::resolve(&index, &article.uid))?;
        debug!(uid = %article.uid, path = %path.display(), "wrote article");
        report.articles.push(article.uid.clone());
        let url = writer.post_url(&article.uid)?;
        articles.push((article, url));
    }
    info!(articles = report.articles.len(), "wrote articles");

    // copy static directory
    report.static_files = copy_dir(
        &config.static_source_directory,
        &config.static_output_directory,
    )?;

    // copy /pages/index.html to /index.html
    let _ = std::fs::copy(
        &config.index_output_directory.join("index.html"),
        &config.root_output_directory.join("index.html"),
    )?;

    // create the atom feed
    write_feed(
        FeedConfig {
            title: config.title.clone(),
            id: config.home_page.to_string(),
            author: config.author.clone(),
            home_page: config.home_page.clone(),
        },
        &articles,
        File::create(config.root_output_directory.join("feed.atom"))?,
    )?;
    info!(
        output = %config.root_output_directory.display(),
        static_files = report.static_files,
        "build finished"
    );

    Ok(report)
}

/// Copies `src` into `dst` recursively, returning the number of files
/// copied. A missing `src` copies nothing.
fn copy_dir(src: &Path, dst: &Path) -> Result<usize> {
    if !src.is_dir() {
        debug!(dir = %src.display(), "no static directory");
        return Ok(0);
    }
    let mut copied = 0;
    for result in WalkDir::new(src) {
        let entry = result?;
        let relative = match entry.path().strip_prefix(src) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

// Loads the template file contents, concatenates them, and parses the result
// into a template.
fn parse_template<P: AsRef<Path>>(template_files: impl Iterator<Item = P>) -> Result<Template> {
    let mut contents = String::new();
    for template_file in template_files {
        use std::io::Read;
        let template_file = template_file.as_ref();
        File::open(&template_file)
            .map_err(|e| Error::OpenTemplateFile {
                path: template_file.to_owned(),
                err: e,
            })?
            .read_to_string(&mut contents)?;
        contents.push(' ');
    }

    let mut template = Template::default();
    template.parse(&contents).map_err(Error::ParseTemplate)?;
    Ok(template)
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors can be during configuration,
/// fetching, shaping, writing, cleaning output directories, parsing template
/// files, and other I/O.
#[derive(Debug)]
pub enum Error {
    /// Returned when the configured provider can't be opened.
    Config(config::Error),

    /// Returned when a listing page can't be fetched.
    Listing(listing::Error),

    /// Returned when an article can't be fetched.
    Provider(provider::Error),

    /// Returned when an article can't be shaped.
    Content(content::Error),

    /// Returned for errors writing pages to disk as HTML files.
    Write(write::Error),

    /// Returned for I/O problems while cleaning output directories.
    Clean { path: PathBuf, err: std::io::Error },

    /// Returned for I/O problems while opening template files.
    OpenTemplateFile { path: PathBuf, err: std::io::Error },

    /// Returned for errors parsing template files.
    ParseTemplate(String),

    /// Returned for errors writing the feed.
    Feed(feed::Error),

    /// Returned for errors walking the static directory.
    WalkDir(walkdir::Error),

    /// Returned for other I/O errors.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Config(err) => err.fmt(f),
            Error::Listing(err) => err.fmt(f),
            Error::Provider(err) => write!(f, "fetching article: {}", err),
            Error::Content(err) => err.fmt(f),
            Error::Write(err) => err.fmt(f),
            Error::Clean { path, err } => {
                write!(f, "Cleaning directory '{}': {}", path.display(), err)
            }
            Error::OpenTemplateFile { path, err } => {
                write!(f, "Opening template file '{}': {}", path.display(), err)
            }
            Error::ParseTemplate(err) => err.fmt(f),
            Error::Feed(err) => err.fmt(f),
            Error::WalkDir(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(err) => Some(err),
            Error::Listing(err) => Some(err),
            Error::Provider(err) => Some(err),
            Error::Content(err) => Some(err),
            Error::Write(err) => Some(err),
            Error::Clean { path: _, err } => Some(err),
            Error::OpenTemplateFile { path: _, err } => Some(err),
            Error::ParseTemplate(_) => None,
            Error::Feed(err) => Some(err),
            Error::WalkDir(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<config::Error> for Error {
    fn from(err: config::Error) -> Error {
        Error::Config(err)
    }
}

impl From<listing::Error> for Error {
    fn from(err: listing::Error) -> Error {
        Error::Listing(err)
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

impl From<write::Error> for Error {
    /// Converts [`write::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: write::Error) -> Error {
        Error::Write(err)
    }
}

impl From<feed::Error> for Error {
    /// Converts [`feed::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: feed::Error) -> Error {
        Error::Feed(err)
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}

fn rmdir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    #[test]
    fn test_copy_dir() -> Result<()> {
        let src = tempfile::tempdir()?;
        fs::create_dir_all(src.path().join("images"))?;
        fs::write(src.path().join("style.css"), "body {}")?;
        fs::write(src.path().join("images").join("logo.svg"), "<svg/>")?;

        let dst = tempfile::tempdir()?;
        let out = dst.path().join("static");
        assert_eq!(2, copy_dir(src.path(), &out)?);
        assert_eq!("<svg/>", fs::read_to_string(out.join("images").join("logo.svg"))?);
        assert_eq!(0, copy_dir(&src.path().join("missing"), &dst.path().join("x"))?);
        Ok(())
    }

    #[test]
    fn test_parse_template_concatenates_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("base.html"), "<head>")?;
        fs::write(dir.path().join("page.html"), "<body>")?;
        let template = parse_template(
            vec![dir.path().join("base.html"), dir.path().join("page.html")].iter(),
        )?;
        let rendered = template
            .render(&gtmpl::Context::empty())
            .map_err(Error::ParseTemplate)?;
        assert_eq!("<head> <body>", rendered.trim());
        Ok(())
    }

    #[test]
    fn test_missing_template() {
        assert!(matches!(
            parse_template(vec![PathBuf::from("/nonexistent/index.html")].iter()),
            Err(Error::OpenTemplateFile { .. })
        ));
    }

    #[test]
    fn test_rmdir_missing_is_ok() -> Result<()> {
        let dir = tempfile::tempdir()?;
        rmdir(&dir.path().join("missing"))
    }
}
