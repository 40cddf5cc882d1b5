//! Loads project configuration from `quill.yaml` and the theme's
//! `theme/theme.yaml`, and resolves it into the URLs and paths a build needs.

use crate::comments::CommentWidget;
use crate::provider::memory::Memory;
use crate::provider::prismic::Client;
use crate::provider::retry::{RetryPolicy, Retrying};
use crate::provider::{self, Predicate, Provider, Query};
use crate::reading::Estimator;
use crate::write::DateFormat;
use chrono::Locale;
use serde::Deserialize;
use std::convert::TryFrom;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the project file.
pub const PROJECT_FILE: &str = "quill.yaml";

/// The environment variable consulted when the project doesn't set a Prismic
/// access token.
pub const ACCESS_TOKEN_VAR: &str = "PRISMIC_ACCESS_TOKEN";

#[derive(Deserialize)]
struct PageSize(usize);
impl Default for PageSize {
    fn default() -> Self {
        PageSize(2)
    }
}

/// The site author, credited in the feed.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Author {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,
}

/// Where documents come from.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderConfig {
    /// A hosted Prismic repository.
    Prismic {
        endpoint: Url,

        #[serde(default)]
        access_token: Option<String>,
    },

    /// A directory of JSON documents, relative to the project root.
    Directory(PathBuf),
}

#[derive(Deserialize)]
#[serde(default)]
struct Dates {
    format: String,
    locale: String,
}

impl Default for Dates {
    fn default() -> Self {
        Dates {
            format: String::from("%d %b %Y"),
            locale: String::from("pt_BR"),
        }
    }
}

fn default_home_page() -> String {
    String::from("index.html")
}

fn default_document_type() -> String {
    String::from("post")
}

#[derive(Deserialize)]
struct Project {
    title: String,
    site_root: Url,

    #[serde(default = "default_home_page")]
    home_page: String,

    #[serde(default)]
    author: Option<Author>,

    #[serde(default)]
    index_page_size: PageSize,

    #[serde(default = "default_document_type")]
    document_type: String,

    #[serde(default)]
    orderings: Option<String>,

    provider: ProviderConfig,

    #[serde(default)]
    retry: RetryPolicy,

    #[serde(default)]
    reading: Estimator,

    #[serde(default)]
    dates: Dates,

    #[serde(default)]
    comments: Option<CommentWidget>,
}

#[derive(Deserialize)]
struct Theme {
    index_template: Vec<PathBuf>,
    posts_template: Vec<PathBuf>,
}

/// Everything a build needs, with URLs joined onto the site root and paths
/// joined onto the project root or output directory.
pub struct Config {
    pub title: String,
    pub author: Option<Author>,

    pub provider: ProviderConfig,
    pub document_type: String,
    pub orderings: Option<String>,
    pub index_page_size: usize,
    pub retry: RetryPolicy,

    pub reading: Estimator,
    pub dates: DateFormat,
    pub comments: Option<CommentWidget>,

    pub home_page: Url,
    pub index_url: Url,
    pub posts_url: Url,
    pub static_url: Url,
    pub atom_url: Url,

    pub index_template: Vec<PathBuf>,
    pub posts_template: Vec<PathBuf>,
    pub static_source_directory: PathBuf,

    pub root_output_directory: PathBuf,
    pub index_output_directory: PathBuf,
    pub posts_output_directory: PathBuf,
    pub static_output_directory: PathBuf,
}

impl Config {
    /// Searches `dir` and then each of its ancestors for a project file, and
    /// loads the first one found.
    pub fn from_directory(dir: &Path, output_directory: &Path) -> Result<Config> {
        let mut current = Some(dir);
        while let Some(dir) = current {
            let path = dir.join(PROJECT_FILE);
            if path.exists() {
                return Config::from_project_file(&path, output_directory);
            }
            current = dir.parent();
        }
        Err(Error::ProjectNotFound(dir.to_owned()))
    }

    pub fn from_project_file(path: &Path, output_directory: &Path) -> Result<Config> {
        let project: Project = serde_yaml::from_reader(open(path)?)
            .map_err(|err| Error::Yaml {
                path: path.to_owned(),
                err,
            })?;
        let project_root = path
            .parent()
            .ok_or_else(|| Error::ProjectNotFound(path.to_owned()))?;

        let theme_dir = project_root.join("theme");
        let theme_path = theme_dir.join("theme.yaml");
        let theme: Theme = serde_yaml::from_reader(open(&theme_path)?).map_err(|err| {
            Error::Yaml {
                path: theme_path.clone(),
                err,
            }
        })?;

        let locale = Locale::try_from(project.dates.locale.as_str())
            .map_err(|_| Error::UnknownLocale(project.dates.locale.clone()))?;
        let dates = DateFormat::new(&project.dates.format, locale)
            .map_err(|_| Error::DateFormat(project.dates.format.clone()))?;

        let site_root = directory_url(project.site_root);
        Ok(Config {
            title: project.title,
            author: project.author,
            provider: match project.provider {
                ProviderConfig::Directory(dir) => {
                    ProviderConfig::Directory(project_root.join(dir))
                }
                prismic => prismic,
            },
            document_type: project.document_type,
            orderings: project.orderings,
            index_page_size: project.index_page_size.0,
            retry: project.retry,
            reading: project.reading,
            dates,
            comments: project.comments,
            home_page: site_root.join(&project.home_page)?,
            index_url: site_root.join("pages/")?,
            posts_url: site_root.join("posts/")?,
            static_url: site_root.join("static/")?,
            atom_url: site_root.join("feed.atom")?,
            index_template: theme
                .index_template
                .iter()
                .map(|relpath| theme_dir.join(relpath))
                .collect(),
            posts_template: theme
                .posts_template
                .iter()
                .map(|relpath| theme_dir.join(relpath))
                .collect(),
            static_source_directory: project_root.join("static"),
            root_output_directory: output_directory.to_owned(),
            index_output_directory: output_directory.join("pages"),
            posts_output_directory: output_directory.join("posts"),
            static_output_directory: output_directory.join("static"),
        })
    }

    /// The listing query: every document of the configured type, one
    /// listing page at a time.
    pub fn query(&self) -> Query {
        Query::new(Predicate::document_type(&self.document_type))
            .page_size(self.index_page_size)
            .orderings(self.orderings.clone())
    }

    /// Opens the configured provider, wrapped so its calls follow the retry
    /// policy.
    pub fn connect(&self) -> Result<Retrying<Box<dyn Provider>>> {
        let provider: Box<dyn Provider> = match &self.provider {
            ProviderConfig::Prismic {
                endpoint,
                access_token,
            } => {
                let access_token = access_token
                    .clone()
                    .or_else(|| std::env::var(ACCESS_TOKEN_VAR).ok());
                Box::new(self.retry.run("connecting to provider", || {
                    Client::connect(endpoint.clone(), access_token.clone())
                })?)
            }
            ProviderConfig::Directory(dir) => Box::new(Memory::from_directory(dir)?),
        };
        Ok(Retrying::new(provider, self.retry))
    }
}

/// Makes sure `url` ends in a slash so that joining onto it appends rather
/// than replacing its last path segment.
fn directory_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|err| Error::Open {
        path: path.to_owned(),
        err,
    })
}

/// The result of loading configuration.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading configuration or opening the provider it
/// names.
#[derive(Debug)]
pub enum Error {
    /// Returned when no project file exists in a directory or its ancestors.
    ProjectNotFound(PathBuf),

    /// Returned when a configuration file can't be opened.
    Open { path: PathBuf, err: std::io::Error },

    /// Returned when a configuration file isn't valid.
    Yaml {
        path: PathBuf,
        err: serde_yaml::Error,
    },

    /// Returned when `dates.locale` isn't a known locale.
    UnknownLocale(String),

    /// Returned when `dates.format` isn't a valid format string.
    DateFormat(String),

    /// Returned when a site URL can't be built.
    UrlParse(url::ParseError),

    /// Returned when the provider can't be opened.
    Provider(provider::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ProjectNotFound(dir) => write!(
                f,
                "could not find `{}` in `{}` or any parent directory",
                PROJECT_FILE,
                dir.display()
            ),
            Error::Open { path, err } => write!(f, "opening `{}`: {}", path.display(), err),
            Error::Yaml { path, err } => write!(f, "loading `{}`: {}", path.display(), err),
            Error::UnknownLocale(locale) => write!(f, "unknown locale `{}`", locale),
            Error::DateFormat(format) => write!(f, "invalid date format `{}`", format),
            Error::UrlParse(err) => err.fmt(f),
            Error::Provider(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open { err, .. } => Some(err),
            Error::Yaml { err, .. } => Some(err),
            Error::UrlParse(err) => Some(err),
            Error::Provider(err) => Some(err),
            Error::ProjectNotFound(_) | Error::UnknownLocale(_) | Error::DateFormat(_) => None,
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

impl From<provider::Error> for Error {
    fn from(err: provider::Error) -> Error {
        Error::Provider(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    const THEME: &str = "index_template: [index.html]\nposts_template: [base.html, post.html]\n";

    fn project(yaml: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PROJECT_FILE), yaml).unwrap();
        fs::create_dir(dir.path().join("theme")).unwrap();
        fs::write(dir.path().join("theme").join("theme.yaml"), THEME).unwrap();
        dir
    }

    #[test]
    fn test_defaults() -> Result<()> {
        let dir = project(
            "title: blog\nsite_root: https://blog.example.org/blog\nprovider:\n  directory: content\n",
        );
        let out = dir.path().join("out");
        let config = Config::from_project_file(&dir.path().join(PROJECT_FILE), &out)?;

        assert_eq!(2, config.index_page_size);
        assert_eq!("post", config.document_type);
        assert_eq!(RetryPolicy::default(), config.retry);
        assert_eq!(Estimator::default(), config.reading);
        assert_eq!(DateFormat::default(), config.dates);
        assert_eq!(None, config.comments);
        assert_eq!(
            ProviderConfig::Directory(dir.path().join("content")),
            config.provider
        );
        assert_eq!("https://blog.example.org/blog/index.html", config.home_page.as_str());
        assert_eq!("https://blog.example.org/blog/pages/", config.index_url.as_str());
        assert_eq!("https://blog.example.org/blog/posts/", config.posts_url.as_str());
        assert_eq!(
            vec![
                dir.path().join("theme").join("base.html"),
                dir.path().join("theme").join("post.html")
            ],
            config.posts_template
        );
        assert_eq!(out.join("pages"), config.index_output_directory);
        Ok(())
    }

    #[test]
    fn test_full_project() -> Result<()> {
        let dir = project(
            r#"
title: spacetraveling
site_root: https://blog.example.org/
home_page: pages/index.html
author: { name: Ana, email: ana@example.org }
index_page_size: 5
orderings: "[document.first_publication_date desc]"
provider:
  prismic: { endpoint: "https://blog.cdn.prismic.io/api/v2", access_token: abc }
retry: { max_retries: 1 }
reading: { words_per_minute: 100, minimum_minutes: 1 }
dates: { format: "%Y-%m-%d", locale: en_US }
comments: { repo: owner/blog }
"#,
        );
        let config = Config::from_project_file(&dir.path().join(PROJECT_FILE), dir.path())?;
        assert_eq!(5, config.index_page_size);
        assert_eq!(1, config.retry.max_retries);
        assert_eq!(250, config.retry.initial_backoff_ms);
        assert_eq!(100, config.reading.words_per_minute);
        assert_eq!(Some(CommentWidget::new("owner/blog")), config.comments);
        assert_eq!(
            Some(Author {
                name: String::from("Ana"),
                email: Some(String::from("ana@example.org")),
            }),
            config.author
        );
        assert!(matches!(
            &config.provider,
            ProviderConfig::Prismic { access_token: Some(token), .. } if token == "abc"
        ));
        assert_eq!(
            "[[at(document.type, \"post\")]]",
            config.query().q()
        );
        assert_eq!(Some(5), config.query().page_size);
        Ok(())
    }

    #[test]
    fn test_from_directory_searches_upwards() -> Result<()> {
        let dir = project(
            "title: blog\nsite_root: https://blog.example.org/\nprovider:\n  directory: content\n",
        );
        let nested = dir.path().join("content").join("drafts");
        fs::create_dir_all(&nested).unwrap();
        let config = Config::from_directory(&nested, &dir.path().join("out"))?;
        assert_eq!("blog", config.title);
        Ok(())
    }

    #[test]
    fn test_bad_dates() {
        let dir = project(
            "title: blog\nsite_root: https://blog.example.org/\nprovider:\n  directory: content\ndates: { locale: xx_YY }\n",
        );
        assert!(matches!(
            Config::from_project_file(&dir.path().join(PROJECT_FILE), dir.path()),
            Err(Error::UnknownLocale(_))
        ));
    }

    #[test]
    fn test_directory_url() {
        let url = Url::parse("https://example.org/blog").unwrap();
        assert_eq!("https://example.org/blog/", directory_url(url).as_str());
        let url = Url::parse("https://example.org/").unwrap();
        assert_eq!("https://example.org/", directory_url(url).as_str());
    }
}
