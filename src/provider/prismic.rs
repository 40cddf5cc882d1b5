//! A [`Provider`] backed by a hosted Prismic repository's REST API (v2).

use super::{Cursor, Document, Error, Predicate, Provider, Query, Response, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

const TIMEOUT: Duration = Duration::from_secs(30);
const ACCESS_TOKEN: &str = "access_token";

/// A client for one Prismic repository. Searches are pinned to the master ref
/// that was current when the client connected.
pub struct Client {
    http: reqwest::blocking::Client,

    /// The API root, e.g. `https://{repository}.cdn.prismic.io/api/v2`.
    endpoint: Url,

    access_token: Option<String>,
    master_ref: String,
}

#[derive(Deserialize)]
struct ApiInfo {
    #[serde(default)]
    refs: Vec<Ref>,
}

#[derive(Deserialize)]
struct Ref {
    #[serde(rename = "ref")]
    reference: String,

    #[serde(default, rename = "isMasterRef")]
    is_master_ref: bool,
}

impl Client {
    /// Connects to the API at `endpoint` and looks up its master ref.
    pub fn connect(endpoint: Url, access_token: Option<String>) -> Result<Client> {
        let http = reqwest::blocking::Client::builder()
            .timeout(TIMEOUT)
            .user_agent(concat!("quill/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut api_url = endpoint.clone();
        if let Some(token) = &access_token {
            api_url.query_pairs_mut().append_pair(ACCESS_TOKEN, token);
        }
        let info: ApiInfo = get_json(&http, api_url)?;
        let master_ref = info
            .refs
            .into_iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference)
            .ok_or(Error::MissingMasterRef)?;
        debug!(endpoint = %endpoint, master_ref = %master_ref, "connected to provider");

        Ok(Client {
            http,
            endpoint,
            access_token,
            master_ref,
        })
    }

    /// Builds the search URL for `query`.
    pub fn search_url(&self, query: &Query) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/documents/search",
            self.endpoint.as_str().trim_end_matches('/')
        ))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("ref", &self.master_ref);
            pairs.append_pair("q", &query.q());
            if let Some(page_size) = query.page_size {
                pairs.append_pair("pageSize", &page_size.to_string());
            }
            if let Some(orderings) = &query.orderings {
                pairs.append_pair("orderings", orderings);
            }
            if let Some(token) = &self.access_token {
                pairs.append_pair(ACCESS_TOKEN, token);
            }
        }
        Ok(url)
    }

    /// Turns a cursor back into a URL, adding the access token if the
    /// provider left it out.
    fn cursor_url(&self, cursor: &Cursor) -> Result<Url> {
        let mut url =
            Url::parse(cursor.as_str()).map_err(|_| Error::InvalidCursor(cursor.clone()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidCursor(cursor.clone()));
        }
        if let Some(token) = &self.access_token {
            if !url.query_pairs().any(|(key, _)| key == ACCESS_TOKEN) {
                url.query_pairs_mut().append_pair(ACCESS_TOKEN, token);
            }
        }
        Ok(url)
    }
}

impl Provider for Client {
    fn query(&self, query: &Query) -> Result<Response> {
        get_json(&self.http, self.search_url(query)?)
    }

    fn fetch(&self, cursor: &Cursor) -> Result<Response> {
        get_json(&self.http, self.cursor_url(cursor)?)
    }

    fn get_by_uid(&self, document_type: &str, uid: &str) -> Result<Document> {
        let query = Query::new(Predicate::uid(document_type, uid)).page_size(1);
        let response: Response = get_json(&self.http, self.search_url(&query)?)?;
        response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound {
                document_type: document_type.to_owned(),
                uid: uid.to_owned(),
            })
    }
}

fn get_json<T: DeserializeOwned>(http: &reqwest::blocking::Client, url: Url) -> Result<T> {
    debug!(url = %redacted(&url), "GET");
    let response = http.get(url.clone()).send().map_err(|e| transport(&url, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Status {
            url: redacted(&url),
            status: status.as_u16(),
        });
    }
    let body = response.text().map_err(|e| transport(&url, e))?;
    Ok(serde_json::from_str(&body)?)
}

/// Wraps a transport error. reqwest renders the request URL, access token
/// included, so it's swapped for the redacted one.
fn transport(url: &Url, err: reqwest::Error) -> Error {
    Error::Annotated(
        format!("GET `{}`", redacted(url)),
        Box::new(Error::Http(err.without_url())),
    )
}

/// Renders `url` with any access token removed, for logs and errors.
fn redacted(url: &Url) -> String {
    let mut url = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != ACCESS_TOKEN)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
    url.to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    fn client(access_token: Option<&str>) -> Client {
        Client {
            http: reqwest::blocking::Client::new(),
            endpoint: Url::parse("https://blog.cdn.prismic.io/api/v2").unwrap(),
            access_token: access_token.map(str::to_owned),
            master_ref: String::from("YFz1"),
        }
    }

    #[test]
    fn test_search_url() -> Result<()> {
        let query = Query::new(Predicate::document_type("post"))
            .page_size(2)
            .orderings(Some(String::from("[document.first_publication_date desc]")));
        let url = client(None).search_url(&query)?;
        assert_eq!("/api/v2/documents/search", url.path());
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            vec![
                (String::from("ref"), String::from("YFz1")),
                (String::from("q"), String::from("[[at(document.type, \"post\")]]")),
                (String::from("pageSize"), String::from("2")),
                (
                    String::from("orderings"),
                    String::from("[document.first_publication_date desc]")
                ),
            ],
            pairs
        );
        Ok(())
    }

    #[test]
    fn test_cursor_url_adds_missing_token() -> Result<()> {
        let client = client(Some("secret"));
        let url = client.cursor_url(&Cursor::new(
            "https://blog.cdn.prismic.io/api/v2/documents/search?ref=YFz1&page=2",
        ))?;
        assert!(url.query_pairs().any(|(k, v)| k == "access_token" && v == "secret"));

        let url = client.cursor_url(&Cursor::new(
            "https://blog.cdn.prismic.io/api/v2/documents/search?page=2&access_token=secret",
        ))?;
        assert_eq!(1, url.query_pairs().filter(|(k, _)| k == "access_token").count());
        Ok(())
    }

    #[test]
    fn test_cursor_url_rejects_non_http() {
        assert!(matches!(
            client(None).cursor_url(&Cursor::new("memory:search?page=2")),
            Err(Error::InvalidCursor(_))
        ));
    }

    #[test]
    fn test_transport_errors_hide_the_token() {
        let http = reqwest::blocking::Client::new();
        let url = Url::parse("http://127.0.0.1:1/api/v2?access_token=secret").unwrap();
        let err = match get_json::<ApiInfo>(&http, url) {
            Ok(_) => panic!("nothing listens on port 1"),
            Err(err) => err,
        };
        assert!(err.is_transient());

        let mut messages = vec![err.to_string()];
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            messages.push(cause.to_string());
            source = cause.source();
        }
        for message in &messages {
            assert!(!message.contains("secret"), "token leaked: {}", message);
        }
        assert!(messages[0].contains("http://127.0.0.1:1/api/v2"));
    }

    #[test]
    fn test_redacted() -> Result<()> {
        let url = Url::parse("https://blog.cdn.prismic.io/api/v2?access_token=secret&ref=a")?;
        assert_eq!("https://blog.cdn.prismic.io/api/v2?ref=a", redacted(&url));
        let url = Url::parse("https://blog.cdn.prismic.io/api/v2?access_token=secret")?;
        assert_eq!("https://blog.cdn.prismic.io/api/v2", redacted(&url));
        Ok(())
    }
}
