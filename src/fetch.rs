//! Feed retrieval over HTTP and decoding of the retrieved document.

use std::{collections::HashMap, time::Duration};

use html_escape::decode_html_entities;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, ACCEPT},
    Client, StatusCode,
};

pub const ACCEPTED_CONTENT_TYPES: &str =
    "application/rss+xml, application/atom+xml, application/xml, text/xml";

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("failed to fetch {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    HttpStatus { url: String, status: StatusCode },
    #[error("failed to decode feed document")]
    Decode(#[source] rss::Error),
    #[error("invalid header `{0}`")]
    InvalidHeader(String),
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub user_agent: String,
    pub accept: String,
    pub headers: HashMap<String, String>,
}

impl ClientOptions {
    /// Options identifying the client as `<login>_aggregator`.
    pub fn for_login(login: &str, timeout: Duration) -> Self {
        Self {
            timeout,
            user_agent: format!("{login}_aggregator"),
            accept: ACCEPTED_CONTENT_TYPES.to_owned(),
            headers: HashMap::new(),
        }
    }
}

/// HTTP client used exclusively to retrieve feeds.
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: Client,
}

impl FeedClient {
    pub fn new(options: &ClientOptions) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, header_value(&options.accept)?);
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| FetchError::InvalidHeader(name.clone()))?;
            headers.insert(name, header_value(value)?);
        }

        let http = Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.as_str())
            .default_headers(headers)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { http })
    }

    /// Single bounded GET of `url`. Any non-success status is an error.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let transport = |source| FetchError::Transport {
            url: url.to_owned(),
            source,
        };

        let response = self.http.get(url).send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_owned(),
                status,
            });
        }

        let bytes = response.bytes().await.map_err(transport)?;
        tracing::debug!(url, bytes = bytes.len(), "fetched feed document");
        Ok(bytes.to_vec())
    }

    pub async fn fetch_feed(&self, url: &str) -> Result<ParsedFeed, FetchError> {
        let document = self.fetch(url).await?;
        parse(&document)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, FetchError> {
    HeaderValue::from_str(value).map_err(|_| FetchError::InvalidHeader(value.to_owned()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<ParsedItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Publication date exactly as the feed spells it.
    pub published: String,
}

/// Decodes an RSS channel, falling back to Atom. Text fields come back with
/// HTML entities unescaped.
pub fn parse(document: &[u8]) -> Result<ParsedFeed, FetchError> {
    let feed = match rss::Channel::read_from(document) {
        Ok(channel) => from_channel(&channel),
        Err(rss_error) => match atom_syndication::Feed::read_from(document) {
            Ok(feed) => from_atom(&feed),
            Err(atom_error) => {
                tracing::debug!("document is not Atom either: {atom_error}");
                return Err(FetchError::Decode(rss_error));
            }
        },
    };

    Ok(feed.unescaped())
}

fn from_channel(channel: &rss::Channel) -> ParsedFeed {
    ParsedFeed {
        title: channel.title().to_owned(),
        link: channel.link().to_owned(),
        description: channel.description().to_owned(),
        items: channel
            .items()
            .iter()
            .map(|item| ParsedItem {
                title: item.title().unwrap_or_default().to_owned(),
                link: item.link().unwrap_or_default().to_owned(),
                description: item.description().unwrap_or_default().to_owned(),
                published: item.pub_date().unwrap_or_default().to_owned(),
            })
            .collect(),
    }
}

fn from_atom(feed: &atom_syndication::Feed) -> ParsedFeed {
    ParsedFeed {
        title: feed.title().value.clone(),
        link: atom_link(feed.links()),
        description: feed
            .subtitle()
            .map(|subtitle| subtitle.value.clone())
            .unwrap_or_default(),
        items: feed
            .entries()
            .iter()
            .map(|entry| ParsedItem {
                title: entry.title().value.clone(),
                link: atom_link(entry.links()),
                description: entry
                    .summary()
                    .map(|summary| summary.value.clone())
                    .or_else(|| entry.content().and_then(|content| content.value.clone()))
                    .unwrap_or_default(),
                published: entry
                    .published()
                    .unwrap_or_else(|| entry.updated())
                    .to_rfc3339(),
            })
            .collect(),
    }
}

/// Prefers the `alternate` link, which is what Atom uses for the page itself.
fn atom_link(links: &[atom_syndication::Link]) -> String {
    links
        .iter()
        .find(|link| link.rel() == "alternate")
        .or_else(|| links.first())
        .map(|link| link.href().to_owned())
        .unwrap_or_default()
}

impl ParsedFeed {
    fn unescaped(self) -> Self {
        Self {
            title: unescape(&self.title),
            link: unescape(&self.link),
            description: unescape(&self.description),
            items: self
                .items
                .into_iter()
                .map(|item| ParsedItem {
                    title: unescape(&item.title),
                    link: unescape(&item.link),
                    description: unescape(&item.description),
                    ..item
                })
                .collect(),
        }
    }
}

fn unescape(text: &str) -> String {
    decode_html_entities(text).into_owned()
}
