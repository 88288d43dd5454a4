use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde_json::Value;
use tracing::debug;

use crate::cache::Query;
use crate::config::SiteSettings;
use crate::record::{PageCount, parse_int};

use super::{Fetch, FetchError};

pub const TOTAL_PAGES_HEADER: &str = "X-WP-TotalPages";
const API_ROOT: &str = "wp-json/";

/// reqwest-backed client for a WordPress REST API.
#[derive(Clone, Debug)]
pub struct WpClient {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl WpClient {
    pub fn new(endpoint: &str, token: Option<String>, timeout: Duration) -> Result<Self, FetchError> {
        let base = endpoint_url(endpoint)?;
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base,
            token,
        })
    }

    pub fn from_settings(site: &SiteSettings) -> Result<Self, FetchError> {
        Self::new(site.endpoint.as_str(), site.auth_token.clone(), site.timeout)
    }

    pub fn user_agent() -> &'static str {
        concat!("wpqc/", env!("CARGO_PKG_VERSION"))
    }

    /// Full URL of `path` under the API root, with `query` encoded.
    pub fn url(&self, path: &str, query: &Query) -> Result<Url, FetchError> {
        let mut url = self
            .base
            .join(API_ROOT)?
            .join(path.trim_start_matches('/'))?;
        let pairs = query_pairs(query);
        if !pairs.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(pairs.iter().map(|(key, value)| (key.as_str(), value.as_str())));
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, FetchError> {
        let mut request = self
            .client
            .request(method, url)
            .header(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|err| FetchError::decode(format!("invalid auth token: {err}")))?;
            request = request.header(AUTHORIZATION, value);
        }
        Ok(request)
    }

    async fn handle(resp: Response) -> Result<Vec<Value>, FetchError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| FetchError::decode(format!("failed to parse body: {e}")))
    }
}

#[async_trait]
impl Fetch for WpClient {
    async fn get(&self, path: &str, query: &Query) -> Result<Vec<Value>, FetchError> {
        let url = self.url(path, query)?;
        debug!(%url, "GET collection");
        let resp = self.request(Method::GET, url)?.send().await?;
        Self::handle(resp).await
    }

    async fn total_pages(&self, path: &str, query: &Query) -> Result<PageCount, FetchError> {
        let url = self.url(path, query)?;
        debug!(%url, "HEAD collection");
        let resp = self.request(Method::HEAD, url)?.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: String::new(),
            });
        }
        let pages = resp
            .headers()
            .get(TOTAL_PAGES_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_int)
            .filter(|pages| *pages != 0)
            .unwrap_or(1);
        Ok(PageCount::Number(pages))
    }
}

/// Encode a query as URL pairs, nesting objects and arrays in brackets
/// (`meta_query[key]=…`, `include[0]=…`).
pub fn query_pairs(query: &Query) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in query {
        flatten_into(key, value, &mut pairs);
    }
    pairs
}

fn flatten_into(prefix: &str, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                flatten_into(&format!("{prefix}[{key}]"), nested, pairs);
            }
        }
        Value::Array(items) => {
            for (index, nested) in items.iter().enumerate() {
                flatten_into(&format!("{prefix}[{index}]"), nested, pairs);
            }
        }
        Value::String(text) => pairs.push((prefix.to_owned(), text.clone())),
        Value::Null => pairs.push((prefix.to_owned(), String::new())),
        Value::Bool(_) | Value::Number(_) => pairs.push((prefix.to_owned(), value.to_string())),
    }
}

fn endpoint_url(endpoint: &str) -> Result<Url, FetchError> {
    let mut url = Url::parse(endpoint)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
