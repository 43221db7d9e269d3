//! Small JSON-over-REST client shared by the platform adapters.

use super::PlatformError;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub(crate) const PAGE_SIZE: usize = 100;

#[derive(Clone)]
pub(crate) struct RestClient {
    base: Url,
    http: Client,
}

impl RestClient {
    /// `auth` is sent with every request next to the JSON accept header.
    pub fn new(
        base: &str,
        accept: &'static str,
        auth: (HeaderName, String),
    ) -> Result<Self, PlatformError> {
        let base = Url::parse(base).map_err(|e| PlatformError::InvalidUrl {
            url: base.to_string(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(PlatformError::InvalidUrl {
                url: base.to_string(),
                reason: "not a hierarchical URL".into(),
            });
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
        headers.insert(USER_AGENT, HeaderValue::from_static(crate::constants::CLIENT_NAME));
        let (name, value) = auth;
        let mut value = HeaderValue::from_str(&value).map_err(|_| PlatformError::InvalidToken)?;
        value.set_sensitive(true);
        headers.insert(name, value);

        let http = Client::builder().default_headers(headers).build()?;
        Ok(Self { base, http })
    }

    /// Base URL extended with percent-encoded path segments.
    pub fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub async fn get<T>(&self, segments: &[&str], query: &[(&str, String)]) -> Result<T, PlatformError>
    where
        T: DeserializeOwned,
    {
        let request = self.http.get(self.url(segments)).query(query);
        let text = send(request).await?;
        decode(&text)
    }

    /// Every page of a list endpoint, following `page`/`per_page`.
    pub async fn get_all<T>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Vec<T>, PlatformError>
    where
        T: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut page = 1usize;
        loop {
            let mut paged = query.to_vec();
            paged.push(("per_page", PAGE_SIZE.to_string()));
            paged.push(("page", page.to_string()));
            let batch: Vec<T> = self.get(segments, &paged).await?;
            let done = batch.len() < PAGE_SIZE;
            items.extend(batch);
            if done {
                return Ok(items);
            }
            page += 1;
        }
    }

    pub async fn post<B>(&self, segments: &[&str], body: &B) -> Result<(), PlatformError>
    where
        B: Serialize,
    {
        let request = self.http.post(self.url(segments)).json(body);
        send(request).await.map(|_| ())
    }
}

async fn send(request: RequestBuilder) -> Result<String, PlatformError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PlatformError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.text().await?)
}

pub(crate) fn decode<T>(text: &str) -> Result<T, PlatformError>
where
    T: DeserializeOwned,
{
    serde_json::from_str(text).map_err(|e| PlatformError::InvalidResponse {
        reason: e.to_string(),
    })
}
