//! Base HTTP client with shared logic

use crate::infrastructure::model::types::ModelError;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Base HTTP client with shared functionality
#[derive(Clone)]
pub struct HttpClientBase {
    pub provider: String,
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub http: Client,
}

impl HttpClientBase {
    pub fn new(provider: &str, model: &str, endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            provider: provider.to_string(),
            model: model.to_string(),
            endpoint: endpoint.to_string(),
            api_key,
            http: Client::new(),
        }
    }

    /// Build URL from endpoint and path
    pub fn build_url(&self, path: &str) -> String {
        let base = self.endpoint.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// Post JSON with bearer auth
    pub async fn post_with_bearer<Req, Res>(&self, url: &str, body: &Req) -> Result<Res, ModelError>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let api_key = self.require_api_key()?;
        let request = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(body);
        self.send(request).await
    }

    /// Post JSON with custom headers (for Anthropic)
    pub async fn post_with_headers<Req, Res>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &Req,
    ) -> Result<Res, ModelError>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let mut request = self.http.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        self.send(request).await
    }

    /// Post JSON with query param auth (for Gemini)
    pub async fn post_with_query_key<Req, Res>(
        &self,
        url: &str,
        body: &Req,
    ) -> Result<Res, ModelError>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let api_key = self.require_api_key()?;
        let request = self.http.post(url).query(&[("key", api_key)]).json(body);
        self.send(request).await
    }

    /// Non-2xx answers keep their status and body so the retry layer can
    /// tell transient failures apart.
    async fn send<Res>(&self, request: RequestBuilder) -> Result<Res, ModelError>
    where
        Res: DeserializeOwned,
    {
        let response = request
            .send()
            .await
            .map_err(|e| ModelError::network(&self.provider, e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::status(&self.provider, status.as_u16(), body));
        }
        let text = response
            .text()
            .await
            .map_err(|e| ModelError::network(&self.provider, e))?;
        serde_json::from_str(&text)
            .map_err(|e| ModelError::invalid_response(&self.provider, e.to_string()))
    }

    pub fn require_api_key(&self) -> Result<&str, ModelError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ModelError::missing_api_key(&self.provider))
    }
}
