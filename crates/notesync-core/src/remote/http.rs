//! HTTP client for the remote store service

use reqwest::header::ACCEPT;
use reqwest::{RequestBuilder, StatusCode};

use super::{PushMessage, RemoteDocument, RemoteStore};
use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::models::DocumentId;

/// `RemoteStore` over the dashboard backend's JSON API
#[derive(Clone)]
pub struct HttpRemoteStore {
    config: RemoteConfig,
    client: reqwest::Client,
}

impl HttpRemoteStore {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    pub const fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn document_url(&self, id: &DocumentId) -> String {
        format!(
            "{}/documents/{}",
            self.config.base_url,
            urlencoding::encode(id.as_str())
        )
    }

    fn push_url(&self, id: &DocumentId) -> String {
        format!("{}/push", self.document_url(id))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

const ERROR_BODY_LIMIT: usize = 180;

async fn api_error(response: reqwest::Response) -> Error {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let body = summarize_body(&body);
    if body.is_empty() {
        Error::Remote(format!("HTTP {status}"))
    } else {
        Error::Remote(format!("{body} ({status})"))
    }
}

/// Error body flattened to one line and capped for logs
fn summarize_body(body: &str) -> String {
    body.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(ERROR_BODY_LIMIT)
        .collect()
}

impl RemoteStore for HttpRemoteStore {
    async fn fetch(&self, id: &DocumentId) -> Result<Option<RemoteDocument>> {
        let response = self
            .authorize(self.client.get(self.document_url(id)))
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(Some(response.json::<RemoteDocument>().await?))
    }

    async fn push(&self, message: &PushMessage) -> Result<()> {
        let response = self
            .authorize(self.client.post(self.push_url(&message.document_id)))
            .json(message)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(())
    }
}
