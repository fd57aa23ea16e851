use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CACHE_CONTROL;
use reqwest::header::PRAGMA;
use reqwest::Client;
use serde::de::DeserializeOwned;

/// Status and raw body of a completed HTTP exchange. Whether the exchange
/// actually *succeeded* is for the caller to decide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("could not reach the backend")]
    Unreachable(#[source] anyhow::Error),
}

/// The seam between the waitlist workflow and the network. Implementations
/// only move bytes; timeouts are applied by the caller (see `with_timeout`),
/// so a transport may take as long as it likes.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// `POST url` with a JSON body
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError>;

    /// `GET url?query`, bypassing every cache between us and the backend
    async fn get_fresh(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<TransportResponse, TransportError>;
}

/// Bound `request` by `limit`. Dropping the request future on expiry cancels
/// the underlying request.
pub async fn with_timeout<F>(
    limit: Duration,
    request: F,
) -> Result<TransportResponse, TransportError>
where
    F: Future<Output = Result<TransportResponse, TransportError>>,
{
    tokio::time::timeout(limit, request)
        .await
        .map_err(|_| TransportError::Timeout(limit))?
}

/// `reqwest`-backed transport. `Client` pools connections internally, so a
/// single instance should be shared (it is cheap to clone).
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    http_client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            http_client: Client::new(),
        }
    }
}

fn unreachable(e: reqwest::Error) -> TransportError { TransportError::Unreachable(e.into()) }

async fn into_response(resp: reqwest::Response) -> Result<TransportResponse, TransportError> {
    let status = resp.status().as_u16();
    let body = resp.text().await.map_err(unreachable)?;
    Ok(TransportResponse { status, body })
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[tracing::instrument(name = "POST", skip(self, body))]
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError> {
        let resp = self
            .http_client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(unreachable)?;
        into_response(resp).await
    }

    #[tracing::instrument(name = "GET", skip(self, query))]
    async fn get_fresh(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<TransportResponse, TransportError> {
        let resp = self
            .http_client
            .get(url)
            .query(query)
            .header(CACHE_CONTROL, "no-cache, no-store, must-revalidate")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(unreachable)?;
        into_response(resp).await
    }
}
