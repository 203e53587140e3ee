use super::auth::TokenRefresher;
use crate::error::ApiError;
use log::{debug, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, RETRY_AFTER};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Outcome of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// 204, or any 2xx with an empty body.
    NoContent,
    Json(Value),
}

impl ApiResponse {
    /// Decode the body; `None` for `NoContent`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<Option<T>, ApiError> {
        match self {
            ApiResponse::NoContent => Ok(None),
            ApiResponse::Json(v) => serde_json::from_value(v)
                .map(Some)
                .map_err(|e| ApiError::Decode(e.to_string())),
        }
    }
}

/// Authenticated request wrapper around the Web API. Holds no state of its
/// own beyond the shared refresher.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    api_base: String,
    tokens: Arc<TokenRefresher>,
}

impl ApiClient {
    pub fn new(client: Client, api_base: String, tokens: Arc<TokenRefresher>) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenRefresher> {
        &self.tokens
    }

    /// Send `method endpoint` with an optional JSON body. A 401 triggers
    /// exactly one refresh-and-retry. Transport failures are not retried.
    pub async fn request(&self, method: Method, endpoint: &str, body: Option<&Value>) -> Result<ApiResponse, ApiError> {
        let creds = self.tokens.ensure_valid().await?;
        let resp = self.send(&method, endpoint, body, &creds.access_token).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Self::classify(resp).await;
        }

        warn!("Got 401 for {} {}; attempting token refresh", method, endpoint);
        let creds = self.tokens.refresh_rejected(&creds.access_token).await?;
        let resp2 = self.send(&method, endpoint, body, &creds.access_token).await?;
        if resp2.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        Self::classify(resp2).await
    }

    pub async fn get(&self, endpoint: &str) -> Result<ApiResponse, ApiError> {
        self.request(Method::GET, endpoint, None).await
    }

    pub async fn put(&self, endpoint: &str, body: Option<&Value>) -> Result<ApiResponse, ApiError> {
        self.request(Method::PUT, endpoint, body).await
    }

    pub async fn post(&self, endpoint: &str, body: Option<&Value>) -> Result<ApiResponse, ApiError> {
        self.request(Method::POST, endpoint, body).await
    }

    async fn send(&self, method: &Method, endpoint: &str, body: Option<&Value>, access_token: &str) -> Result<Response, ApiError> {
        let url = format!("{}{}", self.api_base, endpoint);
        let mut req = self
            .client
            .request(method.clone(), &url)
            .header(AUTHORIZATION, format!("Bearer {}", access_token));
        req = match body {
            Some(b) => req.json(b),
            // Spotify rejects body-less PUT/POST without a length header
            None if *method != Method::GET => req.header(CONTENT_LENGTH, "0"),
            None => req,
        };
        Ok(req.send().await?)
    }

    async fn classify(resp: Response) -> Result<ApiResponse, ApiError> {
        let status = resp.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(ApiResponse::NoContent);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok());
            return Err(ApiError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Remote { status: status.as_u16(), body });
        }
        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(ApiResponse::NoContent);
        }
        debug!("{} with {} byte body", status, text.len());
        serde_json::from_str::<Value>(&text)
            .map(ApiResponse::Json)
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}
