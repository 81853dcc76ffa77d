//! HTTP seams to the order-management backend.
//!
//! Every collaborator the core talks to is expressed as a trait so screens and
//! the session can be driven by test doubles; [`HttpApi`] is the real
//! implementation and carries the session cookie on every request.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use shared::{
    domain::{Order, OrderId, OrderStatus},
    protocol::{ApiEnvelope, LoginRequest, PageData, PageQuery, RegisterRequest, StatusUpdate},
};
use tracing::debug;
use url::Url;

use crate::{error::ApiFailure, Resource};

const API_SEGMENTS: [&str; 2] = ["api", "v1"];

#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// `Ok(true)` only when the server positively confirms the session.
    async fn check_auth(&self) -> Result<bool, ApiFailure>;
    async fn logout(&self) -> Result<(), ApiFailure>;
}

#[async_trait]
pub trait ResourceBackend<R: Resource>: Send + Sync {
    async fn fetch_page(&self, page: u32, limit: u32) -> Result<PageData<R>, ApiFailure>;
    async fn create(&self, draft: &R::Draft) -> Result<(), ApiFailure>;
    async fn update(&self, id: &R::Id, patch: &R::Patch) -> Result<(), ApiFailure>;
}

#[async_trait]
pub trait OrderStatusBackend: Send + Sync {
    async fn update_status(&self, id: &OrderId, status: OrderStatus) -> Result<(), ApiFailure>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

pub struct HttpApi {
    http: Client,
    base_url: Url,
}

impl HttpApi {
    pub fn new(server_url: &str) -> anyhow::Result<Self> {
        let base_url = Url::parse(server_url.trim())
            .with_context(|| format!("invalid server url '{server_url}'"))?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(anyhow!(
                "server url '{server_url}' must be an http(s) base url"
            ));
        }

        let http = Client::builder()
            .cookie_store(true)
            .build()
            .context("failed to build http client")?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<(), ApiFailure> {
        let url = self.endpoint(&["auth", "login"]);
        let envelope: ApiEnvelope<serde_json::Value> =
            self.exchange(self.http.post(url).json(request)).await?;
        require_success(envelope).map(|_| ())
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<(), ApiFailure> {
        let url = self.endpoint(&["auth", "register"]);
        let envelope: ApiEnvelope<serde_json::Value> =
            self.exchange(self.http.post(url).json(request)).await?;
        require_success(envelope).map(|_| ())
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Infallible: cannot-be-a-base urls are rejected in `new`.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(API_SEGMENTS).extend(segments);
        }
        url
    }

    async fn exchange<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<ApiEnvelope<T>, ApiFailure> {
        let response = request.send().await?;
        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "api response received");

        let body = response.bytes().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiFailure::Unauthorized {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        if !status.is_success() {
            return Err(ApiFailure::Rejected {
                status: Some(status.as_u16()),
                message: error_message(&body),
            });
        }

        serde_json::from_slice(&body).map_err(|err| ApiFailure::Malformed(err.to_string()))
    }
}

fn error_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.message)
        .filter(|message| !message.trim().is_empty())
}

fn require_success<T>(envelope: ApiEnvelope<T>) -> Result<Option<T>, ApiFailure> {
    if envelope.success {
        Ok(envelope.data)
    } else {
        Err(ApiFailure::Rejected {
            status: None,
            message: envelope.message,
        })
    }
}

#[async_trait]
impl AuthBackend for HttpApi {
    async fn check_auth(&self) -> Result<bool, ApiFailure> {
        let url = self.endpoint(&["auth", "check-auth"]);
        let envelope: ApiEnvelope<serde_json::Value> = self.exchange(self.http.get(url)).await?;
        Ok(envelope.success)
    }

    async fn logout(&self) -> Result<(), ApiFailure> {
        let url = self.endpoint(&["auth", "logout"]);
        let envelope: ApiEnvelope<serde_json::Value> = self.exchange(self.http.post(url)).await?;
        require_success(envelope).map(|_| ())
    }
}

#[async_trait]
impl<R: Resource> ResourceBackend<R> for HttpApi {
    async fn fetch_page(&self, page: u32, limit: u32) -> Result<PageData<R>, ApiFailure> {
        let url = self.endpoint(&[R::COLLECTION]);
        debug!(collection = R::COLLECTION, page, limit, "requesting page");
        let envelope: ApiEnvelope<PageData<R>> = self
            .exchange(self.http.get(url).query(&PageQuery { page, limit }))
            .await?;
        require_success(envelope)?.ok_or_else(|| {
            ApiFailure::Malformed(format!("{} response is missing page data", R::COLLECTION))
        })
    }

    async fn create(&self, draft: &R::Draft) -> Result<(), ApiFailure> {
        let url = self.endpoint(&[R::COLLECTION]);
        let envelope: ApiEnvelope<serde_json::Value> =
            self.exchange(self.http.post(url).json(draft)).await?;
        require_success(envelope).map(|_| ())
    }

    async fn update(&self, id: &R::Id, patch: &R::Patch) -> Result<(), ApiFailure> {
        let id = id.to_string();
        let url = self.endpoint(&[R::COLLECTION, id.as_str()]);
        let envelope: ApiEnvelope<serde_json::Value> =
            self.exchange(self.http.patch(url).json(patch)).await?;
        require_success(envelope).map(|_| ())
    }
}

#[async_trait]
impl OrderStatusBackend for HttpApi {
    async fn update_status(&self, id: &OrderId, status: OrderStatus) -> Result<(), ApiFailure> {
        let url = self.endpoint(&[Order::COLLECTION, id.as_str(), "status"]);
        let envelope: ApiEnvelope<serde_json::Value> = self
            .exchange(self.http.patch(url).json(&StatusUpdate { status }))
            .await?;
        require_success(envelope).map(|_| ())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
