//! Client for the remote inventory data source.
//!
//! Thin collaborator: every response flows back through the query cache as
//! an opaque payload, and every failure is classified into [`ErrorKind`]
//! before it leaves this module — callers never see raw transport errors.

pub mod json;
pub mod models;

use crate::error::ErrorKind;
use anyhow::Context;
use models::{Product, ProductInput, User, UserInput};
use reqwest::StatusCode;
use tracing::debug;
use url::Url;

/// REST client for the product and user endpoints.
#[derive(Clone)]
pub struct InventoryApi {
    client: reqwest::Client,
    base_url: Url,
}

impl InventoryApi {
    /// Build a client for the given base URL.
    pub fn new(mut base_url: Url) -> Result<Self, anyhow::Error> {
        if base_url.cannot_be_a_base() {
            anyhow::bail!("api base url '{base_url}' cannot carry paths");
        }
        // A trailing slash keeps Url::join from eating the last path segment.
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build http client")?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ErrorKind> {
        self.base_url
            .join(path)
            .map_err(|e| ErrorKind::Network(format!("invalid endpoint '{path}': {e}")))
    }

    /// `GET /products`, optionally filtered by category.
    pub async fn list_products(&self, category: Option<&str>) -> Result<Vec<Product>, ErrorKind> {
        let mut request = self.client.get(self.endpoint("products")?);
        if let Some(category) = category {
            request = request.query(&[("category", category)]);
        }
        self.execute(request).await
    }

    /// `GET /products/{id}`.
    pub async fn get_product(&self, id: u64) -> Result<Product, ErrorKind> {
        let request = self.client.get(self.endpoint(&format!("products/{id}"))?);
        self.execute(request).await
    }

    /// `POST /products`.
    pub async fn create_product(&self, input: &ProductInput) -> Result<Product, ErrorKind> {
        let request = self.client.post(self.endpoint("products")?).json(input);
        self.execute(request).await
    }

    /// `PUT /products/{id}`.
    pub async fn update_product(&self, id: u64, input: &ProductInput) -> Result<Product, ErrorKind> {
        let request = self
            .client
            .put(self.endpoint(&format!("products/{id}"))?)
            .json(input);
        self.execute(request).await
    }

    /// `DELETE /products/{id}`.
    pub async fn delete_product(&self, id: u64) -> Result<(), ErrorKind> {
        let request = self.client.delete(self.endpoint(&format!("products/{id}"))?);
        self.execute_discarding_body(request).await
    }

    /// `GET /users/{id}`.
    pub async fn get_user(&self, id: u64) -> Result<User, ErrorKind> {
        let request = self.client.get(self.endpoint(&format!("users/{id}"))?);
        self.execute(request).await
    }

    /// `PUT /users/{id}`.
    pub async fn update_user(&self, id: u64, input: &UserInput) -> Result<User, ErrorKind> {
        let request = self
            .client
            .put(self.endpoint(&format!("users/{id}"))?)
            .json(input);
        self.execute(request).await
    }

    async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ErrorKind> {
        let body = self.execute_raw(request).await?;
        json::decode_with_context(&body).map_err(|e| ErrorKind::Serialization(e.to_string()))
    }

    async fn execute_discarding_body(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<(), ErrorKind> {
        self.execute_raw(request).await.map(|_| ())
    }

    /// Send the request, classify HTTP-level failures, return the body.
    async fn execute_raw(&self, request: reqwest::RequestBuilder) -> Result<String, ErrorKind> {
        let response = request
            .send()
            .await
            .map_err(|e| ErrorKind::Network(e.to_string()))?;
        let status = response.status();
        let url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| ErrorKind::Network(e.to_string()))?;
        debug!(%url, status = status.as_u16(), bytes = body.len(), "api response");
        match classify_failure(status, &body) {
            Some(kind) => Err(kind),
            None => Ok(body),
        }
    }
}

/// Map a non-success HTTP status to its error class. `None` for success.
fn classify_failure(status: StatusCode, body: &str) -> Option<ErrorKind> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            let detail = body.trim();
            let detail = if detail.is_empty() {
                status.to_string()
            } else {
                detail.to_string()
            };
            ErrorKind::Validation(detail)
        }
        // Everything else, 5xx included, counts as a transport-class
        // failure and is eligible for the cache's automatic retry.
        _ => ErrorKind::Network(format!("http status {status}")),
    })
}
