//! HTTP client for the storefront's order backend.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::models::{
    FinalizeOrderRequest, Order, OrderRequest, PaymeOrder, PaymeStatus, PaymentIntentResult,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderServiceError {
    /// The service answered with a non-2xx status.
    #[error("order service returned {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Status { status: u16, message: Option<String> },
    /// The request never got a response.
    #[error("network error: {0}")]
    Network(String),
    /// A 2xx response whose body did not parse.
    #[error("decode error: {0}")]
    Decode(String),
    /// The request URL could not be built, e.g. an order number of `..`.
    #[error("invalid request path: {0}")]
    InvalidPath(String),
}

impl OrderServiceError {
    pub fn status(&self) -> Option<u16> {
        match self {
            OrderServiceError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            OrderServiceError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

// Backend error body: { "error": "..." }, sometimes { "message": "..." }
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Operations checkout needs from the order backend.
#[async_trait]
pub trait OrderServiceApi: Send + Sync {
    /// `POST /create-payment-intent`
    async fn create_payment_intent(
        &self,
        request: &OrderRequest<'_>,
    ) -> Result<PaymentIntentResult, OrderServiceError>;

    /// `POST /confirm`
    async fn finalize_order(
        &self,
        request: &FinalizeOrderRequest<'_>,
    ) -> Result<Order, OrderServiceError>;

    /// `GET /orders/{orderNumber}?email=`
    async fn get_order(&self, order_number: &str, email: &str) -> Result<Order, OrderServiceError>;

    /// `GET /orders/payme/status/{orderNumber}`
    async fn payme_status(&self, order_number: &str) -> Result<PaymeStatus, OrderServiceError>;

    /// `POST /orders/payme`
    async fn create_payme_order(
        &self,
        request: &OrderRequest<'_>,
    ) -> Result<PaymeOrder, OrderServiceError>;
}

#[derive(Clone)]
pub struct HttpOrderService {
    http: Client,
    base_url: String,
}

impl HttpOrderService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, OrderServiceError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OrderServiceError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Appends each segment to the base URL, percent-encoding it so an
    /// order number can never change the endpoint or the query.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, OrderServiceError> {
        if let Some(bad) = segments.iter().find(|s| matches!(s.trim(), "" | "." | "..")) {
            return Err(OrderServiceError::InvalidPath(format!("unusable path segment {:?}", bad)));
        }
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| OrderServiceError::InvalidPath(format!("bad base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| OrderServiceError::InvalidPath("base url cannot take a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post_json<B, T>(&self, segments: &[&str], body: &B) -> Result<T, OrderServiceError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        debug!(%url, "POST");
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| OrderServiceError::Network(e.to_string()))?;
        Self::read_response(response).await
    }

    async fn get_json<T>(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<T, OrderServiceError>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        debug!(%url, "GET");
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| OrderServiceError::Network(e.to_string()))?;
        Self::read_response(response).await
    }

    async fn read_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, OrderServiceError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OrderServiceError::Network(e.to_string()))?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| OrderServiceError::Decode(e.to_string()));
        }

        let message = Self::error_message(status, &body);
        warn!(status = status.as_u16(), message = ?message, "Order service request failed");
        Err(OrderServiceError::Status {
            status: status.as_u16(),
            message,
        })
    }

    fn error_message(status: StatusCode, body: &str) -> Option<String> {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => parsed.error.or(parsed.message),
            Err(_) if status.is_server_error() || body.trim().is_empty() => None,
            Err(_) => Some(body.trim().to_string()),
        }
    }
}

#[async_trait]
impl OrderServiceApi for HttpOrderService {
    #[instrument(skip(self, request), fields(method = %request.form.payment_method))]
    async fn create_payment_intent(
        &self,
        request: &OrderRequest<'_>,
    ) -> Result<PaymentIntentResult, OrderServiceError> {
        self.post_json(&["create-payment-intent"], request).await
    }

    #[instrument(skip(self, request), fields(payment_intent_id = %request.payment_intent_id))]
    async fn finalize_order(
        &self,
        request: &FinalizeOrderRequest<'_>,
    ) -> Result<Order, OrderServiceError> {
        self.post_json(&["confirm"], request).await
    }

    #[instrument(skip(self, email))]
    async fn get_order(&self, order_number: &str, email: &str) -> Result<Order, OrderServiceError> {
        self.get_json(&["orders", order_number], &[("email", email)])
            .await
    }

    #[instrument(skip(self))]
    async fn payme_status(&self, order_number: &str) -> Result<PaymeStatus, OrderServiceError> {
        self.get_json(&["orders", "payme", "status", order_number], &[])
            .await
    }

    #[instrument(skip(self, request))]
    async fn create_payme_order(
        &self,
        request: &OrderRequest<'_>,
    ) -> Result<PaymeOrder, OrderServiceError> {
        self.post_json(&["orders", "payme"], request).await
    }
}
