// Stripe client-side REST calls
// Uses only the publishable key plus the intent's client secret.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument, warn};

use super::processor::PaymentProcessor;
use crate::models::payment::payment_intent_id_from_secret;
use crate::models::{
    ConfirmPaymentRequest, ConfirmPaymentResponse, PaymentIntent, PaymentIntentStatus,
    ProcessorError, ProcessorErrorType, RedirectBehavior,
};

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

// Stripe REST error envelope: { error: { type, code, message } }
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    #[serde(rename = "type")]
    type_: String,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IntentBody {
    #[serde(flatten)]
    intent: PaymentIntent,
    #[serde(default)]
    next_action: Option<NextAction>,
}

#[derive(Debug, Deserialize)]
struct NextAction {
    #[serde(default)]
    redirect_to_url: Option<RedirectToUrl>,
}

#[derive(Debug, Deserialize)]
struct RedirectToUrl {
    url: Option<String>,
}

#[derive(Clone)]
pub struct StripeRestProcessor {
    http: Client,
    publishable_key: String,
    api_base: String,
}

impl StripeRestProcessor {
    pub fn new(
        publishable_key: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProcessorError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProcessorError::other(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(http, publishable_key, api_base))
    }

    pub fn with_client(
        http: Client,
        publishable_key: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            http,
            publishable_key: publishable_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn intent_url(&self, client_secret: &str, suffix: &str) -> Result<String, ProcessorError> {
        let id = payment_intent_id_from_secret(client_secret).ok_or_else(|| {
            ProcessorError::new(ProcessorErrorType::ValidationError, "malformed client secret")
                .with_code("invalid_client_secret")
        })?;
        Ok(format!("{}/v1/payment_intents/{}{}", self.api_base, id, suffix))
    }

    fn map_error(status: StatusCode, body: &str) -> ProcessorError {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => ProcessorError {
                error_type: ProcessorErrorType::from(envelope.error.type_.as_str()),
                message: envelope.error.message,
                code: envelope.error.code,
            },
            Err(_) => ProcessorError::other(format!("status={} body={}", status.as_u16(), body)),
        }
    }

    async fn read_intent(response: reqwest::Response) -> Result<IntentBody, ProcessorError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProcessorError::other(format!("http error: {}", e)))?;
        if !status.is_success() {
            let err = Self::map_error(status, &body);
            warn!(status = status.as_u16(), error = %err, "Processor request failed");
            return Err(err);
        }
        serde_json::from_str(&body).map_err(|e| ProcessorError::other(format!("decode error: {}", e)))
    }
}

#[async_trait]
impl PaymentProcessor for StripeRestProcessor {
    #[instrument(skip(self, request), fields(method = %request.method))]
    async fn confirm_payment(
        &self,
        request: ConfirmPaymentRequest,
    ) -> Result<ConfirmPaymentResponse, ProcessorError> {
        let url = self.intent_url(&request.client_secret, "/confirm")?;

        let mut params: Vec<(String, String)> = vec![
            ("client_secret".into(), request.client_secret.clone()),
            ("return_url".into(), request.return_url.clone()),
        ];
        match (&request.payment_method_id, request.method.descriptor().processor_type) {
            (Some(id), _) => params.push(("payment_method".into(), id.clone())),
            (None, Some(kind)) => params.push(("payment_method_data[type]".into(), kind.into())),
            (None, None) => {
                return Err(ProcessorError::new(
                    ProcessorErrorType::ValidationError,
                    format!("{} is not confirmed through the processor", request.method),
                ))
            }
        }

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.publishable_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| ProcessorError::other(format!("http error: {}", e)))?;
        let body = Self::read_intent(response).await?;

        let redirect_url = body
            .next_action
            .and_then(|action| action.redirect_to_url)
            .and_then(|redirect| redirect.url);
        let must_leave = body.intent.status == PaymentIntentStatus::RequiresAction
            && redirect_url.is_some();
        if must_leave || request.redirect == RedirectBehavior::Always {
            info!(payment_intent_id = %body.intent.id, "Leaving for off-site payment step");
            return Ok(ConfirmPaymentResponse::Redirected { redirect_url });
        }
        Ok(ConfirmPaymentResponse::Completed(body.intent))
    }

    #[instrument(skip(self, client_secret))]
    async fn retrieve_payment_intent(
        &self,
        client_secret: &str,
    ) -> Result<PaymentIntent, ProcessorError> {
        let url = self.intent_url(client_secret, "")?;
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.publishable_key)
            .query(&[("client_secret", client_secret)])
            .send()
            .await
            .map_err(|e| ProcessorError::other(format!("http error: {}", e)))?;
        Ok(Self::read_intent(response).await?.intent)
    }
}
