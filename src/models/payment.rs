use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::payment_method::PaymentMethod;

/// Currencies the processor counts in whole units rather than cents.
const ZERO_DECIMAL_CURRENCIES: [&str; 16] = [
    "bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga", "pyg", "rwf", "ugx", "vnd", "vuv",
    "xaf", "xof", "xpf",
];

/// Response of `POST /create-payment-intent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResult {
    pub client_secret: String,
    #[serde(default)]
    pub requires_redirect: bool,
}

impl PaymentIntentResult {
    /// Payment intent id embedded in the client secret (`pi_..._secret_...`).
    pub fn payment_intent_id(&self) -> Option<&str> {
        payment_intent_id_from_secret(&self.client_secret)
    }
}

pub fn payment_intent_id_from_secret(client_secret: &str) -> Option<&str> {
    client_secret
        .split_once("_secret_")
        .map(|(id, _)| id)
        .filter(|id| !id.is_empty())
}

/// Status of a payment intent as the processor reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentIntentStatus {
    Succeeded,
    Processing,
    RequiresPaymentMethod,
    RequiresAction,
    RequiresConfirmation,
    RequiresCapture,
    Canceled,
    #[serde(other)]
    Unknown,
}

/// The processor's payment object, trimmed to what checkout reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: PaymentIntentStatus,
    /// Amount in the currency's minor unit.
    pub amount: i64,
    pub currency: String,
}

impl PaymentIntent {
    /// Amount converted to major units (e.g. dollars from cents).
    pub fn amount_major(&self) -> Decimal {
        minor_to_major(self.amount, &self.currency)
    }

    /// Processor currency codes are lowercase, configured ones usually are not.
    pub fn is_in_currency(&self, currency: &str) -> bool {
        self.currency.eq_ignore_ascii_case(currency)
    }
}

pub fn minor_to_major(amount: i64, currency: &str) -> Decimal {
    let lower = currency.to_ascii_lowercase();
    if ZERO_DECIMAL_CURRENCIES.contains(&lower.as_str()) {
        Decimal::from(amount)
    } else {
        Decimal::new(amount, 2)
    }
}

/// True when the paid amount is within `tolerance` of the expected total.
pub fn amounts_match(expected: Decimal, paid: Decimal, tolerance: Decimal) -> bool {
    (expected - paid).abs() <= tolerance
}

/// Whether confirmation may navigate the browser away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectBehavior {
    /// Only leave the page when the method demands an off-site step.
    IfRequired,
    Always,
}

/// Everything the processor needs to confirm the collected payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmPaymentRequest {
    pub client_secret: String,
    pub return_url: String,
    pub redirect: RedirectBehavior,
    pub method: PaymentMethod,
    /// Payment method collected by the hosted element, when the host has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<String>,
}

/// What the processor did with a confirmation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmPaymentResponse {
    /// Confirmation resolved in-page.
    Completed(PaymentIntent),
    /// The browser is leaving for the off-site step.
    Redirected { redirect_url: Option<String> },
}

/// Error category reported by the processor's `type` discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessorErrorType {
    CardError,
    ValidationError,
    Other,
}

impl From<&str> for ProcessorErrorType {
    fn from(s: &str) -> Self {
        match s {
            "card_error" => ProcessorErrorType::CardError,
            "validation_error" => ProcessorErrorType::ValidationError,
            _ => ProcessorErrorType::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("processor error: {error_type:?} message={message:?} code={code:?}")]
pub struct ProcessorError {
    pub error_type: ProcessorErrorType,
    pub message: Option<String>,
    pub code: Option<String>,
}

impl ProcessorError {
    pub fn new(error_type: ProcessorErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: Some(message.into()),
            code: None,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ProcessorErrorType::Other, message)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Why a confirmation did not produce a usable payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentFailure {
    Declined(String),
    Incomplete(String),
    Generic(String),
    AmountMismatch {
        expected: Decimal,
        paid: Decimal,
        payment_reference: String,
    },
}

impl fmt::Display for PaymentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentFailure::Declined(reason) => write!(f, "card declined: {}", reason),
            PaymentFailure::Incomplete(reason) => write!(f, "incomplete payment data: {}", reason),
            PaymentFailure::Generic(reason) => write!(f, "payment failed, retry: {}", reason),
            PaymentFailure::AmountMismatch { expected, paid, .. } => write!(
                f,
                "amount mismatch, contact support: expected {} paid {}",
                expected, paid
            ),
        }
    }
}

impl From<ProcessorError> for PaymentFailure {
    fn from(err: ProcessorError) -> Self {
        let reason = err
            .message
            .or(err.code)
            .unwrap_or_else(|| "unknown processor error".to_string());
        match err.error_type {
            ProcessorErrorType::CardError => PaymentFailure::Declined(reason),
            ProcessorErrorType::ValidationError => PaymentFailure::Incomplete(reason),
            ProcessorErrorType::Other => PaymentFailure::Generic(reason),
        }
    }
}

impl From<PaymentFailure> for crate::errors::CheckoutError {
    fn from(failure: PaymentFailure) -> Self {
        use crate::errors::CheckoutError;
        match failure {
            PaymentFailure::Declined(reason) => CheckoutError::PaymentDeclined(reason),
            PaymentFailure::Incomplete(reason) => CheckoutError::PaymentDataIncomplete(reason),
            PaymentFailure::Generic(reason) => CheckoutError::PaymentFailed(reason),
            PaymentFailure::AmountMismatch {
                expected,
                paid,
                payment_reference,
            } => CheckoutError::AmountMismatch {
                expected,
                paid,
                payment_reference,
            },
        }
    }
}

/// Result of driving the processor's confirm operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentConfirmationOutcome {
    Succeeded {
        payment_reference: String,
        paid_amount: Decimal,
    },
    Processing {
        payment_reference: String,
    },
    RequiresNewMethod,
    Failed(PaymentFailure),
    RedirectInitiated,
}
