use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single failed form field, ready to render next to the input it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl FieldError {
    pub fn new(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// How loudly an error has to be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Nothing was charged; the user edits and resubmits.
    Recoverable,
    /// The user has to talk to support, usually quoting a payment reference.
    ContactSupport,
    /// The charge went through but the order could not be recorded.
    FatalButPaid,
}

/// Transport cause for a post-payment system failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    ServerError,
    Network,
    UnreadableResponse,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureCause::ServerError => "server error",
            FailureCause::Network => "network failure",
            FailureCause::UnreadableResponse => "unreadable response",
        };
        f.write_str(label)
    }
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum CheckoutError {
    #[error("Validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Payment data incomplete: {0}")]
    PaymentDataIncomplete(String),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Amount mismatch: expected {expected}, processor reported {paid} (payment {payment_reference})")]
    AmountMismatch {
        expected: Decimal,
        paid: Decimal,
        payment_reference: String,
    },

    #[error("Order rejected after payment {payment_reference}: {message}")]
    OrderRejected {
        message: String,
        payment_reference: String,
    },

    #[error("Order could not be recorded after payment {payment_reference}: {cause}")]
    OrderSystemFailure {
        payment_reference: String,
        cause: FailureCause,
        detail: String,
    },

    #[error("Pending order payload lost for payment {payment_reference}")]
    PayloadLost { payment_reference: String },

    #[error("Payment data missing from return URL")]
    PaymentDataMissing,

    #[error("Order finalization already in progress for payment {0}")]
    FinalizeInProgress(String),

    #[error("Confirmation link is missing {0}")]
    MissingConfirmationParams(&'static str),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<serde_json::Error> for CheckoutError {
    fn from(err: serde_json::Error) -> Self {
        CheckoutError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for CheckoutError {
    fn from(err: std::io::Error) -> Self {
        CheckoutError::Storage(err.to_string())
    }
}

impl From<validator::ValidationErrors> for CheckoutError {
    fn from(err: validator::ValidationErrors) -> Self {
        CheckoutError::Validation(crate::models::checkout_form::field_errors(&err))
    }
}

impl CheckoutError {
    /// Returns the presentation weight for this error.
    /// This is the single source of truth for error-to-severity mapping.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Validation(_)
            | Self::InvalidRequest(_)
            | Self::RateLimited
            | Self::ServiceUnavailable(_)
            | Self::Network(_)
            | Self::PaymentDeclined(_)
            | Self::PaymentDataIncomplete(_)
            | Self::PaymentFailed(_)
            | Self::PaymentDataMissing
            | Self::FinalizeInProgress(_)
            | Self::MissingConfirmationParams(_)
            | Self::OrderNotFound(_)
            | Self::Storage(_)
            | Self::Serialization(_) => Severity::Recoverable,
            Self::AmountMismatch { .. } | Self::OrderRejected { .. } => Severity::ContactSupport,
            Self::OrderSystemFailure { .. } | Self::PayloadLost { .. } => Severity::FatalButPaid,
        }
    }

    /// True once the processor has confirmed the charge.
    pub fn is_post_payment(&self) -> bool {
        self.payment_reference().is_some()
    }

    pub fn payment_reference(&self) -> Option<&str> {
        match self {
            Self::AmountMismatch {
                payment_reference, ..
            }
            | Self::OrderRejected {
                payment_reference, ..
            }
            | Self::OrderSystemFailure {
                payment_reference, ..
            }
            | Self::PayloadLost { payment_reference } => Some(payment_reference),
            _ => None,
        }
    }

    /// Fatal-but-paid guidance stays on screen until the user leaves the flow.
    pub fn is_dismissible(&self) -> bool {
        self.severity() != Severity::FatalButPaid
    }

    /// Returns the message suitable for showing to the shopper.
    /// Post-payment errors always say the money was taken and quote the reference.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(errors) => match errors.first() {
                Some(first) => first.message.clone(),
                None => "Please check the highlighted fields".to_string(),
            },
            Self::InvalidRequest(msg) => msg.clone(),
            Self::RateLimited => "Too many requests, please wait a moment and try again".to_string(),
            Self::ServiceUnavailable(_) | Self::Network(_) => {
                "Checkout is temporarily unavailable, please try again later".to_string()
            }
            Self::PaymentDeclined(_) => {
                "Your card was declined, please use a different card".to_string()
            }
            Self::PaymentDataIncomplete(_) => {
                "Payment details are incomplete, please check and try again".to_string()
            }
            Self::PaymentFailed(_) => "Payment failed, please try again".to_string(),
            Self::AmountMismatch {
                payment_reference, ..
            } => format!(
                "Your payment was received but the amount does not match your order. \
                 Please contact support with payment reference {}",
                payment_reference
            ),
            Self::OrderRejected {
                message,
                payment_reference,
            } => format!(
                "Your payment was successful but the order was rejected: {}. \
                 Please contact support with payment reference {} instead of paying again",
                message, payment_reference
            ),
            Self::OrderSystemFailure {
                payment_reference, ..
            } => format!(
                "Your payment was successful but we could not record your order because of a system error. \
                 Please contact support with payment reference {}",
                payment_reference
            ),
            Self::PayloadLost { payment_reference } => format!(
                "Your payment was successful but your order details were lost. \
                 Please contact support with payment reference {}",
                payment_reference
            ),
            Self::PaymentDataMissing => {
                "Payment data missing, please return to checkout".to_string()
            }
            Self::FinalizeInProgress(_) => "Your order is already being placed".to_string(),
            Self::MissingConfirmationParams(_) => {
                "This confirmation link is incomplete".to_string()
            }
            Self::OrderNotFound(_) => "We could not find that order".to_string(),
            Self::Storage(_) | Self::Serialization(_) => {
                "Something went wrong, please try again".to_string()
            }
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}
