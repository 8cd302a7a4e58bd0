//! Checkout orchestration: intent creation, payment confirmation, order
//! finalization, redirect-return reconciliation and the PayMe status poller.
//!
//! Within one attempt each step consumes the previous step's output, so the
//! ordering intent, confirmation, finalization holds by construction. Across
//! an off-site redirect the only surviving state is the pending order
//! payload in transient storage.

pub mod completion;
pub mod flow;
pub mod intent_builder;
pub mod order_finalization;
pub mod payme_poller;
pub mod payment_confirmation;
pub mod redirect_reconciler;

pub use completion::CheckoutCompletion;
pub use flow::{CheckoutFlow, CheckoutResult};
pub use intent_builder::{IntentBuilder, PreparedCheckout};
pub use order_finalization::OrderFinalizationClient;
pub use payme_poller::{PaymePoller, PollerHandle, PollerState};
pub use payment_confirmation::PaymentConfirmationController;
pub use redirect_reconciler::{ReconcileOutcome, RedirectReturnReconciler};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;
use url::Url;

use crate::clients::OrderServiceError;
use crate::errors::CheckoutError;
use crate::models::DeliveryWindow;

/// Runtime knobs shared by the checkout components.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub delivery_window: DeliveryWindow,
    pub amount_tolerance: Decimal,
    /// ISO code every payment must be charged in.
    pub currency: String,
    /// Storefront origin used to build confirmation and checkout URLs.
    pub storefront_url: Url,
    /// Where the processor sends the shopper back after an off-site step.
    pub return_url: Url,
    pub success_redirect_delay: Duration,
    pub retry_redirect_delay: Duration,
    pub processing_recheck_delay: Duration,
    pub payme_poll_interval: Duration,
    pub payme_success_delay: Duration,
}

impl CheckoutSettings {
    pub fn new(storefront_url: Url, return_url: Url) -> Self {
        Self {
            delivery_window: DeliveryWindow::default(),
            amount_tolerance: dec!(0.01),
            currency: "HKD".to_string(),
            storefront_url,
            return_url,
            success_redirect_delay: Duration::from_millis(3000),
            retry_redirect_delay: Duration::from_millis(3000),
            processing_recheck_delay: Duration::from_millis(3000),
            payme_poll_interval: Duration::from_secs(30),
            payme_success_delay: Duration::from_millis(2000),
        }
    }

    /// All presentational delays set to zero; polling interval untouched.
    pub fn without_delays(mut self) -> Self {
        self.success_redirect_delay = Duration::ZERO;
        self.retry_redirect_delay = Duration::ZERO;
        self.processing_recheck_delay = Duration::ZERO;
        self.payme_success_delay = Duration::ZERO;
        self
    }
}

/// Maps an order service failure that happened before any money moved.
pub(crate) fn pre_payment_error(err: OrderServiceError) -> CheckoutError {
    match err {
        OrderServiceError::Status { status: 429, .. } => CheckoutError::RateLimited,
        OrderServiceError::Status {
            status: 400,
            message,
        } => CheckoutError::InvalidRequest(
            message.unwrap_or_else(|| "invalid order data".to_string()),
        ),
        OrderServiceError::Status { status, message } => CheckoutError::ServiceUnavailable(
            message.unwrap_or_else(|| format!("order service returned {}", status)),
        ),
        OrderServiceError::Network(detail) => CheckoutError::Network(detail),
        OrderServiceError::Decode(detail) => CheckoutError::ServiceUnavailable(detail),
        OrderServiceError::InvalidPath(detail) => CheckoutError::InvalidRequest(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn rate_limit_is_distinct_from_server_error() {
        assert_matches!(
            pre_payment_error(OrderServiceError::Status {
                status: 429,
                message: Some("slow down".into())
            }),
            CheckoutError::RateLimited
        );
        assert_matches!(
            pre_payment_error(OrderServiceError::Status {
                status: 503,
                message: None
            }),
            CheckoutError::ServiceUnavailable(msg) if msg.contains("503")
        );
        assert_matches!(
            pre_payment_error(OrderServiceError::Status {
                status: 400,
                message: None
            }),
            CheckoutError::InvalidRequest(msg) if msg == "invalid order data"
        );
    }
}
