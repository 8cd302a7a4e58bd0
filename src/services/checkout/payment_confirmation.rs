use metrics::counter;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use url::Url;

use super::intent_builder::PreparedCheckout;
use crate::clients::PaymentProcessor;
use crate::errors::CheckoutError;
use crate::models::payment::amounts_match;
use crate::models::{
    ConfirmPaymentRequest, ConfirmPaymentResponse, PaymentConfirmationOutcome, PaymentFailure,
    PaymentIntentStatus, PendingOrderPayload, RedirectBehavior,
};
use crate::storage::PendingOrderStore;

/// Drives the processor's confirm operation for a prepared checkout.
#[derive(Clone)]
pub struct PaymentConfirmationController {
    processor: Arc<dyn PaymentProcessor>,
    pending: PendingOrderStore,
    return_url: Url,
    tolerance: Decimal,
    currency: String,
}

impl PaymentConfirmationController {
    pub fn new(
        processor: Arc<dyn PaymentProcessor>,
        pending: PendingOrderStore,
        return_url: Url,
        tolerance: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            processor,
            pending,
            return_url,
            tolerance,
            currency: currency.into(),
        }
    }

    /// Confirms payment with `redirect: if_required`.
    ///
    /// When the attempt may leave the page the pending payload is written
    /// first; if that write fails the processor is never called. The only
    /// `Err` is such a storage failure, every processor result is an outcome.
    #[instrument(
        skip(self, prepared, payment_method_id),
        fields(attempt_id = %prepared.attempt_id(), method = %prepared.method())
    )]
    pub async fn confirm(
        &self,
        prepared: &PreparedCheckout,
        payment_method_id: Option<String>,
    ) -> Result<PaymentConfirmationOutcome, CheckoutError> {
        if prepared.may_redirect() {
            self.pending
                .save(&PendingOrderPayload::new(prepared.form().clone(), prepared.cart()))?;
        }

        let request = ConfirmPaymentRequest {
            client_secret: prepared.intent().client_secret.clone(),
            return_url: self.return_url.to_string(),
            redirect: RedirectBehavior::IfRequired,
            method: prepared.method(),
            payment_method_id,
        };

        let response = match self.processor.confirm_payment(request).await {
            Ok(response) => response,
            Err(err) => {
                counter!("checkout.payments.failed", 1);
                warn!(error = %err, "Payment confirmation failed");
                return Ok(PaymentConfirmationOutcome::Failed(PaymentFailure::from(err)));
            }
        };

        let intent = match response {
            ConfirmPaymentResponse::Redirected { redirect_url } => {
                info!(redirect_url = ?redirect_url, "Payment continues off-site");
                return Ok(PaymentConfirmationOutcome::RedirectInitiated);
            }
            ConfirmPaymentResponse::Completed(intent) => intent,
        };

        let outcome = match intent.status {
            PaymentIntentStatus::Succeeded => {
                let expected = prepared.expected_total();
                let paid = intent.amount_major();
                let same_currency = intent.is_in_currency(&self.currency);
                if same_currency && amounts_match(expected, paid, self.tolerance) {
                    info!(payment_reference = %intent.id, %paid, "Payment succeeded");
                    PaymentConfirmationOutcome::Succeeded {
                        payment_reference: intent.id,
                        paid_amount: paid,
                    }
                } else {
                    counter!("checkout.payments.amount_mismatch", 1);
                    error!(
                        payment_reference = %intent.id,
                        %expected,
                        %paid,
                        expected_currency = %self.currency,
                        paid_currency = %intent.currency,
                        "Paid amount does not match cart total"
                    );
                    PaymentConfirmationOutcome::Failed(PaymentFailure::AmountMismatch {
                        expected,
                        paid,
                        payment_reference: intent.id,
                    })
                }
            }
            PaymentIntentStatus::Processing => PaymentConfirmationOutcome::Processing {
                payment_reference: intent.id,
            },
            PaymentIntentStatus::RequiresPaymentMethod => {
                counter!("checkout.payments.failed", 1);
                PaymentConfirmationOutcome::RequiresNewMethod
            }
            other => {
                counter!("checkout.payments.failed", 1);
                warn!(status = %other, "Unexpected payment status after confirmation");
                PaymentConfirmationOutcome::Failed(PaymentFailure::Generic(format!(
                    "payment ended in status {}",
                    other
                )))
            }
        };
        Ok(outcome)
    }
}
