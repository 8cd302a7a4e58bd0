use metrics::counter;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use url::Url;

use super::completion::CheckoutCompletion;
use super::order_finalization::OrderFinalizationClient;
use super::CheckoutSettings;
use crate::clients::PaymentProcessor;
use crate::errors::CheckoutError;
use crate::models::payment::amounts_match;
use crate::models::{
    FinalizedOrder, Order, PaymentFailure, PaymentIntent, PaymentIntentStatus, PendingOrderPayload,
};
use crate::navigation::{Navigator, Route};
use crate::storage::PendingOrderStore;

/// Query parameter the processor appends to the return URL.
pub const CLIENT_SECRET_PARAM: &str = "payment_intent_client_secret";

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// The order exists and the confirmation page is on its way.
    Completed(Order),
    /// Still processing after the single re-check. The pending payload is
    /// kept so a later reload can finish the order.
    StillProcessing { payment_reference: String },
}

/// Finishes a checkout after the shopper returns from an off-site payment.
#[derive(Clone)]
pub struct RedirectReturnReconciler {
    processor: Arc<dyn PaymentProcessor>,
    finalization: Arc<OrderFinalizationClient>,
    completion: Arc<CheckoutCompletion>,
    pending: PendingOrderStore,
    navigator: Arc<dyn Navigator>,
    settings: CheckoutSettings,
}

impl RedirectReturnReconciler {
    pub fn new(
        processor: Arc<dyn PaymentProcessor>,
        finalization: Arc<OrderFinalizationClient>,
        completion: Arc<CheckoutCompletion>,
        pending: PendingOrderStore,
        navigator: Arc<dyn Navigator>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            processor,
            finalization,
            completion,
            pending,
            navigator,
            settings,
        }
    }

    /// Entry point for the return page.
    pub async fn reconcile(&self, return_url: &Url) -> Result<ReconcileOutcome, CheckoutError> {
        let client_secret = return_url
            .query_pairs()
            .find(|(key, _)| key == CLIENT_SECRET_PARAM)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
            .ok_or(CheckoutError::PaymentDataMissing)?;
        self.reconcile_secret(&client_secret).await
    }

    #[instrument(skip(self, client_secret))]
    pub async fn reconcile_secret(
        &self,
        client_secret: &str,
    ) -> Result<ReconcileOutcome, CheckoutError> {
        let mut intent = self.retrieve(client_secret).await?;

        if intent.status == PaymentIntentStatus::Processing {
            info!(
                payment_reference = %intent.id,
                delay_ms = self.settings.processing_recheck_delay.as_millis() as u64,
                "Payment still processing, checking once more"
            );
            tokio::time::sleep(self.settings.processing_recheck_delay).await;
            intent = self.retrieve(client_secret).await?;
        }

        match intent.status {
            PaymentIntentStatus::Succeeded => self.finish(intent).await,
            PaymentIntentStatus::Processing => {
                warn!(payment_reference = %intent.id, "Payment still processing after re-check");
                Ok(ReconcileOutcome::StillProcessing {
                    payment_reference: intent.id,
                })
            }
            PaymentIntentStatus::RequiresPaymentMethod => {
                counter!("checkout.payments.failed", 1);
                warn!(payment_reference = %intent.id, "Off-site payment failed, returning to checkout");
                let navigator = self.navigator.clone();
                let delay = self.settings.retry_redirect_delay;
                tokio::spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    navigator.navigate(Route::Checkout);
                });
                Err(CheckoutError::PaymentFailed(
                    "payment failed, please retry".to_string(),
                ))
            }
            other => {
                counter!("checkout.payments.failed", 1);
                warn!(payment_reference = %intent.id, status = %other, "Off-site payment did not succeed");
                Err(CheckoutError::PaymentFailed(format!(
                    "payment ended in status {}",
                    other
                )))
            }
        }
    }

    async fn retrieve(&self, client_secret: &str) -> Result<PaymentIntent, CheckoutError> {
        self.processor
            .retrieve_payment_intent(client_secret)
            .await
            .map_err(|err| {
                warn!(error = %err, "Could not retrieve payment intent");
                CheckoutError::from(PaymentFailure::from(err))
            })
    }

    async fn finish(&self, intent: PaymentIntent) -> Result<ReconcileOutcome, CheckoutError> {
        let payment_reference = intent.id.clone();
        let payload = match self.pending.load()? {
            Some(payload) => payload,
            None => {
                error!(%payment_reference, "Payment succeeded but no pending order payload was found");
                return Err(CheckoutError::PayloadLost { payment_reference });
            }
        };

        if let Some(order) = payload.finalized_for(&payment_reference) {
            info!(
                %payment_reference,
                order_number = %order.order_number,
                "Order already created for this payment"
            );
            let order = order.clone();
            if let Err(err) = self.pending.clear() {
                warn!(error = %err, "Could not delete pending order payload");
            }
            self.completion.complete(
                &order.order_number,
                &payload.form.customer_email,
                self.settings.success_redirect_delay,
            );
            return Ok(ReconcileOutcome::Completed(order));
        }

        let paid = intent.amount_major();
        let expected = payload.expected_total.unwrap_or(paid);
        let same_currency = intent.is_in_currency(&self.settings.currency);
        if !same_currency || !amounts_match(expected, paid, self.settings.amount_tolerance) {
            counter!("checkout.payments.amount_mismatch", 1);
            error!(
                %payment_reference,
                %expected,
                %paid,
                expected_currency = %self.settings.currency,
                paid_currency = %intent.currency,
                "Paid amount does not match pending order"
            );
            return Err(CheckoutError::AmountMismatch {
                expected,
                paid,
                payment_reference,
            });
        }

        // The payload survives a failed finalize so a reload can try again.
        let order = self
            .finalization
            .finalize(&payload.form, &payload.items, &payment_reference)
            .await?;

        if let Err(err) = self.pending.clear() {
            warn!(error = %err, "Could not delete pending order payload");
            self.mark_finalized(&payload, &payment_reference, &order);
        }
        counter!("checkout.redirects.reconciled", 1);
        info!(%payment_reference, order_number = %order.order_number, "Redirect payment reconciled");

        self.completion.complete(
            &order.order_number,
            &payload.form.customer_email,
            self.settings.success_redirect_delay,
        );
        Ok(ReconcileOutcome::Completed(order))
    }

    /// Records the created order on the leftover payload so a reload
    /// completes from it instead of finalizing again.
    fn mark_finalized(&self, payload: &PendingOrderPayload, payment_reference: &str, order: &Order) {
        let mut marked = payload.clone();
        marked.finalized = Some(FinalizedOrder {
            payment_reference: payment_reference.to_string(),
            order: order.clone(),
        });
        if let Err(err) = self.pending.save(&marked) {
            error!(
                error = %err,
                %payment_reference,
                order_number = %order.order_number,
                "Could not mark pending order payload as finalized"
            );
        }
    }
}
