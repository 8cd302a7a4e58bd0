use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::intent_builder::check_cart;
use super::{
    pre_payment_error, CheckoutCompletion, CheckoutSettings, IntentBuilder,
    OrderFinalizationClient, PaymePoller, PaymentConfirmationController, PollerHandle,
    PreparedCheckout, RedirectReturnReconciler,
};
use crate::cart::CartStore;
use crate::clients::{OrderServiceApi, PaymentProcessor};
use crate::errors::CheckoutError;
use crate::models::{
    CheckoutFormData, Order, OrderRequest, PaymeOrder, PaymentConfirmationOutcome,
    PaymentMethod, PendingOrderPayload,
};
use crate::navigation::Navigator;
use crate::storage::PendingOrderStore;

/// Where an inline confirmation left the checkout.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutResult {
    /// Order created; cart cleared and confirmation navigation scheduled.
    Completed(Order),
    /// The shopper is off-site. The return page takes over.
    Redirecting,
    /// The processor accepted the payment but has not settled it. The pending
    /// payload is parked so the return page can finish with `client_secret`.
    Processing {
        payment_reference: String,
        client_secret: String,
    },
}

/// The whole checkout for one storefront session.
///
/// Finalization and completion are shared between the inline, redirect and
/// PayMe paths so an order is posted and completed at most once whichever
/// path reports it first.
#[derive(Clone)]
pub struct CheckoutFlow {
    cart: Arc<dyn CartStore>,
    order_service: Arc<dyn OrderServiceApi>,
    pending: PendingOrderStore,
    intent_builder: IntentBuilder,
    confirmation: PaymentConfirmationController,
    finalization: Arc<OrderFinalizationClient>,
    completion: Arc<CheckoutCompletion>,
    reconciler: RedirectReturnReconciler,
    payme: PaymePoller,
    settings: CheckoutSettings,
}

impl CheckoutFlow {
    pub fn new(
        settings: CheckoutSettings,
        order_service: Arc<dyn OrderServiceApi>,
        processor: Arc<dyn PaymentProcessor>,
        cart: Arc<dyn CartStore>,
        pending: PendingOrderStore,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let finalization = Arc::new(OrderFinalizationClient::new(order_service.clone()));
        let completion = Arc::new(CheckoutCompletion::new(cart.clone(), navigator.clone()));
        let intent_builder = IntentBuilder::new(order_service.clone(), settings.delivery_window);
        let confirmation = PaymentConfirmationController::new(
            processor.clone(),
            pending.clone(),
            settings.return_url.clone(),
            settings.amount_tolerance,
            settings.currency.clone(),
        );
        let reconciler = RedirectReturnReconciler::new(
            processor,
            finalization.clone(),
            completion.clone(),
            pending.clone(),
            navigator,
            settings.clone(),
        );
        let payme = PaymePoller::new(
            order_service.clone(),
            completion.clone(),
            settings.payme_poll_interval,
            settings.payme_success_delay,
        );

        Self {
            cart,
            order_service,
            pending,
            intent_builder,
            confirmation,
            finalization,
            completion,
            reconciler,
            payme,
            settings,
        }
    }

    pub fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    pub fn reconciler(&self) -> &RedirectReturnReconciler {
        &self.reconciler
    }

    pub fn payme_poller(&self) -> &PaymePoller {
        &self.payme
    }

    /// Step one: snapshot the cart and create the payment intent.
    pub async fn begin(&self, form: CheckoutFormData) -> Result<PreparedCheckout, CheckoutError> {
        self.intent_builder.prepare(form, self.cart.snapshot()).await
    }

    /// Step two: confirm the payment and, when it settles in-page, create the order.
    #[instrument(skip(self, prepared, payment_method_id), fields(attempt_id = %prepared.attempt_id()))]
    pub async fn confirm(
        &self,
        prepared: &PreparedCheckout,
        payment_method_id: Option<String>,
    ) -> Result<CheckoutResult, CheckoutError> {
        let outcome = self.confirmation.confirm(prepared, payment_method_id).await?;

        match outcome {
            PaymentConfirmationOutcome::Succeeded {
                payment_reference, ..
            } => {
                let items = prepared.cart().order_lines();
                let order = self
                    .finalization
                    .finalize(prepared.form(), &items, &payment_reference)
                    .await?;
                if prepared.may_redirect() {
                    // Settled in-page after all; the parked payload is spent.
                    if let Err(err) = self.pending.clear() {
                        warn!(error = %err, "Could not delete pending order payload");
                    }
                }
                self.completion.complete(
                    &order.order_number,
                    &prepared.form().customer_email,
                    self.settings.success_redirect_delay,
                );
                Ok(CheckoutResult::Completed(order))
            }
            PaymentConfirmationOutcome::Processing { payment_reference } => {
                if !prepared.may_redirect() {
                    self.pending
                        .save(&PendingOrderPayload::new(prepared.form().clone(), prepared.cart()))?;
                }
                info!(%payment_reference, "Payment processing, order will be finished on return");
                Ok(CheckoutResult::Processing {
                    payment_reference,
                    client_secret: prepared.intent().client_secret.clone(),
                })
            }
            PaymentConfirmationOutcome::RequiresNewMethod => Err(CheckoutError::PaymentFailed(
                "payment failed, please try another payment method".to_string(),
            )),
            PaymentConfirmationOutcome::Failed(failure) => Err(failure.into()),
            PaymentConfirmationOutcome::RedirectInitiated => Ok(CheckoutResult::Redirecting),
        }
    }

    /// PayMe path: create the order awaiting transfer and start polling it.
    pub async fn start_payme(
        &self,
        form: CheckoutFormData,
    ) -> Result<(PaymeOrder, PollerHandle), CheckoutError> {
        self.start_payme_on(form, Local::now().date_naive()).await
    }

    #[instrument(skip(self, form))]
    pub async fn start_payme_on(
        &self,
        form: CheckoutFormData,
        today: NaiveDate,
    ) -> Result<(PaymeOrder, PollerHandle), CheckoutError> {
        if form.payment_method != PaymentMethod::PayMe {
            return Err(CheckoutError::InvalidRequest(format!(
                "{} is not a manual transfer method",
                form.payment_method.display_label()
            )));
        }
        form.validate_on(today, &self.settings.delivery_window)?;
        let cart = self.cart.snapshot();
        check_cart(&cart)?;

        let items = cart.order_lines();
        let order = self
            .order_service
            .create_payme_order(&OrderRequest {
                form: &form,
                items: &items,
            })
            .await
            .map_err(pre_payment_error)?;
        info!(
            order_number = %order.order_number,
            payme_reference = %order.payme_reference,
            "PayMe order created, waiting for transfer"
        );

        let handle = self.payme.spawn(order.order_number.clone(), form.customer_email);
        Ok((order, handle))
    }
}
