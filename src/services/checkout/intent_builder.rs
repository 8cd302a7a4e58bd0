use chrono::{Local, NaiveDate};
use metrics::counter;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::pre_payment_error;
use crate::clients::OrderServiceApi;
use crate::errors::CheckoutError;
use crate::models::{
    CartSnapshot, CheckoutFormData, DeliveryWindow, OrderRequest, PaymentIntentResult,
    PaymentMethod,
};

/// A validated form plus the intent the order service created for it.
///
/// Owns the form and cart snapshot so neither can change between intent
/// creation and confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCheckout {
    attempt_id: Uuid,
    form: CheckoutFormData,
    cart: CartSnapshot,
    intent: PaymentIntentResult,
}

impl PreparedCheckout {
    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn form(&self) -> &CheckoutFormData {
        &self.form
    }

    pub fn cart(&self) -> &CartSnapshot {
        &self.cart
    }

    pub fn intent(&self) -> &PaymentIntentResult {
        &self.intent
    }

    pub fn method(&self) -> PaymentMethod {
        self.form.payment_method
    }

    /// Cart total at intent creation, the amount the processor must report.
    pub fn expected_total(&self) -> Decimal {
        self.cart.total()
    }

    /// A redirect is possible when either the method or the server says so.
    pub fn may_redirect(&self) -> bool {
        self.method().requires_redirect() || self.intent.requires_redirect
    }

    /// Method ordering hint for the payment element. Not a security boundary.
    pub fn payment_method_order(&self) -> Vec<&'static str> {
        self.method().payment_method_order()
    }
}

#[derive(Clone)]
pub struct IntentBuilder {
    order_service: Arc<dyn OrderServiceApi>,
    window: DeliveryWindow,
}

impl IntentBuilder {
    pub fn new(order_service: Arc<dyn OrderServiceApi>, window: DeliveryWindow) -> Self {
        Self {
            order_service,
            window,
        }
    }

    pub async fn prepare(
        &self,
        form: CheckoutFormData,
        cart: CartSnapshot,
    ) -> Result<PreparedCheckout, CheckoutError> {
        self.prepare_on(form, cart, Local::now().date_naive()).await
    }

    /// Validates locally, then requests one payment intent. Nothing is sent
    /// when validation fails. Safe to call again after any failure.
    #[instrument(skip(self, form, cart), fields(method = %form.payment_method, total = %cart.total()))]
    pub async fn prepare_on(
        &self,
        form: CheckoutFormData,
        cart: CartSnapshot,
        today: NaiveDate,
    ) -> Result<PreparedCheckout, CheckoutError> {
        form.validate_on(today, &self.window)?;
        check_cart(&cart)?;
        if !form.payment_method.uses_processor() {
            return Err(CheckoutError::InvalidRequest(format!(
                "{} is not paid through a payment intent",
                form.payment_method.display_label()
            )));
        }

        let items = cart.order_lines();
        let request = OrderRequest {
            form: &form,
            items: &items,
        };
        let intent = self
            .order_service
            .create_payment_intent(&request)
            .await
            .map_err(|err| {
                warn!(error = %err, "Payment intent request failed");
                pre_payment_error(err)
            })?;

        let attempt_id = Uuid::new_v4();
        counter!("checkout.intents.created", 1);
        info!(
            %attempt_id,
            payment_intent_id = intent.payment_intent_id().unwrap_or("unknown"),
            requires_redirect = intent.requires_redirect,
            "Payment intent created"
        );

        Ok(PreparedCheckout {
            attempt_id,
            form,
            cart,
            intent,
        })
    }
}

pub(crate) fn check_cart(cart: &CartSnapshot) -> Result<(), CheckoutError> {
    if cart.is_empty() {
        return Err(CheckoutError::InvalidRequest("Your cart is empty".to_string()));
    }
    if cart.total() <= Decimal::ZERO {
        return Err(CheckoutError::InvalidRequest(
            "Cart total must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
