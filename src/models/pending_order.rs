use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::cart::CartSnapshot;
use super::checkout_form::CheckoutFormData;
use super::order::Order;

/// Product and quantity as the order service expects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: u64,
    pub quantity: u32,
}

/// Order data parked in transient storage while the shopper is off-site.
///
/// Written by the confirmation controller before a redirect-capable
/// confirmation, consumed and deleted by the redirect-return reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOrderPayload {
    #[serde(flatten)]
    pub form: CheckoutFormData,
    pub items: Vec<OrderLine>,
    /// Cart total at intent creation, re-checked against the processor on return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_total: Option<Decimal>,
    /// Set when the order was created but the payload could not be deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized: Option<FinalizedOrder>,
}

/// The order already created for a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedOrder {
    pub payment_reference: String,
    pub order: Order,
}

impl PendingOrderPayload {
    pub fn new(form: CheckoutFormData, cart: &CartSnapshot) -> Self {
        Self {
            form,
            items: cart.order_lines(),
            expected_total: Some(cart.total()),
            finalized: None,
        }
    }

    /// The order created for `payment_reference`, if this payload records one.
    pub fn finalized_for(&self, payment_reference: &str) -> Option<&Order> {
        self.finalized
            .as_ref()
            .filter(|done| done.payment_reference == payment_reference)
            .map(|done| &done.order)
    }
}

/// Body of `POST /create-payment-intent` and `POST /orders/payme`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest<'a> {
    #[serde(flatten)]
    pub form: &'a CheckoutFormData,
    pub items: &'a [OrderLine],
}

/// Body of `POST /confirm`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeOrderRequest<'a> {
    #[serde(flatten)]
    pub form: &'a CheckoutFormData,
    pub items: &'a [OrderLine],
    pub payment_intent_id: &'a str,
}
