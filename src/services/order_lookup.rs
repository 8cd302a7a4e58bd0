use std::sync::Arc;
use tracing::{info, instrument};
use url::Url;

use crate::clients::{OrderServiceApi, OrderServiceError};
use crate::errors::CheckoutError;
use crate::models::Order;
use crate::navigation::ConfirmationQuery;

use super::checkout::pre_payment_error;

/// Read-only order lookup behind the confirmation page.
#[derive(Clone)]
pub struct OrderLookupService {
    order_service: Arc<dyn OrderServiceApi>,
}

impl OrderLookupService {
    pub fn new(order_service: Arc<dyn OrderServiceApi>) -> Self {
        Self { order_service }
    }

    /// Resolves a confirmation link. A link missing either parameter is an
    /// error value, never a panic.
    pub async fn from_confirmation_url(&self, url: &Url) -> Result<Order, CheckoutError> {
        let query = ConfirmationQuery::from_url(url)?;
        self.get_order(&query.order_number, &query.email).await
    }

    #[instrument(skip(self, email))]
    pub async fn get_order(&self, order_number: &str, email: &str) -> Result<Order, CheckoutError> {
        match self.order_service.get_order(order_number, email).await {
            Ok(order) => {
                info!(status = %order.status, payment_status = %order.payment_status, "Order loaded");
                Ok(order)
            }
            Err(OrderServiceError::Status { status: 404, .. }) => {
                Err(CheckoutError::OrderNotFound(order_number.to_string()))
            }
            Err(err) => Err(pre_payment_error(err)),
        }
    }
}
