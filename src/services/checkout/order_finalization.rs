use metrics::counter;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info, instrument, warn};

use crate::clients::{OrderServiceApi, OrderServiceError};
use crate::errors::{CheckoutError, FailureCause};
use crate::models::{CheckoutFormData, FinalizeOrderRequest, Order, OrderLine};

enum FinalizeState {
    InFlight,
    Done(Order),
}

type StateMap = Mutex<HashMap<String, FinalizeState>>;

/// Creates the persisted order for a payment the processor already confirmed.
///
/// Every failure here is post-payment. Nothing is retried automatically; a
/// repeat call for a reference that already produced an order returns that
/// order without posting again.
pub struct OrderFinalizationClient {
    order_service: Arc<dyn OrderServiceApi>,
    states: StateMap,
}

// Releases an in-flight claim if the finalize future is dropped or fails.
struct InFlightClaim<'a> {
    states: &'a StateMap,
    payment_reference: &'a str,
    settled: bool,
}

impl InFlightClaim<'_> {
    fn settle(mut self, order: Order) {
        lock(self.states).insert(self.payment_reference.to_string(), FinalizeState::Done(order));
        self.settled = true;
    }
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        if !self.settled {
            lock(self.states).remove(self.payment_reference);
        }
    }
}

fn lock(states: &StateMap) -> MutexGuard<'_, HashMap<String, FinalizeState>> {
    match states.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl OrderFinalizationClient {
    pub fn new(order_service: Arc<dyn OrderServiceApi>) -> Self {
        Self {
            order_service,
            states: Mutex::new(HashMap::new()),
        }
    }

    #[instrument(skip(self, form, items), fields(customer_email = %form.customer_email))]
    pub async fn finalize(
        &self,
        form: &CheckoutFormData,
        items: &[OrderLine],
        payment_reference: &str,
    ) -> Result<Order, CheckoutError> {
        let claim = {
            let mut states = lock(&self.states);
            match states.get(payment_reference) {
                Some(FinalizeState::Done(order)) => {
                    info!(
                        order_number = %order.order_number,
                        "Payment already finalized, returning existing order"
                    );
                    return Ok(order.clone());
                }
                Some(FinalizeState::InFlight) => {
                    warn!("Finalize already in flight for this payment");
                    return Err(CheckoutError::FinalizeInProgress(payment_reference.to_string()));
                }
                None => {
                    states.insert(payment_reference.to_string(), FinalizeState::InFlight);
                }
            }
            InFlightClaim {
                states: &self.states,
                payment_reference,
                settled: false,
            }
        };

        let request = FinalizeOrderRequest {
            form,
            items,
            payment_intent_id: payment_reference,
        };
        match self.order_service.finalize_order(&request).await {
            Ok(order) => {
                counter!("checkout.orders.finalized", 1);
                info!(order_number = %order.order_number, total = %order.total, "Order finalized");
                claim.settle(order.clone());
                Ok(order)
            }
            Err(err) => {
                counter!("checkout.orders.finalize_failed", 1);
                let mapped = post_payment_error(err, payment_reference);
                error!(error = %mapped, "Order finalization failed after payment");
                Err(mapped)
            }
        }
    }
}

/// Maps an order service failure that happened after the charge succeeded.
fn post_payment_error(err: OrderServiceError, payment_reference: &str) -> CheckoutError {
    let payment_reference = payment_reference.to_string();
    match err {
        OrderServiceError::Status {
            status: 400,
            message,
        } => CheckoutError::OrderRejected {
            message: message.unwrap_or_else(|| "invalid order data".to_string()),
            payment_reference,
        },
        OrderServiceError::Status { status, message } => CheckoutError::OrderSystemFailure {
            payment_reference,
            cause: FailureCause::ServerError,
            detail: message.unwrap_or_else(|| format!("status {}", status)),
        },
        OrderServiceError::Network(detail) => CheckoutError::OrderSystemFailure {
            payment_reference,
            cause: FailureCause::Network,
            detail,
        },
        OrderServiceError::Decode(detail) => CheckoutError::OrderSystemFailure {
            payment_reference,
            cause: FailureCause::UnreadableResponse,
            detail,
        },
        OrderServiceError::InvalidPath(detail) => CheckoutError::OrderSystemFailure {
            payment_reference,
            cause: FailureCause::ServerError,
            detail,
        },
    }
}
