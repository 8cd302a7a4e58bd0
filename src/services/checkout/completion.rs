use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cart::CartStore;
use crate::navigation::{Navigator, Route};

/// Final step shared by the inline, redirect and PayMe paths: clear the cart
/// and move to the confirmation page, once per order.
pub struct CheckoutCompletion {
    cart: Arc<dyn CartStore>,
    navigator: Arc<dyn Navigator>,
    completed: Mutex<HashSet<String>>,
}

impl CheckoutCompletion {
    pub fn new(cart: Arc<dyn CartStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            cart,
            navigator,
            completed: Mutex::new(HashSet::new()),
        }
    }

    /// Clears the cart now and navigates after `delay`.
    ///
    /// Returns the navigation task the first time an order is completed and
    /// `None` for every repeat, which has no observable effect.
    pub fn complete(&self, order_number: &str, email: &str, delay: Duration) -> Option<JoinHandle<()>> {
        let first = {
            let mut completed = match self.completed.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            completed.insert(order_number.to_string())
        };
        if !first {
            debug!(order_number, "Order already completed, ignoring");
            return None;
        }

        self.cart.clear();
        info!(order_number, delay_ms = delay.as_millis() as u64, "Order confirmed, cart cleared");

        let navigator = self.navigator.clone();
        let route = Route::confirmation(order_number, email);
        Some(tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            navigator.navigate(route);
        }))
    }

    pub fn is_completed(&self, order_number: &str) -> bool {
        match self.completed.lock() {
            Ok(guard) => guard.contains(order_number),
            Err(poisoned) => poisoned.into_inner().contains(order_number),
        }
    }
}
