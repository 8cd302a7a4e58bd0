//! Page routes the checkout flow moves between.

use std::sync::Mutex;
use tracing::info;
use url::Url;

use crate::errors::CheckoutError;

pub const CHECKOUT_PATH: &str = "/checkout";
pub const CONFIRMATION_PATH: &str = "/order-confirmation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Checkout,
    OrderConfirmation { order_number: String, email: String },
}

impl Route {
    pub fn confirmation(order_number: impl Into<String>, email: impl Into<String>) -> Self {
        Route::OrderConfirmation {
            order_number: order_number.into(),
            email: email.into(),
        }
    }

    /// Absolute URL of the route on the storefront at `base`.
    pub fn to_url(&self, base: &Url) -> Result<Url, CheckoutError> {
        let path = match self {
            Route::Checkout => CHECKOUT_PATH,
            Route::OrderConfirmation { .. } => CONFIRMATION_PATH,
        };
        let mut url = base
            .join(path)
            .map_err(|e| CheckoutError::InvalidRequest(format!("bad storefront url: {}", e)))?;
        if let Route::OrderConfirmation {
            order_number,
            email,
        } = self
        {
            url.query_pairs_mut()
                .append_pair("order_number", order_number)
                .append_pair("email", email);
        }
        Ok(url)
    }
}

/// Host hook for moving the shopper to another page.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator that only logs, for headless hosts such as the CLI.
#[derive(Debug, Default)]
pub struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn navigate(&self, route: Route) {
        info!(?route, "Navigating");
    }
}

/// Keeps every route it was asked to visit.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self) -> Vec<Route> {
        match self.visited.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        match self.visited.lock() {
            Ok(mut guard) => guard.push(route),
            Err(poisoned) => poisoned.into_inner().push(route),
        }
    }
}

/// Query parameters of a confirmation link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationQuery {
    pub order_number: String,
    pub email: String,
}

impl ConfirmationQuery {
    pub fn from_url(url: &Url) -> Result<Self, CheckoutError> {
        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let order_number =
            param("order_number").ok_or(CheckoutError::MissingConfirmationParams("order_number"))?;
        let email = param("email").ok_or(CheckoutError::MissingConfirmationParams("email"))?;
        Ok(Self {
            order_number,
            email,
        })
    }
}
