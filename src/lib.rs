//! Storefront Checkout Library
//!
//! This crate provides the checkout core of the flower storefront: payment
//! intent creation, multi-method payment confirmation, order finalization,
//! redirect-return reconciliation and PayMe status polling.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod cart;
pub mod clients;
pub mod config;
pub mod errors;
pub mod models;
pub mod navigation;
pub mod services;
pub mod storage;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

pub use cart::{CartStore, InMemoryCartStore};
pub use errors::{CheckoutError, FieldError, Severity};
pub use navigation::{LoggingNavigator, Navigator, Route};
pub use services::checkout::{
    CheckoutFlow, CheckoutResult, CheckoutSettings, PollerHandle, PollerState, ReconcileOutcome,
};
pub use services::order_lookup::OrderLookupService;
pub use storage::{FileTransientStore, MemoryTransientStore, PendingOrderStore, TransientStore};

use crate::clients::{HttpOrderService, OrderServiceApi, PaymentProcessor, StripeRestProcessor};
use crate::config::{AppConfigError, CheckoutConfig};

/// Failure wiring the checkout components together from configuration.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Config(#[from] AppConfigError),

    #[error("order service client: {0}")]
    OrderService(#[from] clients::OrderServiceError),

    #[error("payment processor client: {0}")]
    Processor(#[from] models::ProcessorError),
}

/// Shared handles for one storefront session.
#[derive(Clone)]
pub struct CheckoutContext {
    pub config: CheckoutConfig,
    pub order_service: Arc<dyn OrderServiceApi>,
    pub processor: Arc<dyn PaymentProcessor>,
    pub cart: Arc<dyn CartStore>,
    pub pending: PendingOrderStore,
    pub navigator: Arc<dyn Navigator>,
    pub flow: CheckoutFlow,
}

impl CheckoutContext {
    /// Wires the HTTP order service, the REST processor and the file-backed
    /// transient store described by `config`.
    pub fn from_config(
        config: CheckoutConfig,
        cart: Arc<dyn CartStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ContextError> {
        let order_service: Arc<dyn OrderServiceApi> = Arc::new(HttpOrderService::new(
            config.order_service_url.clone(),
            config.http_timeout(),
        )?);
        let processor: Arc<dyn PaymentProcessor> = Arc::new(StripeRestProcessor::new(
            config.processor_publishable_key.clone(),
            config.processor_api_url.clone(),
            config.http_timeout(),
        )?);
        let store: Arc<dyn TransientStore> =
            Arc::new(FileTransientStore::new(config.transient_store_dir.clone()));

        Self::with_parts(config, order_service, processor, store, cart, navigator)
    }

    /// Same wiring with caller-supplied clients and storage.
    pub fn with_parts(
        config: CheckoutConfig,
        order_service: Arc<dyn OrderServiceApi>,
        processor: Arc<dyn PaymentProcessor>,
        store: Arc<dyn TransientStore>,
        cart: Arc<dyn CartStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ContextError> {
        let settings = config.checkout_settings()?;
        let pending = PendingOrderStore::new(store);
        let flow = CheckoutFlow::new(
            settings,
            order_service.clone(),
            processor.clone(),
            cart.clone(),
            pending.clone(),
            navigator.clone(),
        );

        Ok(Self {
            config,
            order_service,
            processor,
            cart,
            pending,
            navigator,
            flow,
        })
    }

    pub fn order_lookup(&self) -> OrderLookupService {
        OrderLookupService::new(self.order_service.clone())
    }
}
