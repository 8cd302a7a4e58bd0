// Outbound clients: the order backend and the payment processor
pub mod order_service;
pub mod processor;
pub mod stripe;

pub use order_service::{HttpOrderService, OrderServiceApi, OrderServiceError};
pub use processor::PaymentProcessor;
pub use stripe::StripeRestProcessor;
