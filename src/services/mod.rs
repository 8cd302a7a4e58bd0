// Checkout orchestration
pub mod checkout;

// Confirmation page lookup
pub mod order_lookup;

pub use checkout::{CheckoutFlow, CheckoutResult, CheckoutSettings};
pub use order_lookup::OrderLookupService;
