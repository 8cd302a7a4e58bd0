// Checkout models
pub mod cart;
pub mod checkout_form;
pub mod order;
pub mod payment;
pub mod payment_method;
pub mod pending_order;

pub use cart::{CartItem, CartSnapshot};
pub use checkout_form::{CheckoutFormData, DeliveryWindow};
pub use order::{Order, OrderItem, OrderStatus, PaymeOrder, PaymeStatus, PaymentStatus};
pub use payment::{
    ConfirmPaymentRequest, ConfirmPaymentResponse, PaymentConfirmationOutcome, PaymentFailure,
    PaymentIntent, PaymentIntentResult, PaymentIntentStatus, ProcessorError, ProcessorErrorType,
    RedirectBehavior,
};
pub use payment_method::{PaymentMethod, PaymentMethodDescriptor};
pub use pending_order::{
    FinalizeOrderRequest, FinalizedOrder, OrderLine, OrderRequest, PendingOrderPayload,
};
