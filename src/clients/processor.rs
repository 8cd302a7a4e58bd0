use async_trait::async_trait;

use crate::models::{ConfirmPaymentRequest, ConfirmPaymentResponse, PaymentIntent, ProcessorError};

/// The hosted payment processor as seen from the storefront.
///
/// Implementations only ever hold the publishable key. Card data stays in
/// the processor's element and is referenced through the client secret.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Confirms the payment collected for `request.client_secret`.
    ///
    /// Redirect-based methods return [`ConfirmPaymentResponse::Redirected`]
    /// and the outcome arrives later through the return URL.
    async fn confirm_payment(
        &self,
        request: ConfirmPaymentRequest,
    ) -> Result<ConfirmPaymentResponse, ProcessorError>;

    /// Reads the current state of a payment intent by its client secret.
    async fn retrieve_payment_intent(
        &self,
        client_secret: &str,
    ) -> Result<PaymentIntent, ProcessorError>;
}
