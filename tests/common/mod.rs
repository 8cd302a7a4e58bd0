#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use storefront_checkout::clients::{HttpOrderService, PaymentProcessor};
use storefront_checkout::models::{
    CartItem, CheckoutFormData, ConfirmPaymentRequest, ConfirmPaymentResponse, PaymentIntent,
    PaymentIntentStatus, PaymentMethod, ProcessorError,
};
use storefront_checkout::navigation::RecordingNavigator;
use storefront_checkout::{
    CartStore, CheckoutFlow, CheckoutSettings, InMemoryCartStore, MemoryTransientStore,
    PendingOrderStore, TransientStore,
};
use url::Url;
use wiremock::MockServer;

pub const STOREFRONT: &str = "https://flowers.example";

/// Payment processor double driven by queued replies.
#[derive(Default)]
pub struct ScriptedProcessor {
    confirms: Mutex<VecDeque<Result<ConfirmPaymentResponse, ProcessorError>>>,
    retrieves: Mutex<VecDeque<Result<PaymentIntent, ProcessorError>>>,
    pub confirm_requests: Mutex<Vec<ConfirmPaymentRequest>>,
}

impl ScriptedProcessor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_confirm(&self, reply: Result<ConfirmPaymentResponse, ProcessorError>) {
        self.confirms.lock().unwrap().push_back(reply);
    }

    pub fn push_retrieve(&self, reply: Result<PaymentIntent, ProcessorError>) {
        self.retrieves.lock().unwrap().push_back(reply);
    }

    pub fn confirm_count(&self) -> usize {
        self.confirm_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentProcessor for ScriptedProcessor {
    async fn confirm_payment(
        &self,
        request: ConfirmPaymentRequest,
    ) -> Result<ConfirmPaymentResponse, ProcessorError> {
        self.confirm_requests.lock().unwrap().push(request);
        self.confirms
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProcessorError::other("no scripted confirmation")))
    }

    async fn retrieve_payment_intent(
        &self,
        _client_secret: &str,
    ) -> Result<PaymentIntent, ProcessorError> {
        self.retrieves
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProcessorError::other("no scripted retrieve")))
    }
}

/// One storefront session wired to a wiremock order service.
pub struct TestCheckout {
    pub server: MockServer,
    pub flow: CheckoutFlow,
    pub cart: Arc<InMemoryCartStore>,
    pub navigator: Arc<RecordingNavigator>,
    pub processor: Arc<ScriptedProcessor>,
    pub store: Arc<dyn TransientStore>,
}

impl TestCheckout {
    pub async fn start() -> Self {
        Self::start_with_store(Arc::new(MemoryTransientStore::new())).await
    }

    pub async fn start_with_store(store: Arc<dyn TransientStore>) -> Self {
        let server = MockServer::start().await;
        Self::on_server(server, store, settings())
    }

    /// Another session against the same order service, as after a page reload.
    pub fn on_server(
        server: MockServer,
        store: Arc<dyn TransientStore>,
        settings: CheckoutSettings,
    ) -> Self {
        let order_service = Arc::new(
            HttpOrderService::new(api_base(&server), Duration::from_secs(5))
                .expect("http client"),
        );
        let cart = Arc::new(InMemoryCartStore::with_items(vec![rose_bouquet()]));
        let navigator = Arc::new(RecordingNavigator::new());
        let processor = ScriptedProcessor::new();
        let cart_store: Arc<dyn CartStore> = cart.clone();

        let flow = CheckoutFlow::new(
            settings,
            order_service,
            processor.clone(),
            cart_store,
            PendingOrderStore::new(store.clone()),
            navigator.clone(),
        );

        Self {
            server,
            flow,
            cart,
            navigator,
            processor,
            store,
        }
    }

    /// Lets zero-delay completion tasks run.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

pub fn api_base(server: &MockServer) -> String {
    format!("{}/api", server.uri())
}

pub fn settings() -> CheckoutSettings {
    let storefront = Url::parse(STOREFRONT).unwrap();
    let return_url = storefront.join("/checkout/return").unwrap();
    let mut settings = CheckoutSettings::new(storefront, return_url).without_delays();
    settings.payme_poll_interval = Duration::from_millis(50);
    settings
}

pub fn rose_bouquet() -> CartItem {
    CartItem {
        product_id: 7,
        quantity: 2,
        unit_price: Decimal::new(10000, 2),
        name: "Rose Bouquet".into(),
        image: None,
    }
}

pub fn checkout_form(method: PaymentMethod) -> CheckoutFormData {
    CheckoutFormData {
        customer_name: "Jane Doe".into(),
        customer_email: "jane@x.com".into(),
        customer_phone: "+852 9123 4567".into(),
        delivery_address: "10 Long Street, Central, Hong Kong".into(),
        delivery_date: Local::now().date_naive() + ChronoDuration::days(7),
        delivery_notes: Some("Leave with the concierge".into()),
        payment_method: method,
    }
}

pub fn intent_json(payment_intent_id: &str, requires_redirect: bool) -> Value {
    json!({
        "clientSecret": format!("{}_secret_live", payment_intent_id),
        "requiresRedirect": requires_redirect,
    })
}

pub fn order_json(order_number: &str, total: &str) -> Value {
    json!({
        "orderNumber": order_number,
        "status": "confirmed",
        "paymentStatus": "paid",
        "total": total,
        "customerEmail": "jane@x.com",
        "items": [
            {"productId": 7, "name": "Rose Bouquet", "quantity": 2, "unitPrice": "100.00", "total": total}
        ]
    })
}

pub fn paid_intent(id: &str, status: PaymentIntentStatus, amount_minor: i64) -> PaymentIntent {
    PaymentIntent {
        id: id.to_string(),
        status,
        amount: amount_minor,
        currency: "hkd".into(),
    }
}
