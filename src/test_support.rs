//! Scripted collaborators for unit tests.

use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::clients::{OrderServiceApi, OrderServiceError, PaymentProcessor};
use crate::models::{
    CartItem, CartSnapshot, CheckoutFormData, ConfirmPaymentRequest, ConfirmPaymentResponse,
    FinalizeOrderRequest, Order, OrderRequest, OrderStatus, PaymeOrder, PaymeStatus,
    PaymentIntent, PaymentIntentResult, PaymentIntentStatus, PaymentMethod, PaymentStatus,
    ProcessorError,
};

type Script<T> = Mutex<VecDeque<Result<T, OrderServiceError>>>;

fn next<T>(script: &Script<T>, endpoint: &str) -> Result<T, OrderServiceError> {
    script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(OrderServiceError::Network(format!("no scripted reply for {}", endpoint))))
}

#[derive(Default)]
pub struct FakeOrderService {
    intents: Script<PaymentIntentResult>,
    finalizes: Script<Order>,
    orders: Script<Order>,
    payme_statuses: Script<PaymeStatus>,
    payme_orders: Script<PaymeOrder>,
    finalize_gate: Mutex<Option<Arc<Notify>>>,
    pub intent_calls: AtomicUsize,
    pub finalize_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub lookup_calls: AtomicUsize,
    pub finalized_references: Mutex<Vec<String>>,
}

impl FakeOrderService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_intent(&self, reply: Result<PaymentIntentResult, OrderServiceError>) {
        self.intents.lock().unwrap().push_back(reply);
    }

    pub fn push_finalize(&self, reply: Result<Order, OrderServiceError>) {
        self.finalizes.lock().unwrap().push_back(reply);
    }

    pub fn push_order(&self, reply: Result<Order, OrderServiceError>) {
        self.orders.lock().unwrap().push_back(reply);
    }

    pub fn push_payme_status(&self, reply: Result<PaymeStatus, OrderServiceError>) {
        self.payme_statuses.lock().unwrap().push_back(reply);
    }

    pub fn push_payme_order(&self, reply: Result<PaymeOrder, OrderServiceError>) {
        self.payme_orders.lock().unwrap().push_back(reply);
    }

    /// Holds every finalize call until the returned handle is notified.
    pub fn gate_finalize(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.finalize_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn finalize_count(&self) -> usize {
        self.finalize_calls.load(Ordering::SeqCst)
    }

    pub fn status_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderServiceApi for FakeOrderService {
    async fn create_payment_intent(
        &self,
        _request: &OrderRequest<'_>,
    ) -> Result<PaymentIntentResult, OrderServiceError> {
        self.intent_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.intents, "create-payment-intent")
    }

    async fn finalize_order(
        &self,
        request: &FinalizeOrderRequest<'_>,
    ) -> Result<Order, OrderServiceError> {
        self.finalize_calls.fetch_add(1, Ordering::SeqCst);
        self.finalized_references
            .lock()
            .unwrap()
            .push(request.payment_intent_id.to_string());
        let gate = self.finalize_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        next(&self.finalizes, "confirm")
    }

    async fn get_order(&self, _order_number: &str, _email: &str) -> Result<Order, OrderServiceError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.orders, "orders")
    }

    async fn payme_status(&self, _order_number: &str) -> Result<PaymeStatus, OrderServiceError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.payme_statuses, "orders/payme/status")
    }

    async fn create_payme_order(
        &self,
        _request: &OrderRequest<'_>,
    ) -> Result<PaymeOrder, OrderServiceError> {
        next(&self.payme_orders, "orders/payme")
    }
}

#[derive(Default)]
pub struct ScriptedProcessor {
    confirms: Mutex<VecDeque<Result<ConfirmPaymentResponse, ProcessorError>>>,
    retrieves: Mutex<VecDeque<Result<PaymentIntent, ProcessorError>>>,
    pub confirm_requests: Mutex<Vec<ConfirmPaymentRequest>>,
    pub retrieve_calls: AtomicUsize,
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
            .unwrap_or_else(|| Err(ProcessorError::other("no scripted confirm")))
    }

    async fn retrieve_payment_intent(
        &self,
        _client_secret: &str,
    ) -> Result<PaymentIntent, ProcessorError> {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
        self.retrieves
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProcessorError::other("no scripted retrieve")))
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn form(method: PaymentMethod) -> CheckoutFormData {
    CheckoutFormData {
        customer_name: "Jane Doe".into(),
        customer_email: "jane@x.com".into(),
        customer_phone: "91234567".into(),
        delivery_address: "10 Long Street, HK".into(),
        delivery_date: today() + Duration::days(5),
        delivery_notes: None,
        payment_method: method,
    }
}

pub fn rose_item() -> CartItem {
    CartItem {
        product_id: 1,
        quantity: 2,
        unit_price: dec!(100),
        name: "Rose Bouquet".into(),
        image: None,
    }
}

pub fn cart() -> CartSnapshot {
    CartSnapshot::new(vec![rose_item()])
}

pub fn intent_result(id: &str, requires_redirect: bool) -> PaymentIntentResult {
    PaymentIntentResult {
        client_secret: format!("{}_secret_test", id),
        requires_redirect,
    }
}

pub fn payment_intent(id: &str, status: PaymentIntentStatus, amount: i64) -> PaymentIntent {
    PaymentIntent {
        id: id.to_string(),
        status,
        amount,
        currency: "hkd".into(),
    }
}

pub fn order(order_number: &str, total: Decimal) -> Order {
    Order {
        order_number: order_number.to_string(),
        status: OrderStatus::Confirmed,
        payment_status: PaymentStatus::Paid,
        subtotal: Some(total),
        delivery_fee: None,
        total,
        items: vec![],
        customer_name: Some("Jane Doe".into()),
        customer_email: Some("jane@x.com".into()),
        customer_phone: None,
        delivery_address: None,
        delivery_date: None,
        delivery_notes: None,
        payment_method_display: None,
        created_at: None,
    }
}
