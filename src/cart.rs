//! Shopper cart shared by the storefront and the checkout flow.
//!
//! Checkout only reads the cart and clears it once an order is confirmed;
//! the catalog pages own every other mutation.

use rust_decimal::Decimal;
use std::sync::RwLock;
use tracing::debug;

use crate::models::{CartItem, CartSnapshot};

/// Cart interface the storefront exposes from its root context.
pub trait CartStore: Send + Sync {
    fn items(&self) -> Vec<CartItem>;

    fn total_price(&self) -> Decimal {
        self.snapshot().total()
    }

    /// Adds `item`, merging quantities when the product is already present.
    fn add_item(&self, item: CartItem);

    fn remove_item(&self, product_id: u64);

    /// Sets the quantity for a product; zero removes the line.
    fn update_quantity(&self, product_id: u64, quantity: u32);

    fn clear(&self);

    fn snapshot(&self) -> CartSnapshot {
        CartSnapshot::new(self.items())
    }
}

/// Process-local cart.
#[derive(Debug, Default)]
pub struct InMemoryCartStore {
    items: RwLock<Vec<CartItem>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<CartItem>) -> Self {
        let store = Self::new();
        for item in items {
            store.add_item(item);
        }
        store
    }
}

impl CartStore for InMemoryCartStore {
    fn items(&self) -> Vec<CartItem> {
        match self.items.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn add_item(&self, item: CartItem) {
        if item.quantity == 0 {
            return;
        }
        let mut items = match self.items.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match items.iter_mut().find(|existing| existing.product_id == item.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => items.push(item),
        }
    }

    fn remove_item(&self, product_id: u64) {
        let mut items = match self.items.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        items.retain(|item| item.product_id != product_id);
    }

    fn update_quantity(&self, product_id: u64, quantity: u32) {
        let mut items = match self.items.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if quantity == 0 {
            items.retain(|item| item.product_id != product_id);
        } else if let Some(item) = items.iter_mut().find(|item| item.product_id == product_id) {
            item.quantity = quantity;
        }
    }

    fn clear(&self) {
        let mut items = match self.items.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        debug!(lines = items.len(), "Clearing cart");
        items.clear();
    }
}
