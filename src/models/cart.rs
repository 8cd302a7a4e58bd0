use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::pending_order::OrderLine;

/// A line in the shopper's cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: u64,
    /// Always at least 1; the cart store drops lines that reach zero.
    pub quantity: u32,
    pub unit_price: Decimal,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Immutable view of the cart taken for one checkout attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartSnapshot {
    items: Vec<CartItem>,
    total: Decimal,
}

impl CartSnapshot {
    pub fn new(items: Vec<CartItem>) -> Self {
        let total = items.iter().map(CartItem::line_total).sum::<Decimal>().round_dp(2);
        Self { items, total }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Total in major units, computed from the lines and nothing else.
    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// The `{productId, quantity}` pairs sent to the order service.
    pub fn order_lines(&self) -> Vec<OrderLine> {
        self.items
            .iter()
            .map(|item| OrderLine {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect()
    }
}
