//! Cart held by a cashier session until it is submitted as an order.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    pub name: String,
    pub unit_price: f64,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add `quantity` of a product, merging with an existing line for it.
    pub fn add(&mut self, product_id: &str, name: &str, unit_price: f64, quantity: u32) {
        if quantity == 0 {
            return;
        }
        match self.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => line.quantity = line.quantity.saturating_add(quantity),
            None => self.lines.push(CartLine {
                product_id: product_id.to_string(),
                name: name.to_string(),
                unit_price,
                quantity,
            }),
        }
    }

    /// Set the quantity of a line; zero removes it. Returns false if absent.
    pub fn set_quantity(&mut self, product_id: &str, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(product_id);
        }
        match self.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, product_id: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn subtotal(&self) -> f64 {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Order payload for `POST /api/orders`.
    pub fn to_order_payload(&self, table_id: &str) -> Value {
        let items: Vec<Value> = self
            .lines
            .iter()
            .map(|l| {
                json!({
                    "product_id": l.product_id,
                    "name": l.name,
                    "unit_price": l.unit_price,
                    "quantity": l.quantity,
                })
            })
            .collect();
        json!({
            "table_id": table_id,
            "items": items,
            "total": self.subtotal(),
        })
    }
}
