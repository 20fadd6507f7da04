use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the cart as read from the page. The price stays the display
/// string the site rendered; nothing downstream does arithmetic on it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub name: String,
    pub price: String,
    pub quantity: u32,
}

impl CartItem {
    pub fn new(name: impl Into<String>, price: impl Into<String>, quantity: u32) -> Self {
        Self {
            name: name.into(),
            price: price.into(),
            quantity,
        }
    }
}

/// Snapshot of the cart page at one observation. Never mutated in place:
/// after a cart-changing action the whole thing is rebuilt from a fresh
/// page read, and the old snapshot is thrown away.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CartState {
    pub items: Vec<CartItem>,
    pub observed_at: DateTime<Utc>,
}

impl CartState {
    pub fn new(items: Vec<CartItem>) -> Self {
        Self {
            items,
            observed_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total units across all rows; the number add-to-cart verification
    /// compares before and after.
    pub fn total_units(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn contains_named(&self, name: &str) -> bool {
        let needle = name.to_lowercase();
        self.items
            .iter()
            .any(|item| item.name.to_lowercase().contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_units_sums_quantities() {
        let cart = CartState::new(vec![
            CartItem::new("earphones", "₹1,299", 2),
            CartItem::new("charger", "₹499", 1),
        ]);
        assert_eq!(cart.total_units(), 3);
        assert_eq!(cart.len(), 2);
    }

    #[test]
    fn contains_named_is_case_insensitive() {
        let cart = CartState::new(vec![CartItem::new("Wireless Earphones", "₹1,299", 1)]);
        assert!(cart.contains_named("wireless earphones"));
        assert!(!cart.contains_named("toaster"));
    }
}
