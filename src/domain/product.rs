use bigdecimal::BigDecimal;
use uuid::Uuid;

/// The authoritative view of a listing, as read through the privileged repository.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: BigDecimal,
    pub is_available: bool,
    pub seller_id: Uuid,
}

impl Product {
    /// Server-side total for `quantity` units. The only source of an order's total.
    pub fn total_for(&self, quantity: u32) -> BigDecimal {
        &self.price * BigDecimal::from(quantity)
    }
}
