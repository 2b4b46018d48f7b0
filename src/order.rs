//! Order documents
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;
use crate::types::{Ref, TimeStamp};

/// Fulfilment state. The set is closed; cancellation is a soft-delete, not a status.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    #[n(0)]
    #[default]
    Pending,
    #[n(1)]
    Confirmed,
    #[n(2)]
    Shipped,
    #[n(3)]
    Delivered,
}

/// Whether a document is live or soft-deleted.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    #[n(0)]
    #[default]
    Active,
    #[n(1)]
    Destroyed,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    #[n(0)]
    pub product: Ref,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub size: String,
    #[n(3)]
    pub quantity: u32,
    #[n(4)]
    pub unit_price: u64, // minor currency units
    #[n(5)]
    pub line_total: u64,
}

/// Mutable contact and delivery fields.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingDetails {
    #[n(0)]
    pub city: String,
    #[n(1)]
    pub country: String,
    #[n(2)]
    pub email: String,
    #[n(3)]
    pub first_name: String,
    #[n(4)]
    pub last_name: String,
    #[n(5)]
    pub phone_number: String,
    #[n(6)]
    pub payment_method: String,
    #[n(7)]
    pub street_address: String,
    #[n(8)]
    pub note: Option<String>,
    #[n(9)]
    pub coupon: Option<String>,
}

/// A placed order.
///
/// `customer`, `line_items`, `total_price` and `created_at` are written once at checkout.
/// Nothing in this crate rewrites them afterwards.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Order {
    #[n(0)]
    pub id: Ref,
    #[n(1)]
    pub customer: Ref,
    #[n(2)]
    pub line_items: Vec<LineItem>,
    #[n(3)]
    pub total_price: u64,
    #[n(4)]
    pub shipping: ShippingDetails,
    #[n(5)]
    pub status: OrderStatus,
    #[n(6)]
    pub is_paid: bool,
    #[n(7)]
    pub lifecycle: Lifecycle,
    #[n(8)]
    pub created_at: TimeStamp,
}

/// Customer fields joined onto an order for admin views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerSummary {
    pub display_name: String,
    pub email: String,
}

/// An order plus its customer, when that customer still exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDetail {
    pub order: Order,
    pub customer: Option<CustomerSummary>,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                EngineError::invalid(
                    "status",
                    format!("{s:?} is not one of pending, confirmed, shipped, delivered"),
                )
            })
    }
}

impl Lifecycle {
    pub fn is_destroyed(&self) -> bool {
        matches!(self, Lifecycle::Destroyed)
    }
}

impl Order {
    pub fn is_destroyed(&self) -> bool {
        self.lifecycle.is_destroyed()
    }

    pub fn contains_product(&self, product: &Ref) -> bool {
        self.line_items.iter().any(|item| item.product == *product)
    }

    /// A live, delivered order placed by `customer` that includes `product`.
    pub fn proves_purchase_of(&self, customer: &Ref, product: &Ref) -> bool {
        !self.is_destroyed()
            && self.customer == *customer
            && self.status == OrderStatus::Delivered
            && self.contains_product(product)
    }

    /// Sum of the line totals as recorded at checkout.
    pub fn line_items_total(&self) -> u64 {
        saturating_total(self.line_items.iter().map(|item| item.line_total))
    }
}

/// Money sum that pins at `u64::MAX` instead of wrapping.
pub(crate) fn saturating_total(amounts: impl IntoIterator<Item = u64>) -> u64 {
    amounts.into_iter().fold(0, u64::saturating_add)
}

impl AsRef<Order> for Order {
    fn as_ref(&self) -> &Order {
        self
    }
}

impl AsRef<Order> for OrderDetail {
    fn as_ref(&self) -> &Order {
        &self.order
    }
}
