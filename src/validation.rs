//! Input checking and normalisation before anything reaches the store.
//!
//! Order drafts are assembled with a builder and checked in one pass that reports every bad
//! field. Admin order edits arrive as loose records and are mapped onto an allow-list.
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{EngineError, FieldErrors, Result};
use crate::order::{LineItem, Order, OrderStatus, ShippingDetails, saturating_total};
use crate::types::Ref;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;
pub const DEFAULT_RATING: u8 = 5;

/// One line of an order draft, still carrying the raw product id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineItemDraft {
    pub product: String,
    pub name: String,
    pub size: String,
    pub quantity: u32,
    pub unit_price: u64,
    pub line_total: u64,
}

/// Checkout input, assembled field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderDraft {
    customer: Option<String>,
    line_items: Vec<LineItemDraft>,
    total_price: Option<u64>,
    city: Option<String>,
    country: Option<String>,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    phone_number: Option<String>,
    payment_method: Option<String>,
    street_address: Option<String>,
    note: Option<String>,
    coupon: Option<String>,
}

/// A draft that passed validation. Identity and timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub customer: Ref,
    pub line_items: Vec<LineItem>,
    pub total_price: u64,
    pub shipping: ShippingDetails,
}

/// The fields an order edit may touch. Anything else in the incoming record is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPatch {
    pub city: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub payment_method: Option<String>,
    pub street_address: Option<String>,
    pub note: Option<String>,
    pub coupon: Option<String>,
    pub status: Option<OrderStatus>,
    pub is_paid: Option<bool>,
}

/// A review body after trimming and rating normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewContent {
    pub rating: u8,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDraft {
    pub email: String,
    pub display_name: String,
}

// Keys that echo write-once order fields. Admin forms resubmit them; they are ignored.
const READ_ONLY_ORDER_KEYS: [&str; 10] = [
    "_id",
    "id",
    "userId",
    "customerRef",
    "createAt",
    "createdAt",
    "listProduct",
    "lineItems",
    "totalPriceOrder",
    "totalPrice",
];

impl OrderDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_customer(mut self, customer: &str) -> Self {
        self.customer = Some(customer.to_string());
        self
    }
    pub fn add_line_item(mut self, item: LineItemDraft) -> Self {
        self.line_items.push(item);
        self
    }
    pub fn set_total_price(mut self, total: u64) -> Self {
        self.total_price = Some(total);
        self
    }
    pub fn set_city(mut self, city: &str) -> Self {
        self.city = Some(city.to_string());
        self
    }
    pub fn set_country(mut self, country: &str) -> Self {
        self.country = Some(country.to_string());
        self
    }
    pub fn set_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }
    pub fn set_first_name(mut self, name: &str) -> Self {
        self.first_name = Some(name.to_string());
        self
    }
    pub fn set_last_name(mut self, name: &str) -> Self {
        self.last_name = Some(name.to_string());
        self
    }
    pub fn set_phone_number(mut self, phone: &str) -> Self {
        self.phone_number = Some(phone.to_string());
        self
    }
    pub fn set_payment_method(mut self, method: &str) -> Self {
        self.payment_method = Some(method.to_string());
        self
    }
    pub fn set_street_address(mut self, address: &str) -> Self {
        self.street_address = Some(address.to_string());
        self
    }
    pub fn set_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }
    pub fn set_coupon(mut self, coupon: &str) -> Self {
        self.coupon = Some(coupon.to_string());
        self
    }

    /// Sum of the draft's line totals. Callers use this to fill a consistent total price.
    pub fn line_items_total(&self) -> u64 {
        saturating_total(self.line_items.iter().map(|item| item.line_total))
    }

    /// Checks every field and returns the normalised order, or all field errors at once.
    pub fn validate_and_finalise(&self) -> Result<NewOrder> {
        let mut errors = FieldErrors::default();

        let customer = match self.customer.as_deref() {
            None => {
                errors.push("userId", "is required");
                None
            }
            Some(raw) => match Ref::parse(raw) {
                Ok(customer) => Some(customer),
                Err(_) => {
                    errors.push("userId", "is not a valid identifier");
                    None
                }
            },
        };

        if self.line_items.is_empty() {
            errors.push("listProduct", "must contain at least one item");
        }
        let mut line_items = Vec::with_capacity(self.line_items.len());
        for (i, item) in self.line_items.iter().enumerate() {
            if let Some(item) = validate_line_item(i, item, &mut errors) {
                line_items.push(item);
            }
        }

        let line_sum = self
            .line_items
            .iter()
            .try_fold(0u64, |sum, item| sum.checked_add(item.line_total));
        if line_sum.is_none() {
            errors.push("listProduct", "line totals add up to more than can be stored");
        }

        if self.total_price.is_none() {
            errors.push("totalPriceOrder", "is required");
        }

        let shipping = ShippingDetails {
            city: required_text("city", self.city.as_deref(), &mut errors),
            country: required_text("country", self.country.as_deref(), &mut errors),
            email: required_email("email", self.email.as_deref(), &mut errors),
            first_name: required_text("firstName", self.first_name.as_deref(), &mut errors),
            last_name: required_text("lastName", self.last_name.as_deref(), &mut errors),
            phone_number: required_text("phoneNumber", self.phone_number.as_deref(), &mut errors),
            payment_method: required_text(
                "paymentMethod",
                self.payment_method.as_deref(),
                &mut errors,
            ),
            street_address: required_text(
                "streetAddress",
                self.street_address.as_deref(),
                &mut errors,
            ),
            note: self.note.as_deref().map(|s| s.trim().to_string()),
            coupon: self.coupon.as_deref().map(|s| s.trim().to_string()),
        };

        errors.into_result()?;

        match (customer, self.total_price) {
            (Some(customer), Some(total_price)) => Ok(NewOrder {
                customer,
                line_items,
                total_price,
                shipping,
            }),
            // both were recorded as field errors above
            _ => Err(EngineError::invalid("order", "incomplete draft")),
        }
    }
}

fn validate_line_item(
    index: usize,
    item: &LineItemDraft,
    errors: &mut FieldErrors,
) -> Option<LineItem> {
    let field = |name: &str| format!("listProduct[{index}].{name}");
    let before = errors.0.len();

    let product = Ref::parse(&item.product)
        .map_err(|_| errors.push(field("productId"), "is not a valid identifier"))
        .ok();
    let name = required_text(&field("name"), Some(item.name.as_str()), errors);
    let size = required_text(&field("size"), Some(item.size.as_str()), errors);
    if item.quantity < 1 {
        errors.push(field("quantity"), "must be at least 1");
    }

    if errors.0.len() != before {
        return None;
    }
    Some(LineItem {
        product: product?,
        name,
        size,
        quantity: item.quantity,
        unit_price: item.unit_price,
        line_total: item.line_total,
    })
}

fn required_text(field: &str, value: Option<&str>, errors: &mut FieldErrors) -> String {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => {
            errors.push(field, "is required");
            String::new()
        }
    }
}

fn required_email(field: &str, value: Option<&str>, errors: &mut FieldErrors) -> String {
    let email = required_text(field, value, errors);
    if !email.is_empty() && !is_email(&email) {
        errors.push(field, "is not a valid email address");
    }
    email
}

/// Loose shape check: one `@`, a non-empty local part, and a dotted domain with no empty label.
pub fn is_email(candidate: &str) -> bool {
    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !candidate.contains(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

impl OrderPatch {
    /// Map a raw admin record onto the allow-list.
    ///
    /// Read-only echoes and unknown keys are dropped without error. A known key with a value
    /// of the wrong shape is a validation error.
    pub fn from_raw(raw: &Map<String, Value>) -> Result<Self> {
        let mut patch = OrderPatch::default();
        let mut errors = FieldErrors::default();

        for (key, value) in raw {
            match key.as_str() {
                "city" => patch.city = patch_text(key, value, true, &mut errors),
                "country" => patch.country = patch_text(key, value, true, &mut errors),
                "email" => {
                    patch.email = patch_text(key, value, true, &mut errors);
                    if let Some(email) = &patch.email {
                        if !is_email(email) {
                            errors.push(key.as_str(), "is not a valid email address");
                        }
                    }
                }
                "firstName" => patch.first_name = patch_text(key, value, true, &mut errors),
                "lastName" => patch.last_name = patch_text(key, value, true, &mut errors),
                "phoneNumber" => patch.phone_number = patch_text(key, value, true, &mut errors),
                "paymentMethod" => {
                    patch.payment_method = patch_text(key, value, true, &mut errors)
                }
                "streetAddress" => {
                    patch.street_address = patch_text(key, value, true, &mut errors)
                }
                "note" => patch.note = patch_text(key, value, false, &mut errors),
                "coupon" => patch.coupon = patch_text(key, value, false, &mut errors),
                "status" => match value.as_str().map(str::parse::<OrderStatus>) {
                    Some(Ok(status)) => patch.status = Some(status),
                    _ => errors.push(
                        "status",
                        "must be one of pending, confirmed, shipped, delivered",
                    ),
                },
                "isPaid" | "isPayment" => match flag(value) {
                    Some(paid) => patch.is_paid = Some(paid),
                    None => errors.push(key.as_str(), "must be a boolean"),
                },
                other if READ_ONLY_ORDER_KEYS.contains(&other) => {
                    debug!(key = other, "Dropping read-only field from order patch");
                }
                other => {
                    debug!(key = other, "Dropping unknown field from order patch");
                }
            }
        }

        errors.into_result()?;
        Ok(patch)
    }

    pub fn is_empty(&self) -> bool {
        *self == OrderPatch::default()
    }

    /// Write the patch onto `order`. Returns whether anything changed.
    pub(crate) fn apply(&self, order: &mut Order) -> bool {
        let before = (order.shipping.clone(), order.status, order.is_paid);
        let shipping = &mut order.shipping;

        let texts = [
            (&self.city, &mut shipping.city),
            (&self.country, &mut shipping.country),
            (&self.email, &mut shipping.email),
            (&self.first_name, &mut shipping.first_name),
            (&self.last_name, &mut shipping.last_name),
            (&self.phone_number, &mut shipping.phone_number),
            (&self.payment_method, &mut shipping.payment_method),
            (&self.street_address, &mut shipping.street_address),
        ];
        for (value, slot) in texts {
            if let Some(value) = value {
                slot.clone_from(value);
            }
        }
        if let Some(note) = &self.note {
            shipping.note = Some(note.clone());
        }
        if let Some(coupon) = &self.coupon {
            shipping.coupon = Some(coupon.clone());
        }
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(paid) = self.is_paid {
            order.is_paid = paid;
        }

        before != (order.shipping.clone(), order.status, order.is_paid)
    }
}

fn patch_text(
    key: &str,
    value: &Value,
    required: bool,
    errors: &mut FieldErrors,
) -> Option<String> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            if required && text.is_empty() {
                errors.push(key, "must not be empty");
                return None;
            }
            Some(text.to_string())
        }
        Value::Null if !required => Some(String::new()),
        _ => {
            errors.push(key, "must be text");
            None
        }
    }
}

// Form submissions carry booleans as strings.
fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim() {
            "true" | "on" | "1" => Some(true),
            "false" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Normalise a review body: text must survive trimming, rating defaults then clamps into range.
pub fn validate_review(rating: Option<i64>, text: &str) -> Result<ReviewContent> {
    let text = text.trim();
    if text.is_empty() {
        return Err(EngineError::invalid("comment", "is required"));
    }

    let rating = match rating {
        None => DEFAULT_RATING,
        Some(r) => r.clamp(i64::from(MIN_RATING), i64::from(MAX_RATING)) as u8,
    };

    Ok(ReviewContent {
        rating,
        text: text.to_string(),
    })
}

impl UserDraft {
    pub fn new(email: &str, display_name: &str) -> Self {
        Self {
            email: email.to_string(),
            display_name: display_name.to_string(),
        }
    }

    /// Trimmed display name and lowercased email, or the field errors.
    pub fn validate(&self) -> Result<UserDraft> {
        let mut errors = FieldErrors::default();
        let email = required_email("email", Some(self.email.as_str()), &mut errors).to_lowercase();
        let display_name = required_text("username", Some(self.display_name.as_str()), &mut errors);
        errors.into_result()?;

        Ok(UserDraft {
            email,
            display_name,
        })
    }
}
