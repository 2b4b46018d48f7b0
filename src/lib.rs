//! Order lifecycle and review eligibility for a storefront backend.
//!
//! Orders are validated at checkout, moved through `Pending -> Confirmed -> Shipped -> Delivered`
//! by staff, and soft-deleted rather than removed. A customer may review a product once, and
//! only after an order containing it has been delivered to them.

pub mod catalog;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod order;
pub mod orders;
pub mod reporting;
pub mod review;
pub mod store;
pub mod types;
pub mod validation;

pub use catalog::{FileStorage, LocalFileStorage, Product, ProductCollection, ProductProvider};
pub use catalog::{User, UserCollection, UserProvider};
pub use config::{Config, DashboardConfig, StoreConfig};
pub use error::{EngineError, FieldError, FieldErrors, Result};
pub use order::{Lifecycle, LineItem, Order, OrderDetail, OrderStatus, ShippingDetails};
pub use orders::{OrderStore, UpdateOutcome};
pub use reporting::{Dashboard, ReportingAggregator};
pub use review::{Review, ReviewGate};
pub use store::Store;
pub use types::{Ref, TimeStamp};
pub use validation::{OrderDraft, OrderPatch, UserDraft};
