//! Order store: checkout persistence, lifecycle updates, soft-delete and joined admin views.
use std::cmp::Reverse;
use std::sync::Arc;

use sled::Transactional;
use tracing::{debug, info, warn};

use crate::catalog::UserProvider;
use crate::cleanup::{self, BulkOutcome};
use crate::error::{EngineError, Result};
use crate::order::{Lifecycle, Order, OrderDetail, OrderStatus};
use crate::store::{self, Store};
use crate::types::{REF_LEN, Ref, TimeStamp};
use crate::validation::{OrderDraft, OrderPatch};

/// Result of a field update: whether the order existed and whether any value changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: bool,
    pub modified: bool,
}

#[derive(Debug, Clone)]
pub struct OrderStore {
    store: Arc<Store>,
}

impl OrderStore {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Validate a checkout draft and persist it as a new pending, unpaid order.
    #[tracing::instrument(skip(self, draft))]
    pub fn create(&self, draft: &OrderDraft) -> Result<Order> {
        let valid = draft.validate_and_finalise()?;

        let order = Order {
            id: Ref::generate(),
            customer: valid.customer,
            line_items: valid.line_items,
            total_price: valid.total_price,
            shipping: valid.shipping,
            status: OrderStatus::Pending,
            is_paid: false,
            lifecycle: Lifecycle::Active,
            created_at: TimeStamp::new(),
        };
        let encoded = store::encode(&order)?;
        let index_key = order.customer.join(&order.id);

        (&self.store.orders, &self.store.orders_by_customer).transaction(|(orders, by_customer)| {
            orders.insert(&order.id.as_bytes()[..], encoded.clone())?;
            by_customer.insert(&index_key[..], Vec::<u8>::new())?;
            Ok::<_, sled::transaction::ConflictableTransactionError<EngineError>>(())
        })?;

        info!(
            order_id = %order.id,
            customer = %order.customer,
            items = order.line_items.len(),
            total = order.total_price,
            "Order created"
        );
        Ok(order)
    }

    /// The order under `id`, soft-deleted or not.
    pub fn get_by_id(&self, id: &Ref) -> Result<Option<Order>> {
        store::get_doc(&self.store.orders, id)
    }

    /// Live orders placed by `customer`, newest first.
    pub fn list_for_customer(&self, customer: &Ref) -> Result<Vec<Order>> {
        let mut orders = Vec::new();
        for order_id in self.customer_order_ids(customer)? {
            match self.get_by_id(&order_id)? {
                Some(order) if !order.is_destroyed() => orders.push(order),
                Some(_) => {}
                None => warn!(order_id = %order_id, "Customer index points at a missing order"),
            }
        }

        newest_first(&mut orders);
        Ok(orders)
    }

    /// Every live order, newest first.
    pub fn snapshot(&self) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = store::scan_docs(&self.store.orders)?;
        orders.retain(|order| !order.is_destroyed());

        newest_first(&mut orders);
        Ok(orders)
    }

    /// Every live order, newest first, with its customer joined when that user still exists.
    pub fn list_all(&self, users: &dyn UserProvider) -> Result<Vec<OrderDetail>> {
        self.snapshot()?
            .into_iter()
            .map(|order| join_customer(order, users))
            .collect()
    }

    /// One order with its customer joined, soft-deleted or not.
    pub fn get_admin_detail(
        &self,
        id: &Ref,
        users: &dyn UserProvider,
    ) -> Result<Option<OrderDetail>> {
        self.get_by_id(id)?
            .map(|order| join_customer(order, users))
            .transpose()
    }

    /// Whether `customer` has a live, delivered order containing `product`.
    pub fn has_delivered_purchase(&self, customer: &Ref, product: &Ref) -> Result<bool> {
        Ok(!self.delivered_purchases(customer, product)?.is_empty())
    }

    /// Ids of the live, delivered orders of `customer` that contain `product`.
    pub(crate) fn delivered_purchases(&self, customer: &Ref, product: &Ref) -> Result<Vec<Ref>> {
        let mut proofs = Vec::new();
        for order_id in self.customer_order_ids(customer)? {
            if let Some(order) = self.get_by_id(&order_id)? {
                if order.proves_purchase_of(customer, product) {
                    proofs.push(order_id);
                }
            }
        }
        Ok(proofs)
    }

    // Order ids from the customer index, oldest first.
    fn customer_order_ids(&self, customer: &Ref) -> Result<Vec<Ref>> {
        self.store
            .orders_by_customer
            .scan_prefix(customer.as_bytes())
            .keys()
            .map(|key| -> Result<Ref> {
                let key = key?;
                key.get(REF_LEN..)
                    .and_then(Ref::from_slice)
                    .ok_or_else(|| EngineError::storage("corrupt customer index key"))
            })
            .collect()
    }

    /// Set the status. Returns 1 when the stored value changed, 0 otherwise.
    #[tracing::instrument(skip(self, id, status), fields(order_id = %id, status = %status))]
    pub fn update_status(&self, id: &Ref, status: OrderStatus) -> Result<usize> {
        let changed = store::modify_doc::<Order, _>(&self.store.orders, id, |order| {
            let changed = order.status != status;
            order.status = status;
            Ok(changed)
        })?;

        Ok(modified_count(changed))
    }

    /// Set the payment flag. Returns 1 when the stored value changed, 0 otherwise.
    #[tracing::instrument(skip(self, id), fields(order_id = %id))]
    pub fn update_is_paid(&self, id: &Ref, paid: bool) -> Result<usize> {
        let changed = store::modify_doc::<Order, _>(&self.store.orders, id, |order| {
            let changed = order.is_paid != paid;
            order.is_paid = paid;
            Ok(changed)
        })?;

        Ok(modified_count(changed))
    }

    /// Apply an allow-listed patch. Identity, customer, line items, total and creation time
    /// are outside the patch type and cannot change here.
    #[tracing::instrument(skip(self, id, patch), fields(order_id = %id))]
    pub fn update_fields(&self, id: &Ref, patch: &OrderPatch) -> Result<UpdateOutcome> {
        let changed = store::modify_doc::<Order, _>(&self.store.orders, id, |order| {
            Ok(patch.apply(order))
        })?;

        match changed {
            Some(modified) => {
                debug!(modified, "Order fields updated");
                Ok(UpdateOutcome {
                    matched: true,
                    modified,
                })
            }
            None => Err(EngineError::not_found("order", id)),
        }
    }

    /// Mark the order destroyed. The document stays addressable by id.
    #[tracing::instrument(skip(self, id), fields(order_id = %id))]
    pub fn soft_delete(&self, id: &Ref) -> Result<()> {
        let changed = store::modify_doc::<Order, _>(&self.store.orders, id, |order| {
            let changed = !order.is_destroyed();
            order.lifecycle = Lifecycle::Destroyed;
            Ok(changed)
        })?;

        match changed {
            Some(_) => {
                info!("Order soft-deleted");
                Ok(())
            }
            None => Err(EngineError::not_found("order", id)),
        }
    }

    /// Soft-delete in sequence, stopping at the first failure.
    pub fn soft_delete_many(&self, ids: &[Ref]) -> BulkOutcome {
        cleanup::run_sequential(ids, |id| self.soft_delete(id))
    }
}

fn join_customer(order: Order, users: &dyn UserProvider) -> Result<OrderDetail> {
    let customer = users.find_by_id(&order.customer)?.map(|user| user.summary());
    Ok(OrderDetail { order, customer })
}

/// `created_at` descending; equal timestamps fall back to id descending (later id is newer).
pub(crate) fn newest_first<O: AsRef<Order>>(orders: &mut [O]) {
    orders.sort_by_key(|o| {
        let order = o.as_ref();
        Reverse((order.created_at, order.id))
    });
}

fn modified_count(changed: Option<bool>) -> usize {
    usize::from(changed == Some(true))
}
