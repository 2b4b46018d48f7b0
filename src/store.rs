//! Document store handle and collection helpers
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult};
use sled::{Db, Tree};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{EngineError, Result};
use crate::types::Ref;

const ORDERS: &str = "orders";
const ORDERS_BY_CUSTOMER: &str = "orders_by_customer";
const REVIEWS: &str = "reviews";
const REVIEW_KEYS: &str = "review_keys";
const USERS: &str = "users";
const USER_EMAILS: &str = "user_emails";
const PRODUCTS: &str = "products";

/// Connected store. Build one with [`Store::open`] and share it between services behind an `Arc`.
#[derive(Debug)]
pub struct Store {
    db: Db,
    pub(crate) orders: Tree,
    // customer || order -> ()
    pub(crate) orders_by_customer: Tree,
    pub(crate) reviews: Tree,
    // author || product -> review id, live reviews only
    pub(crate) review_keys: Tree,
    pub(crate) users: Tree,
    // lowercase email -> user id
    pub(crate) user_emails: Tree,
    pub(crate) products: Tree,
}

impl Store {
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let db = config.to_sled().open()?;
        let store = Self::from_db(db)?;

        info!(
            path = %config.path.display(),
            temporary = config.temporary,
            recovered = store.db.was_recovered(),
            "Store opened"
        );
        Ok(store)
    }

    /// Wrap an already opened sled database.
    pub fn from_db(db: Db) -> Result<Self> {
        Ok(Self {
            orders: db.open_tree(ORDERS)?,
            orders_by_customer: db.open_tree(ORDERS_BY_CUSTOMER)?,
            reviews: db.open_tree(REVIEWS)?,
            review_keys: db.open_tree(REVIEW_KEYS)?,
            users: db.open_tree(USERS)?,
            user_emails: db.open_tree(USER_EMAILS)?,
            products: db.open_tree(PRODUCTS)?,
            db,
        })
    }

    /// Flush outstanding writes to disk.
    pub fn flush(&self) -> Result<usize> {
        Ok(self.db.flush()?)
    }

    /// Flush and release the handle.
    pub fn close(self) -> Result<()> {
        let flushed = self.db.flush()?;
        info!(flushed_bytes = flushed, "Store closed");
        Ok(())
    }
}

pub(crate) fn encode<T: minicbor::Encode<()>>(doc: &T) -> Result<Vec<u8>> {
    Ok(minicbor::to_vec(doc)?)
}

pub(crate) fn get_doc<T>(tree: &Tree, id: &Ref) -> Result<Option<T>>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    match tree.get(id.as_bytes())? {
        Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
        None => Ok(None),
    }
}

pub(crate) fn put_doc<T: minicbor::Encode<()>>(tree: &Tree, id: &Ref, doc: &T) -> Result<()> {
    tree.insert(id.as_bytes(), encode(doc)?)?;
    Ok(())
}

/// Every document in key order.
pub(crate) fn scan_docs<T>(tree: &Tree) -> Result<Vec<T>>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    tree.iter()
        .values()
        .map(|value| Ok(minicbor::decode(&value?)?))
        .collect()
}

/// Atomically read, modify and write back one document.
///
/// `apply` returns whether it changed the document; unchanged documents are not rewritten.
/// Returns `None` when no document exists under `id`.
pub(crate) fn modify_doc<T, F>(tree: &Tree, id: &Ref, apply: F) -> Result<Option<bool>>
where
    T: minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()>,
    F: Fn(&mut T) -> Result<bool>,
{
    let outcome = tree.transaction(|tx| -> ConflictableTransactionResult<Option<bool>, EngineError> {
        let Some(bytes) = tx.get(id.as_bytes())? else {
            return Ok(None);
        };
        let mut doc: T = minicbor::decode(&bytes).map_err(|e| abort(e.into()))?;

        if !apply(&mut doc).map_err(abort)? {
            return Ok(Some(false));
        }

        tx.insert(&id.as_bytes()[..], encode(&doc).map_err(abort)?)?;
        Ok(Some(true))
    })?;

    debug!(id = %id, modified = ?outcome, "Document modify finished");
    Ok(outcome)
}

pub(crate) fn abort(err: EngineError) -> ConflictableTransactionError<EngineError> {
    ConflictableTransactionError::Abort(err)
}
