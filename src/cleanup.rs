//! Bulk deletion. Items are processed one at a time with no rollback: a failure stops the
//! run and earlier items stay deleted.
use tracing::{info, warn};

use crate::catalog::{FileStorage, ProductProvider};
use crate::error::{EngineError, Result};
use crate::types::Ref;

/// How far a bulk run got.
#[derive(Debug)]
pub struct BulkOutcome {
    /// Items handled before the run stopped.
    pub processed: usize,
    /// The failure that stopped the run, if any.
    pub failure: Option<EngineError>,
}

impl BulkOutcome {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// Processed count, or the stopping error.
    pub fn into_result(self) -> Result<usize> {
        match self.failure {
            None => Ok(self.processed),
            Some(err) => Err(err),
        }
    }
}

pub(crate) fn run_sequential<T, F>(items: &[T], mut step: F) -> BulkOutcome
where
    F: FnMut(&T) -> Result<()>,
{
    for (processed, item) in items.iter().enumerate() {
        if let Err(err) = step(item) {
            warn!(processed, remaining = items.len() - processed, error = %err, "Bulk run stopped");
            return BulkOutcome {
                processed,
                failure: Some(err),
            };
        }
    }

    BulkOutcome {
        processed: items.len(),
        failure: None,
    }
}

/// Remove a product's images, then the product itself.
///
/// A product that does not exist counts as done. Returns whether a product was deleted.
pub fn delete_product(
    products: &dyn ProductProvider,
    files: &dyn FileStorage,
    id: &Ref,
) -> Result<bool> {
    let Some(product) = products.get_by_id(id)? else {
        return Ok(false);
    };

    let removed = files.remove_files(&product.images)?;
    let deleted = products.delete_by_id(id)?;

    info!(product_id = %id, removed_files = removed, "Product deleted");
    Ok(deleted)
}

/// [`delete_product`] over each id in order, stopping at the first failure.
pub fn delete_products(
    products: &dyn ProductProvider,
    files: &dyn FileStorage,
    ids: &[Ref],
) -> BulkOutcome {
    run_sequential(ids, |id| delete_product(products, files, id).map(|_| ()))
}
