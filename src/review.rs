//! Product reviews and the purchase gate in front of them.
use std::cmp::Reverse;
use std::sync::Arc;

use sled::Transactional;
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::order::{Lifecycle, Order};
use crate::orders::OrderStore;
use crate::store::{self, Store, abort};
use crate::types::{Ref, TimeStamp};
use crate::validation::validate_review;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Review {
    #[n(0)]
    pub id: Ref,
    #[n(1)]
    pub author: Ref,
    #[n(2)]
    pub product: Ref,
    #[n(3)]
    pub rating: u8,
    #[n(4)]
    pub text: String,
    #[n(5)]
    pub created_at: TimeStamp,
    #[n(6)]
    pub lifecycle: Lifecycle,
}

/// Accepts a review only from an author who received the product, and only once per product.
///
/// Uniqueness is held by the `review_keys` index: the insert transaction refuses a second live
/// key for the same author and product, so racing submissions cannot both land. The same
/// transaction re-reads the qualifying orders, so a delivery withdrawn in the meantime blocks
/// the insert.
#[derive(Debug, Clone)]
pub struct ReviewGate {
    store: Arc<Store>,
    orders: Arc<OrderStore>,
}

impl ReviewGate {
    pub fn new(store: Arc<Store>, orders: Arc<OrderStore>) -> Self {
        Self { store, orders }
    }

    #[tracing::instrument(skip(self, text, rating))]
    pub fn submit_review(
        &self,
        author: &str,
        product: &str,
        rating: Option<i64>,
        text: &str,
    ) -> Result<Review> {
        let author = Ref::parse(author)?;
        let product = Ref::parse(product)?;
        let content = validate_review(rating, text)?;

        let proofs = self.orders.delivered_purchases(&author, &product)?;
        if proofs.is_empty() {
            debug!("No delivered order contains the product");
            return Err(EngineError::NotEligible);
        }

        if self.store.review_keys.contains_key(author.join(&product))? {
            return Err(EngineError::DuplicateReview);
        }

        let review = Review {
            id: Ref::generate(),
            author,
            product,
            rating: content.rating,
            text: content.text,
            created_at: TimeStamp::new(),
            lifecycle: Lifecycle::Active,
        };
        self.commit(&review, &proofs)?;

        info!(review_id = %review.id, rating = review.rating, "Review accepted");
        Ok(review)
    }

    // The checks above are advisory. This transaction re-reads the qualifying orders and the
    // uniqueness key, and its outcome is final.
    fn commit(&self, review: &Review, proofs: &[Ref]) -> Result<()> {
        let encoded = store::encode(review)?;
        let key = review.author.join(&review.product);

        (&self.store.reviews, &self.store.review_keys, &self.store.orders).transaction(
            |(reviews, keys, orders)| {
                let mut eligible = false;
                for order_id in proofs {
                    let Some(bytes) = orders.get(order_id.as_bytes())? else {
                        continue;
                    };
                    let order: Order = minicbor::decode(&bytes).map_err(|e| abort(e.into()))?;
                    if order.proves_purchase_of(&review.author, &review.product) {
                        eligible = true;
                        break;
                    }
                }
                if !eligible {
                    return Err(abort(EngineError::NotEligible));
                }

                if keys.get(key)?.is_some() {
                    return Err(abort(EngineError::DuplicateReview));
                }
                keys.insert(&key[..], &review.id.as_bytes()[..])?;
                reviews.insert(&review.id.as_bytes()[..], encoded.clone())?;
                Ok(())
            },
        )?;
        Ok(())
    }

    /// Soft-delete a review on behalf of its author.
    #[tracing::instrument(skip(self))]
    pub fn delete_review(&self, review: &str, requester: &str) -> Result<()> {
        let id = Ref::parse(review)?;
        let requester = Ref::parse(requester)?;

        (&self.store.reviews, &self.store.review_keys).transaction(|(reviews, keys)| {
            let Some(bytes) = reviews.get(id.as_bytes())? else {
                return Err(abort(EngineError::not_found("review", id)));
            };
            let mut doc: Review = minicbor::decode(&bytes).map_err(|e| abort(e.into()))?;

            if doc.lifecycle.is_destroyed() {
                return Err(abort(EngineError::not_found("review", id)));
            }
            if doc.author != requester {
                return Err(abort(EngineError::Forbidden("review")));
            }

            doc.lifecycle = Lifecycle::Destroyed;
            reviews.insert(&id.as_bytes()[..], store::encode(&doc).map_err(abort)?)?;

            let key = doc.author.join(&doc.product);
            if keys.get(key)?.as_deref() == Some(&id.as_bytes()[..]) {
                keys.remove(&key[..])?;
            }
            Ok(())
        })?;

        info!(review_id = %id, "Review deleted");
        Ok(())
    }

    /// The review under `id`, soft-deleted or not.
    pub fn get_review(&self, id: &str) -> Result<Option<Review>> {
        store::get_doc(&self.store.reviews, &Ref::parse(id)?)
    }

    /// Live reviews of a product, newest first.
    pub fn reviews_for_product(&self, product: &str) -> Result<Vec<Review>> {
        let product = Ref::parse(product)?;
        let mut reviews: Vec<Review> = store::scan_docs(&self.store.reviews)?;
        reviews.retain(|r| r.product == product && !r.lifecycle.is_destroyed());
        reviews.sort_by_key(|r| Reverse((r.created_at, r.id)));

        Ok(reviews)
    }
}
