//! Users, products and uploaded files, as seen from the order and review services.
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use sled::Transactional;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::order::{CustomerSummary, Lifecycle};
use crate::store::{self, Store, abort};
use crate::types::{Ref, TimeStamp};
use crate::validation::UserDraft;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct User {
    #[n(0)]
    pub id: Ref,
    #[n(1)]
    pub email: String,
    #[n(2)]
    pub display_name: String,
    #[n(3)]
    pub created_at: TimeStamp,
    #[n(4)]
    pub lifecycle: Lifecycle,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Product {
    #[n(0)]
    pub id: Ref,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub category: Option<String>,
    #[n(3)]
    pub brand: String,
    #[n(4)]
    pub price: u64,
    #[n(5)]
    pub images: Vec<String>, // public paths, e.g. "/uploads/a.png"
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub category: Option<String>,
    pub brand: String,
    pub price: u64,
    pub images: Vec<String>,
}

pub trait UserProvider {
    /// Any user document under `id`, deactivated or not.
    fn find_by_id(&self, id: &Ref) -> Result<Option<User>>;
    /// Active user with this email.
    fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    fn exists_by_email(&self, email: &str) -> Result<bool> {
        Ok(self.find_by_email(email)?.is_some())
    }
    /// Active users.
    fn get_all(&self) -> Result<Vec<User>>;
}

pub trait ProductProvider {
    fn get_all(&self) -> Result<Vec<Product>>;
    fn get_by_id(&self, id: &Ref) -> Result<Option<Product>>;
    /// Physically removes the product. `false` when it did not exist.
    fn delete_by_id(&self, id: &Ref) -> Result<bool>;
}

/// Deletes uploaded files. Missing files are not an error.
pub trait FileStorage {
    /// Returns how many files were actually removed.
    fn remove_files(&self, paths: &[String]) -> Result<usize>;
}

impl User {
    pub fn summary(&self) -> CustomerSummary {
        CustomerSummary {
            display_name: self.display_name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Users kept in the document store, unique by email.
#[derive(Debug, Clone)]
pub struct UserCollection {
    store: Arc<Store>,
}

impl UserCollection {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, draft), fields(email = %draft.email))]
    pub fn register(&self, draft: &UserDraft) -> Result<User> {
        let valid = draft.validate()?;
        let user = User {
            id: Ref::generate(),
            email: valid.email,
            display_name: valid.display_name,
            created_at: TimeStamp::new(),
            lifecycle: Lifecycle::Active,
        };
        let encoded = store::encode(&user)?;

        (&self.store.users, &self.store.user_emails).transaction(|(users, emails)| {
            if emails.get(user.email.as_bytes())?.is_some() {
                return Err(abort(EngineError::invalid("email", "is already registered")));
            }
            emails.insert(user.email.as_bytes(), &user.id.as_bytes()[..])?;
            users.insert(&user.id.as_bytes()[..], encoded.clone())?;
            Ok(())
        })?;

        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Soft-delete. The email stays reserved.
    pub fn deactivate(&self, id: &Ref) -> Result<()> {
        let found = store::modify_doc::<User, _>(&self.store.users, id, |user| {
            let changed = !user.lifecycle.is_destroyed();
            user.lifecycle = Lifecycle::Destroyed;
            Ok(changed)
        })?;

        found
            .map(|_| ())
            .ok_or_else(|| EngineError::not_found("user", id))
    }
}

impl UserProvider for UserCollection {
    fn find_by_id(&self, id: &Ref) -> Result<Option<User>> {
        store::get_doc(&self.store.users, id)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.trim().to_lowercase();
        let Some(raw_id) = self.store.user_emails.get(email.as_bytes())? else {
            return Ok(None);
        };
        let id = Ref::from_slice(&raw_id)
            .ok_or_else(|| EngineError::storage(format!("corrupt email index entry for {email}")))?;

        Ok(self.find_by_id(&id)?.filter(|user| !user.lifecycle.is_destroyed()))
    }

    fn get_all(&self) -> Result<Vec<User>> {
        let users: Vec<User> = store::scan_docs(&self.store.users)?;
        Ok(users
            .into_iter()
            .filter(|user| !user.lifecycle.is_destroyed())
            .collect())
    }
}

/// Products kept in the document store. Listing order is insertion order.
#[derive(Debug, Clone)]
pub struct ProductCollection {
    store: Arc<Store>,
}

impl ProductCollection {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn insert(&self, product: NewProduct) -> Result<Product> {
        let product = Product {
            id: Ref::generate(),
            name: product.name,
            category: product.category,
            brand: product.brand,
            price: product.price,
            images: product.images,
        };
        store::put_doc(&self.store.products, &product.id, &product)?;

        debug!(product_id = %product.id, "Product stored");
        Ok(product)
    }
}

impl ProductProvider for ProductCollection {
    fn get_all(&self) -> Result<Vec<Product>> {
        store::scan_docs(&self.store.products)
    }

    fn get_by_id(&self, id: &Ref) -> Result<Option<Product>> {
        store::get_doc(&self.store.products, id)
    }

    fn delete_by_id(&self, id: &Ref) -> Result<bool> {
        Ok(self.store.products.remove(id.as_bytes())?.is_some())
    }
}

/// Uploaded files under a public directory; paths are relative to it ("/uploads/a.png").
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a public path below the root. `None` for paths that would escape it.
    fn resolve(&self, public_path: &str) -> Option<PathBuf> {
        let relative = Path::new(public_path.trim_start_matches('/'));
        let stays_inside = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

        stays_inside.then(|| self.root.join(relative))
    }
}

impl FileStorage for LocalFileStorage {
    fn remove_files(&self, paths: &[String]) -> Result<usize> {
        let mut removed = 0;
        for public_path in paths {
            let Some(path) = self.resolve(public_path) else {
                warn!(path = %public_path, "Refusing to delete file outside the public root");
                continue;
            };
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "File already gone");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;

    fn store() -> Arc<Store> {
        Arc::new(Store::open(&StoreConfig::temporary()).unwrap())
    }

    #[test]
    fn register_rejects_duplicate_email() {
        let users = UserCollection::new(store());
        users.register(&UserDraft::new("mai@example.com", "Mai")).unwrap();

        let err = users
            .register(&UserDraft::new("MAI@example.com", "Other Mai"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(users.get_all().unwrap().len(), 1);
    }

    #[test]
    fn email_lookup_is_case_insensitive() {
        let users = UserCollection::new(store());
        let mai = users.register(&UserDraft::new("mai@example.com", "Mai")).unwrap();

        assert_eq!(users.find_by_email(" Mai@Example.com").unwrap(), Some(mai));
        assert!(users.exists_by_email("mai@example.com").unwrap());
        assert!(!users.exists_by_email("nam@example.com").unwrap());
    }

    #[test]
    fn deactivated_users_drop_out_of_listings_but_stay_addressable() {
        let users = UserCollection::new(store());
        let mai = users.register(&UserDraft::new("mai@example.com", "Mai")).unwrap();
        users.deactivate(&mai.id).unwrap();

        assert!(users.get_all().unwrap().is_empty());
        assert_eq!(users.find_by_email("mai@example.com").unwrap(), None);
        assert!(users.find_by_id(&mai.id).unwrap().is_some());
        assert!(matches!(
            users.deactivate(&Ref::generate()),
            Err(EngineError::NotFound { .. })
        ));
    }

    #[test]
    fn products_list_in_insertion_order() {
        let products = ProductCollection::new(store());
        let names = ["Cleanser", "Toner", "Serum"];
        for name in names {
            products
                .insert(NewProduct {
                    name: name.into(),
                    ..NewProduct::default()
                })
                .unwrap();
        }

        let listed: Vec<_> = products.get_all().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(listed, names);
    }

    #[test]
    fn local_files_are_removed_best_effort() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("uploads")).unwrap();
        std::fs::write(dir.path().join("uploads/a.png"), b"png").unwrap();
        let files = LocalFileStorage::new(dir.path());

        let removed = files
            .remove_files(&[
                "/uploads/a.png".to_string(),
                "/uploads/missing.png".to_string(),
                "../outside.png".to_string(),
            ])
            .unwrap();

        assert_eq!(removed, 1);
        assert!(!dir.path().join("uploads/a.png").exists());
    }
}
