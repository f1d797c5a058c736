//! In-memory store implementing the repository traits, for tests of the
//! layers above the database.
//!
//! Like the SQLite store it keeps all state behind one mutex. Writes of
//! forwarding responses can be made to fail on demand.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use model::{NewProduct, Order, Product};
use repository::{OrdersRepository, ProductsRepository, RepositoryError};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    products: Vec<Product>,
    orders: Vec<Order>,
}

/// Thread-safe in-memory product and order store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_response_updates: AtomicBool,
}

impl MemoryStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the fixed catalog.
    pub async fn with_catalog() -> Self {
        let store = Self::new();
        for product in model::catalog() {
            store
                .insert_product(&product)
                .await
                .expect("catalog product names are unique");
        }
        store
    }

    /// Make every following `update_forwarding_response` fail (or succeed again).
    pub fn fail_response_updates(&self, fail: bool) {
        self.fail_response_updates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProductsRepository for MemoryStore {
    async fn insert_product(&self, product: &NewProduct) -> Result<i64, RepositoryError> {
        let mut inner = self.inner.lock().await;
        if inner.products.iter().any(|p| p.name == product.name) {
            return Err(RepositoryError::DuplicateName(product.name.clone()));
        }
        let id = inner.products.len() as i64 + 1;
        inner.products.push(Product {
            id,
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            shipping: product.shipping,
        });
        Ok(id)
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.inner.lock().await.products.clone())
    }

    async fn get_product_by_name(&self, name: &str) -> Result<Option<Product>, RepositoryError> {
        let inner = self.inner.lock().await;
        Ok(inner.products.iter().find(|p| p.name == name).cloned())
    }

    async fn get_product_by_id(&self, id: i64) -> Result<Option<Product>, RepositoryError> {
        let inner = self.inner.lock().await;
        Ok(inner.products.iter().find(|p| p.id == id).cloned())
    }
}

#[async_trait]
impl OrdersRepository for MemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<i64, RepositoryError> {
        let mut inner = self.inner.lock().await;
        let id = inner.orders.len() as i64 + 1;
        inner.orders.push(Order {
            id: Some(id),
            ..order.clone()
        });
        Ok(id)
    }

    async fn update_forwarding_response(&self, id: i64, response: &str) -> Result<(), RepositoryError> {
        if self.fail_response_updates.load(Ordering::SeqCst) {
            return Err(RepositoryError::Db(sqlx::Error::WorkerCrashed));
        }
        let mut inner = self.inner.lock().await;
        let order = inner
            .orders
            .iter_mut()
            .find(|o| o.id == Some(id))
            .ok_or(RepositoryError::UnknownOrder(id))?;
        order.forwarding_response = response.to_string();
        Ok(())
    }

    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        Ok(self.inner.lock().await.orders.clone())
    }

    async fn count_orders(&self) -> Result<i64, RepositoryError> {
        Ok(self.inner.lock().await.orders.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_store() {
        let store = MemoryStore::new();
        assert!(store.get_product_by_id(1).await.unwrap().is_none());
        assert_eq!(store.count_orders().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_and_update_order() {
        let store = MemoryStore::with_catalog().await;
        let id = store.insert_order(&Order::default()).await.unwrap();
        store.update_forwarding_response(id, "created").await.unwrap();

        let orders = store.list_orders().await.unwrap();
        assert_eq!(orders[0].id, Some(id));
        assert_eq!(orders[0].forwarding_response, "created");
    }

    #[tokio::test]
    async fn test_injected_update_failure() {
        let store = MemoryStore::with_catalog().await;
        let id = store.insert_order(&Order::default()).await.unwrap();
        store.fail_response_updates(true);
        assert!(store.update_forwarding_response(id, "x").await.is_err());
        store.fail_response_updates(false);
        assert!(store.update_forwarding_response(id, "x").await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let store = MemoryStore::with_catalog().await;
        let again = model::catalog().remove(0);
        assert!(matches!(
            store.insert_product(&again).await,
            Err(RepositoryError::DuplicateName(_))
        ));
    }
}
