//! # Data Repository Layer
//!
//! This module provides the repository traits for products and orders and
//! their SQLite implementation, [`SqliteStore`].
//!
//! The store owns exactly one connection behind a single async mutex. Every
//! operation takes the lock for the duration of one statement and releases
//! it before returning, so all database access is strictly serialized.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{NewProduct, Order, Product};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

/// # RepositoryError
///
/// Error types that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database-related errors, wrapping the underlying SQLite error
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
    /// A stored value could not be turned back into a domain value.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    /// A product with this name already exists.
    #[error("Duplicate product name: {0}")]
    DuplicateName(String),
    /// The targeted row does not exist.
    #[error("No order with id {0}")]
    UnknownOrder(i64),
}

/// # ProductsRepository
///
/// Repository interface for the product catalog.
///
/// Lookups never fail because a product is absent: they return `Ok(None)`.
#[async_trait]
pub trait ProductsRepository: Send + Sync {
    /// Insert a product and return its generated ID.
    async fn insert_product(&self, product: &NewProduct) -> Result<i64, RepositoryError>;

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError>;

    async fn get_product_by_name(&self, name: &str) -> Result<Option<Product>, RepositoryError>;

    async fn get_product_by_id(&self, id: i64) -> Result<Option<Product>, RepositoryError>;
}

/// # OrdersRepository
///
/// Repository interface for orders. Orders are only ever inserted; the one
/// mutable column is the response of the last forwarding attempt.
#[async_trait]
pub trait OrdersRepository: Send + Sync {
    /// Insert an order and return its generated ID. `order.id` is ignored.
    async fn insert_order(&self, order: &Order) -> Result<i64, RepositoryError>;

    /// Overwrite the stored forwarding response of order `id`.
    async fn update_forwarding_response(&self, id: i64, response: &str) -> Result<(), RepositoryError>;

    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError>;

    async fn count_orders(&self) -> Result<i64, RepositoryError>;
}

/// SQLite implementation of [`ProductsRepository`] and [`OrdersRepository`].
pub struct SqliteStore {
    /// The single connection; the mutex is the process-wide database lock.
    db: Mutex<SqliteConnection>,
}

impl SqliteStore {
    pub fn new(conn: SqliteConnection) -> Self {
        Self { db: Mutex::new(conn) }
    }

    /// Create a store on a fresh in-memory database with the schema applied (for testing)
    pub async fn in_memory() -> Result<Self, RepositoryError> {
        let store = Self::new(db::open_in_memory().await?);
        store.create_schema().await?;
        Ok(store)
    }

    /// Create the tables if they do not exist yet.
    pub async fn create_schema(&self) -> Result<(), RepositoryError> {
        let mut conn = self.db.lock().await;
        db::run_migrations(&mut conn).await?;
        Ok(())
    }

    fn row_to_product(row: &SqliteRow) -> Result<Product, RepositoryError> {
        Ok(Product {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: text_or_empty(row, "description")?,
            price: row.try_get("price")?,
            shipping: row.try_get("shipping")?,
        })
    }

    fn row_to_order(row: &SqliteRow) -> Result<Order, RepositoryError> {
        let date: String = row.try_get("date")?;
        let date = parse_order_date(&date)?;

        Ok(Order {
            id: Some(row.try_get("id")?),
            product_id: row.try_get("product_id")?,
            amount: row.try_get("amount")?,
            date,
            company_invoice: row.try_get("company_invoice")?,
            first_name_invoice: row.try_get("first_name_invoice")?,
            last_name_invoice: row.try_get("last_name_invoice")?,
            company_delivery: row.try_get("company_delivery")?,
            first_name_delivery: row.try_get("first_name_delivery")?,
            last_name_delivery: row.try_get("last_name_delivery")?,
            email: row.try_get("email")?,
            address_street_invoice: row.try_get("address_street_invoice")?,
            address_street_no_invoice: row.try_get("address_street_no_invoice")?,
            address_code_invoice: row.try_get("address_code_invoice")?,
            address_city_invoice: row.try_get("address_city_invoice")?,
            address_country_invoice: row.try_get("address_country_invoice")?,
            address_street_delivery: row.try_get("address_street_delivery")?,
            address_street_no_delivery: row.try_get("address_street_no_delivery")?,
            address_code_delivery: row.try_get("address_code_delivery")?,
            address_city_delivery: row.try_get("address_city_delivery")?,
            address_country_delivery: row.try_get("address_country_delivery")?,
            payment: text_or_empty(row, "payment")?,
            premium: text_or_empty(row, "premium")?,
            reseller: flag(row, "is_reseller")?,
            slow_food_member: flag(row, "slow_food_member")?,
            agrees_agb: flag(row, "agrees_agbs")?,
            agrees_data_privacy: flag(row, "agrees_data_privacy")?,
            message: text_or_empty(row, "message")?,
            forwarding_response: text_or_empty(row, "billbee_api_response")?,
        })
    }
}

/// Optional text columns may hold NULL in databases written by older releases.
fn text_or_empty(row: &SqliteRow, column: &str) -> Result<String, sqlx::Error> {
    Ok(row.try_get::<Option<String>, _>(column)?.unwrap_or_default())
}

fn flag(row: &SqliteRow, column: &str) -> Result<bool, sqlx::Error> {
    Ok(row.try_get::<Option<bool>, _>(column)?.unwrap_or_default())
}

/// Older releases wrote `2019-10-05 14:03:11.123+02:00` instead of RFC 3339.
const LEGACY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

fn parse_order_date(text: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_str(text, LEGACY_DATE_FORMAT))
        .map(|date| date.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Corrupt(format!("order date '{text}': {e}")))
}

const PRODUCT_COLUMNS: &str = "id, name, description, price, shipping";

#[async_trait]
impl ProductsRepository for SqliteStore {
    async fn insert_product(&self, product: &NewProduct) -> Result<i64, RepositoryError> {
        let mut conn = self.db.lock().await;
        let result = sqlx::query(
            "INSERT INTO products (name, description, price, shipping) VALUES (?, ?, ?, ?)",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.shipping)
        .execute(&mut *conn)
        .await;

        match result {
            Ok(result) => Ok(result.last_insert_rowid()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(RepositoryError::DuplicateName(product.name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let mut conn = self.db.lock().await;
        let rows = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id"))
            .fetch_all(&mut *conn)
            .await?;
        rows.iter().map(Self::row_to_product).collect()
    }

    async fn get_product_by_name(&self, name: &str) -> Result<Option<Product>, RepositoryError> {
        let mut conn = self.db.lock().await;
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE name = ?"))
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;
        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn get_product_by_id(&self, id: i64) -> Result<Option<Product>, RepositoryError> {
        let mut conn = self.db.lock().await;
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        row.as_ref().map(Self::row_to_product).transpose()
    }
}

#[async_trait]
impl OrdersRepository for SqliteStore {
    async fn insert_order(&self, order: &Order) -> Result<i64, RepositoryError> {
        let query = r#"
            INSERT INTO orders (
                product_id, amount, date,
                company_invoice, first_name_invoice, last_name_invoice,
                company_delivery, first_name_delivery, last_name_delivery, email,
                address_street_invoice, address_street_no_invoice, address_code_invoice,
                address_city_invoice, address_country_invoice,
                address_street_delivery, address_street_no_delivery, address_code_delivery,
                address_city_delivery, address_country_delivery,
                payment, premium, is_reseller, slow_food_member, agrees_agbs,
                agrees_data_privacy, message, billbee_api_response
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;
        let mut conn = self.db.lock().await;
        let result = sqlx::query(query)
            .bind(order.product_id)
            .bind(order.amount)
            .bind(order.date.to_rfc3339())
            .bind(&order.company_invoice)
            .bind(&order.first_name_invoice)
            .bind(&order.last_name_invoice)
            .bind(&order.company_delivery)
            .bind(&order.first_name_delivery)
            .bind(&order.last_name_delivery)
            .bind(&order.email)
            .bind(&order.address_street_invoice)
            .bind(&order.address_street_no_invoice)
            .bind(&order.address_code_invoice)
            .bind(&order.address_city_invoice)
            .bind(&order.address_country_invoice)
            .bind(&order.address_street_delivery)
            .bind(&order.address_street_no_delivery)
            .bind(&order.address_code_delivery)
            .bind(&order.address_city_delivery)
            .bind(&order.address_country_delivery)
            .bind(&order.payment)
            .bind(&order.premium)
            .bind(order.reseller)
            .bind(order.slow_food_member)
            .bind(order.agrees_agb)
            .bind(order.agrees_data_privacy)
            .bind(&order.message)
            .bind(&order.forwarding_response)
            .execute(&mut *conn)
            .await?;
        let id = result.last_insert_rowid();
        debug!(id, "order inserted");
        Ok(id)
    }

    async fn update_forwarding_response(&self, id: i64, response: &str) -> Result<(), RepositoryError> {
        let mut conn = self.db.lock().await;
        let result = sqlx::query("UPDATE orders SET billbee_api_response = ? WHERE id = ?")
            .bind(response)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::UnknownOrder(id));
        }
        Ok(())
    }

    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        let mut conn = self.db.lock().await;
        let rows = sqlx::query("SELECT * FROM orders ORDER BY id")
            .fetch_all(&mut *conn)
            .await?;
        rows.iter().map(Self::row_to_order).collect()
    }

    async fn count_orders(&self) -> Result<i64, RepositoryError> {
        let mut conn = self.db.lock().await;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }
}
