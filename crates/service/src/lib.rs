//! Business logic layer for order taking.
//!
//! [`OrderServiceImpl`] runs an incoming order through product lookup,
//! [`validation`], persistence and forwarding, and records the forwarding
//! outcome on the stored order. Once an order is stored the customer is
//! told so, whatever happens during forwarding.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use forwarder::{Forwarder, SERVER_ERROR_SIGNATURE};
use model::{Order, OrderReference, Product};
use repository::{OrdersRepository, ProductsRepository, RepositoryError};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

pub mod validation;

pub use validation::{AddressRole, ValidationError};

/// Delivery first name of orders placed for testing; never re-forwarded.
pub const TEST_CUSTOMER_NAME: &str = "Test";

/// The main error type for all operations in [`OrderService`] and [`OrderServiceImpl`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The order misses a mandatory field or consent.
    #[error("{0}")]
    InvalidOrder(#[from] ValidationError),
    #[error("Bitte wählen Sie ein existierendes Produkt.")]
    UnknownProduct,
    /// A repository (database) operation failed.
    #[error("Database error: {0}")]
    Db(#[from] RepositoryError),
    #[error("forwarding is not configured")]
    ForwardingDisabled,
}

/// What happened to a stored order after persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardingOutcome {
    /// No forwarder is configured.
    Skipped,
    Forwarded,
    /// Forwarding failed; the error text was stored on the order.
    Failed,
    /// Forwarding ran but its outcome could not be written back.
    NotRecorded,
}

impl ForwardingOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Forwarded => "forwarded",
            Self::Failed => "failed",
            Self::NotRecorded => "not_recorded",
        }
    }
}

impl fmt::Display for ForwardingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A durably stored order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedOrder {
    pub id: i64,
    pub reference: OrderReference,
    pub forwarding: ForwardingOutcome,
}

/// Result of a [`OrderServiceImpl::reconcile_forwarding`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub attempted: usize,
    pub forwarded: usize,
    pub failed: usize,
}

/// Business operations behind the HTTP surface.
#[async_trait]
pub trait OrderService: Send + Sync {
    async fn list_products(&self) -> Result<Vec<Product>, ServiceError>;

    /// Looks a product up by its unique name.
    ///
    /// # Errors
    /// [`ServiceError::UnknownProduct`] if no product carries that name.
    async fn get_product(&self, name: &str) -> Result<Product, ServiceError>;

    /// Validates, stores and forwards an order.
    ///
    /// The server clock replaces any submission date sent by the client.
    /// Forwarding problems never turn into an error here: once the order is
    /// stored the call succeeds and [`PlacedOrder::forwarding`] tells what
    /// happened next.
    ///
    /// # Errors
    /// [`ServiceError::UnknownProduct`] or [`ServiceError::InvalidOrder`]
    /// before anything is stored, [`ServiceError::Db`] if the insert fails.
    async fn place_order(&self, order: Order) -> Result<PlacedOrder, ServiceError>;

    async fn list_orders(&self) -> Result<Vec<Order>, ServiceError>;

    async fn count_orders(&self) -> Result<i64, ServiceError>;
}

/// [`OrderService`] over a store implementing both repository traits.
pub struct OrderServiceImpl<S> {
    store: Arc<S>,
    forwarder: Option<Arc<dyn Forwarder>>,
}

impl<S> OrderServiceImpl<S>
where
    S: ProductsRepository + OrdersRepository,
{
    /// A service that stores orders without forwarding them.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            forwarder: None,
        }
    }

    /// Forward every stored order through `forwarder`.
    pub fn with_forwarder(mut self, forwarder: Arc<dyn Forwarder>) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    /// Inserts the products of [`model::catalog`] that are not stored yet.
    ///
    /// Returns the number of products created.
    #[instrument(skip(self))]
    pub async fn seed_catalog(&self) -> Result<usize, ServiceError> {
        let mut created = 0;
        for product in model::catalog() {
            if self.store.get_product_by_name(&product.name).await?.is_some() {
                continue;
            }
            let id = self.store.insert_product(&product).await?;
            info!(id, name = %product.name, "product created");
            created += 1;
        }
        Ok(created)
    }

    /// Sends stored orders again whose last attempt hit an upstream server
    /// error. Test orders are left alone.
    ///
    /// A successful attempt replaces the stored response; a failed one keeps
    /// the old response and is only counted.
    #[instrument(skip(self))]
    pub async fn reconcile_forwarding(&self) -> Result<ReconcileReport, ServiceError> {
        let forwarder = self
            .forwarder
            .as_ref()
            .ok_or(ServiceError::ForwardingDisabled)?;

        let mut report = ReconcileReport::default();
        for order in self.store.list_orders().await? {
            let Some(id) = order.id else { continue };
            if !needs_reforward(&order) {
                continue;
            }
            report.attempted += 1;

            let Some(product) = self.store.get_product_by_id(order.product_id).await? else {
                warn!(order = id, product_id = order.product_id, "product of stored order is gone");
                report.failed += 1;
                continue;
            };
            match forwarder.forward(&order, &product).await {
                Ok(response) => {
                    self.store.update_forwarding_response(id, &response).await?;
                    report.forwarded += 1;
                }
                Err(e) => {
                    warn!(order = id, error = %e, "re-forwarding failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            attempted = report.attempted,
            forwarded = report.forwarded,
            failed = report.failed,
            "reconciliation finished"
        );
        Ok(report)
    }

    /// Forwards a stored order and writes the outcome back.
    ///
    /// A failing write-back is logged with the full diagnostic text so it can
    /// be recovered from the log.
    async fn forward_and_record(
        &self,
        forwarder: &dyn Forwarder,
        order: &Order,
        product: &Product,
        reference: OrderReference,
    ) -> ForwardingOutcome {
        let (response, outcome) = match forwarder.forward(order, product).await {
            Ok(body) => (body, ForwardingOutcome::Forwarded),
            Err(e) => (e.to_string(), ForwardingOutcome::Failed),
        };

        if let Err(e) = self
            .store
            .update_forwarding_response(reference.id, &response)
            .await
        {
            error!(
                order = %reference,
                error = %e,
                response = %response,
                "failed to record forwarding response"
            );
            return ForwardingOutcome::NotRecorded;
        }
        outcome
    }
}

fn needs_reforward(order: &Order) -> bool {
    order.forwarding_response.contains(SERVER_ERROR_SIGNATURE)
        && order.first_name_delivery != TEST_CUSTOMER_NAME
}

#[async_trait]
impl<S> OrderService for OrderServiceImpl<S>
where
    S: ProductsRepository + OrdersRepository,
{
    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>, ServiceError> {
        Ok(self.store.list_products().await?)
    }

    #[instrument(skip(self))]
    async fn get_product(&self, name: &str) -> Result<Product, ServiceError> {
        self.store
            .get_product_by_name(name)
            .await?
            .ok_or(ServiceError::UnknownProduct)
    }

    #[instrument(skip(self, order), fields(product_id = order.product_id, amount = order.amount))]
    async fn place_order(&self, mut order: Order) -> Result<PlacedOrder, ServiceError> {
        order.date = Utc::now();
        order.id = None;
        order.forwarding_response.clear();

        let product = self
            .store
            .get_product_by_id(order.product_id)
            .await?
            .ok_or(ServiceError::UnknownProduct)?;
        validation::verify(&order)?;

        let id = self.store.insert_order(&order).await?;
        order.id = Some(id);
        let reference = OrderReference::standard(id);
        info!(order = %reference, "order stored");

        let forwarding = match &self.forwarder {
            Some(forwarder) => {
                self.forward_and_record(forwarder.as_ref(), &order, &product, reference)
                    .await
            }
            None => ForwardingOutcome::Skipped,
        };

        Ok(PlacedOrder {
            id,
            reference,
            forwarding,
        })
    }

    #[instrument(skip(self))]
    async fn list_orders(&self) -> Result<Vec<Order>, ServiceError> {
        Ok(self.store.list_orders().await?)
    }

    #[instrument(skip(self))]
    async fn count_orders(&self) -> Result<i64, ServiceError> {
        Ok(self.store.count_orders().await?)
    }
}
