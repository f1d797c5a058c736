//! Forwarding of stored orders to the Billbee order management service.
//!
//! [`BillbeeForwarder`] spaces its requests through a [`RateLimiter`],
//! classifies every response that is not `201 Created` as a failure and
//! alerts the operators through an optional [`Notifier`]. The `Display` text
//! of a [`ForwardError`] is what gets stored on the order for diagnosis.

use std::error::Error as StdError;
use std::sync::Arc;

use app_config::AppConfig;
use async_trait::async_trait;
use model::{Order, OrderReference, Product};
use notifier::Notifier;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tokio_util::task::TaskTracker;
use tracing::{error, info, instrument, warn};

pub mod body;
pub mod limiter;
pub mod voucher;

pub use body::BillbeeOrder;
pub use limiter::RateLimiter;
pub use voucher::{read_recipients, VoucherRecipient};
pub use reqwest::StatusCode;

/// Header carrying the API key of the shop.
pub const API_KEY_HEADER: &str = "X-Billbee-Api-Key";

/// Marker of an upstream server error in a stored forwarding response.
pub const SERVER_ERROR_SIGNATURE: &str = "Billbee returned HTTP status: 500";

#[derive(Debug, Error)]
pub enum ForwardError {
    /// The order has no ID yet and cannot be referenced.
    #[error("order has not been stored yet")]
    Unpersisted,
    #[error("{0}")]
    Serialize(#[from] serde_json::Error),
    /// The request could not be built or sent, or no response arrived.
    #[error("{}", error_chain(.0))]
    Transport(reqwest::Error),
    #[error("Billbee returned HTTP status: {status} with error message: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Billbee returned HTTP status: {status} and error reading response body: {source}")]
    StatusUnreadable {
        status: StatusCode,
        source: reqwest::Error,
    },
    /// The order was created but its response body could not be read.
    #[error("{}", error_chain(.0))]
    ResponseBody(reqwest::Error),
}

/// Renders an error followed by all of its causes, `outer: cause: root`.
fn error_chain(error: &dyn StdError) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        // Some wrappers repeat their cause in their own message.
        if !text.ends_with(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

impl ForwardError {
    /// Subject line of the alert mail for this failure.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Unpersisted | Self::Serialize(_) => "Fehler beim Bestellung erstellen",
            Self::Transport(e) if e.is_builder() => "Fehler beim Bestellung erstellen",
            Self::Transport(_) => "Fehler beim Bestellung weiterleiten",
            Self::Status { .. } | Self::StatusUnreadable { .. } => "Fehler bei billbee",
            Self::ResponseBody(_) => "Fehler beim Response lesen",
        }
    }
}

/// Sends a stored order to the order management service.
///
/// Returns the raw response body on success.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, order: &Order, product: &Product) -> Result<String, ForwardError>;
}

pub struct BillbeeForwarder {
    client: reqwest::Client,
    url: String,
    api_key: String,
    username: String,
    password: String,
    product_id: i64,
    limiter: RateLimiter,
    notifier: Option<Arc<dyn Notifier>>,
    alerts: TaskTracker,
    orders_overview_url: String,
}

impl BillbeeForwarder {
    pub fn from_config(cfg: &AppConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(cfg.forward_timeout)
            .build()?;

        Ok(Self {
            client,
            url: cfg.billbee_url.clone(),
            api_key: cfg.billbee_api_key.clone(),
            username: cfg.billbee_username.clone(),
            password: cfg.billbee_password.clone(),
            product_id: cfg.billbee_product_id,
            limiter: RateLimiter::new(cfg.forward_interval),
            notifier: None,
            alerts: TaskTracker::new(),
            orders_overview_url: cfg.orders_overview_url.clone(),
        })
    }

    /// Alert the operators through `notifier` whenever forwarding fails.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Waits until every alert mail started so far has been handed to the
    /// notifier. Call before the process exits.
    pub async fn flush_alerts(&self) {
        self.alerts.close();
        self.alerts.wait().await;
        self.alerts.reopen();
    }

    /// Forwards a membership voucher order tagged with its `convivium`.
    ///
    /// Voucher orders are sent in bulk by an operator, so failures are only
    /// returned, never mailed.
    #[instrument(skip_all, fields(order = ?order.id))]
    pub async fn forward_voucher(
        &self,
        order: &Order,
        product: &Product,
        convivium: &str,
    ) -> Result<String, ForwardError> {
        let id = order.id.ok_or(ForwardError::Unpersisted)?;
        let reference = OrderReference::voucher(id);
        let document = BillbeeOrder::voucher(order, reference, product, self.product_id, convivium);
        self.send(&document).await
    }

    async fn send(&self, document: &BillbeeOrder) -> Result<String, ForwardError> {
        let _permit = self.limiter.acquire().await;
        let payload = serde_json::to_vec(document)?;

        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, &self.api_key)
            .body(payload)
            .send()
            .await
            .map_err(ForwardError::Transport)?;

        let status = response.status();
        if status != StatusCode::CREATED {
            return Err(match response.text().await {
                Ok(body) => ForwardError::Status { status, body },
                Err(source) => ForwardError::StatusUnreadable { status, source },
            });
        }

        response.text().await.map_err(ForwardError::ResponseBody)
    }

    /// Mails the failure without waiting for the delivery; see [`Self::flush_alerts`].
    fn alert(&self, failure: &ForwardError, reference: OrderReference) {
        let Some(notifier) = self.notifier.clone() else {
            return;
        };
        let subject = failure.subject();
        let body = format!(
            "{failure}\r\n\r\nBei Bestellung mit ID {reference}\r\nHier Bestelldetails einsehen: {}",
            self.orders_overview_url
        );
        self.alerts.spawn(async move {
            if let Err(e) = notifier.notify(subject, &body).await {
                error!(order = %reference, error = %e, "failed to send forwarding alert");
            }
        });
    }
}

#[async_trait]
impl Forwarder for BillbeeForwarder {
    #[instrument(skip_all, fields(order = ?order.id))]
    async fn forward(&self, order: &Order, product: &Product) -> Result<String, ForwardError> {
        let Some(reference) = order.reference() else {
            return Err(ForwardError::Unpersisted);
        };
        let document = BillbeeOrder::regular(order, reference, product, self.product_id);

        match self.send(&document).await {
            Ok(response) => {
                info!(order = %reference, "order forwarded");
                Ok(response)
            }
            Err(failure) => {
                warn!(order = %reference, error = %failure, "order forwarding failed");
                self.alert(&failure, reference);
                Err(failure)
            }
        }
    }
}
