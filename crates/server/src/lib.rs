//! Server crate provides the HTTP surface of the order backend.
//!
//! Customers list products and place orders; operators read the stored
//! orders behind Basic authentication. `/health` and `/metrics` serve
//! monitoring.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, MatchedPath, Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use model::Order;
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use service::{OrderService, PlacedOrder};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

pub mod auth;

pub use auth::OperatorCredentials;

/// Server represents the HTTP server of the shop backend.
pub struct Server {
    service: Arc<dyn OrderService>,
    credentials: Arc<OperatorCredentials>,
    port: u16,
    metrics: Arc<Metrics>,
}

/// Metrics collects and exposes HTTP server metrics.
struct Metrics {
    registry: Registry,
    http_requests_total: CounterVec,
    http_request_duration_seconds: HistogramVec,
    errors_total: CounterVec,
    orders_placed_total: CounterVec,
}

impl Metrics {
    fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "endpoint", "status"],
        )
        .expect("Failed to create http_requests_total metric");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            ),
            &["method", "endpoint"],
        )
        .expect("Failed to create http_request_duration_seconds metric");

        let errors_total = CounterVec::new(
            Opts::new("errors_total", "Total number of errors"),
            &["source", "endpoint"],
        )
        .expect("Failed to create errors_total metric");

        let orders_placed_total = CounterVec::new(
            Opts::new("orders_placed_total", "Stored orders by forwarding outcome"),
            &["forwarding"],
        )
        .expect("Failed to create orders_placed_total metric");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("Failed to register http_requests_total metric");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("Failed to register http_request_duration_seconds metric");
        registry
            .register(Box::new(errors_total.clone()))
            .expect("Failed to register errors_total metric");
        registry
            .register(Box::new(orders_placed_total.clone()))
            .expect("Failed to register orders_placed_total metric");

        Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            errors_total,
            orders_placed_total,
        }
    }

    fn record_request(&self, method: &str, endpoint: &str, status: u16, duration: Duration) {
        self.http_requests_total
            .with_label_values(&[method, endpoint, &status.to_string()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, endpoint])
            .observe(duration.as_secs_f64());
    }

    fn record_error(&self, source: &str, endpoint: &str) {
        self.errors_total.with_label_values(&[source, endpoint]).inc();
    }

    fn record_order(&self, placed: &PlacedOrder) {
        self.orders_placed_total
            .with_label_values(&[placed.forwarding.as_str()])
            .inc();
    }
}

/// Application state shared between request handlers
#[derive(Clone)]
struct AppState {
    service: Arc<dyn OrderService>,
    metrics: Arc<Metrics>,
}

impl Server {
    /// Creates a new Server instance.
    ///
    /// # Arguments
    ///
    /// * `port` - The port on which the server will listen
    /// * `service` - Business operations behind the routes
    /// * `credentials` - The operator account for `GET /api/orders`
    pub fn new(port: u16, service: Arc<dyn OrderService>, credentials: OperatorCredentials) -> Self {
        info!("Initializing HTTP server on port {}", port);

        Self {
            service,
            credentials: Arc::new(credentials),
            port,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Starts the server and blocks until it's shut down.
    pub async fn start(&self) -> Result<()> {
        let app = self.router();

        let listener = TcpListener::bind(("0.0.0.0", self.port))
            .await
            .context("Failed to bind to port")?;

        info!("HTTP server listening on port {}", self.port);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        info!("HTTP server shut down gracefully");
        Ok(())
    }

    /// All routes with their middleware.
    pub fn router(&self) -> Router {
        let metrics = self.metrics.clone();

        // Only the listing is protected; anyone may place an order.
        let orders = get(Self::handle_list_orders)
            .route_layer(middleware::from_fn_with_state(
                self.credentials.clone(),
                auth::require_basic_auth,
            ))
            .post(Self::handle_place_order);

        Router::new()
            .route("/api/products", get(Self::handle_list_products))
            .route("/api/products/{name}", get(Self::handle_get_product))
            .route("/api/orders", orders)
            .route("/health", get(Self::handle_health))
            .route("/metrics", get(Self::handle_metrics))
            .layer(middleware::from_fn_with_state(
                metrics.clone(),
                Self::metrics_middleware,
            ))
            .layer(CorsLayer::permissive())
            .with_state(AppState {
                service: self.service.clone(),
                metrics,
            })
    }

    /// Middleware for collecting metrics on HTTP requests
    async fn metrics_middleware(
        State(metrics): State<Arc<Metrics>>,
        req: axum::extract::Request,
        next: middleware::Next,
    ) -> Response {
        let method = req.method().to_string();
        // Route templates keep product names out of the label values.
        let endpoint = req
            .extensions()
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| "unmatched".to_string());

        let start = std::time::Instant::now();
        let response = next.run(req).await;
        let duration = start.elapsed();

        let status = response.status().as_u16();
        metrics.record_request(&method, &endpoint, status, duration);
        if status >= 400 {
            metrics.record_error("http", &endpoint);
        }

        response
    }

    async fn handle_list_products(State(state): State<AppState>) -> Response {
        info!("Received request to list products");

        match state.service.list_products().await {
            Ok(products) => Json(products).into_response(),
            Err(e) => {
                error!("Failed to list products: {}", e);
                (StatusCode::BAD_REQUEST, e.to_string()).into_response()
            }
        }
    }

    async fn handle_get_product(
        State(state): State<AppState>,
        Path(name): Path<String>,
    ) -> Response {
        info!("Received product request for name: {}", name);

        match state.service.get_product(&name).await {
            Ok(product) => Json(product).into_response(),
            Err(e) => {
                warn!("Product lookup failed for {}: {}", name, e);
                (StatusCode::BAD_REQUEST, e.to_string()).into_response()
            }
        }
    }

    async fn handle_place_order(
        State(state): State<AppState>,
        payload: Result<Json<Order>, JsonRejection>,
    ) -> Response {
        info!("Received order submission");

        let Json(order) = match payload {
            Ok(order) => order,
            Err(rejection) => {
                warn!("Malformed order payload: {}", rejection.body_text());
                return (StatusCode::BAD_REQUEST, rejection.body_text()).into_response();
            }
        };

        match state.service.place_order(order).await {
            Ok(placed) => {
                state.metrics.record_order(&placed);
                info!(order = %placed.reference, forwarding = %placed.forwarding, "Order accepted");
                (StatusCode::OK, confirmation(&placed)).into_response()
            }
            Err(e) => {
                warn!("Order rejected: {}", e);
                (StatusCode::BAD_REQUEST, e.to_string()).into_response()
            }
        }
    }

    async fn handle_list_orders(State(state): State<AppState>) -> Response {
        info!("Received request to fetch all orders");

        match state.service.list_orders().await {
            Ok(orders) => Json(orders).into_response(),
            Err(e) => {
                error!("Failed to list orders: {}", e);
                (StatusCode::BAD_REQUEST, e.to_string()).into_response()
            }
        }
    }

    async fn handle_health() -> &'static str {
        info!("Health check requested");
        "OK"
    }

    async fn handle_metrics(State(state): State<AppState>) -> Response {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();

        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&state.metrics.registry.gather(), &mut buffer) {
            error!("Failed to encode metrics: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response();
        }

        match String::from_utf8(buffer) {
            Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
            Err(e) => {
                error!("Failed to convert metrics to UTF-8: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Invalid metrics data").into_response()
            }
        }
    }
}

/// Text shown to the customer after the order has been stored.
fn confirmation(placed: &PlacedOrder) -> String {
    format!(
        "Vielen Dank für Deine Bestellung mit Bestellnr. '{}'.",
        placed.reference
    )
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
