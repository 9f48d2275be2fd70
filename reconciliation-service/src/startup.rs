//! Application startup and lifecycle management.

use crate::config::ReconciliationConfig;
use crate::handlers::{self, health_check, metrics_handler, readiness_check};
use crate::sepa::SepaGenerator;
use crate::services::{init_metrics, InMemoryPaymentStore, PaymentStore};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use service_core::clock::{system_clock, SharedClock};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::{http_trace_layer, request_id_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ReconciliationConfig,
    pub store: Arc<dyn PaymentStore>,
    pub clock: SharedClock,
    pub sepa: SepaGenerator,
}

impl AppState {
    pub fn new(
        config: ReconciliationConfig,
        store: Arc<dyn PaymentStore>,
        clock: SharedClock,
    ) -> Self {
        let mut sepa = SepaGenerator::new(clock.clone());
        if let Some(name) = config.sepa.initiating_party.clone() {
            sepa = sepa.with_initiating_party(name);
        }
        Self {
            config,
            store,
            clock,
            sepa,
        }
    }
}

pub fn router(state: AppState) -> Router {
    // base64 inflates uploads by a third
    let body_limit = state.config.max_upload_bytes / 3 * 4 + 64 * 1024;

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .route("/statements/parse", post(handlers::statements::parse_statement))
        .route("/reconciliations", post(handlers::statements::reconcile_statement))
        .route(
            "/payments",
            post(handlers::payments::create_payment).get(handlers::payments::list_payments),
        )
        .route("/payments/:id", get(handlers::payments::get_payment))
        .route("/payments/:id/audit", get(handlers::payments::payment_audit))
        .route(
            "/payments/:id/processed",
            post(handlers::payments::mark_processed),
        )
        .route("/payments/:id/failed", post(handlers::payments::mark_failed))
        .route(
            "/sepa/direct-debits",
            post(handlers::sepa::create_direct_debits),
        )
        .route(
            "/sepa/credit-transfers",
            post(handlers::sepa::create_credit_transfer),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(http_trace_layer())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: ReconciliationConfig) -> Result<Self, AppError> {
        Self::build_with(config, Arc::new(InMemoryPaymentStore::new()), system_clock()).await
    }

    /// Build with an explicit store and clock.
    pub async fn build_with(
        config: ReconciliationConfig,
        store: Arc<dyn PaymentStore>,
        clock: SharedClock,
    ) -> Result<Self, AppError> {
        init_metrics();

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Reconciliation service listener bound");

        Ok(Self {
            port,
            listener,
            state: AppState::new(config, store, clock),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn store(&self) -> Arc<dyn PaymentStore> {
        self.state.store.clone()
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let app = router(self.state);

        tracing::info!(
            service = "reconciliation-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, app).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
