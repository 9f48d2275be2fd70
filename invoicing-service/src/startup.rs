//! Application startup and lifecycle management.

use crate::config::InvoicingConfig;
use crate::handlers::{self, health_check, metrics_handler, readiness_check};
use crate::services::{init_metrics, InMemoryInvoiceStore, InvoiceStore};
use axum::{
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
    pub config: InvoicingConfig,
    pub store: Arc<dyn InvoiceStore>,
    pub clock: SharedClock,
}

pub fn router(state: AppState) -> Router {
    use handlers::invoices;

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .route(
            "/invoices",
            post(invoices::create_invoice).get(invoices::list_invoices),
        )
        .route("/invoices/:id", get(invoices::get_invoice))
        .route("/invoices/:id/audit", get(invoices::invoice_audit))
        .route(
            "/invoices/:id/submit-for-approval",
            post(invoices::submit_for_approval),
        )
        .route(
            "/invoices/:id/approvals/:level/approve",
            post(invoices::approve),
        )
        .route(
            "/invoices/:id/approvals/:level/reject",
            post(invoices::reject),
        )
        .route("/invoices/:id/submit", post(invoices::submit))
        .route("/invoices/:id/verify", post(invoices::verify))
        .route("/invoices/:id/send", post(invoices::send))
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
    pub async fn build(config: InvoicingConfig) -> Result<Self, AppError> {
        Self::build_with(config, Arc::new(InMemoryInvoiceStore::new()), system_clock()).await
    }

    /// Build with an explicit store and clock.
    pub async fn build_with(
        config: InvoicingConfig,
        store: Arc<dyn InvoiceStore>,
        clock: SharedClock,
    ) -> Result<Self, AppError> {
        init_metrics();

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Invoicing service listener bound");

        Ok(Self {
            port,
            listener,
            state: AppState {
                config,
                store,
                clock,
            },
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let app = router(self.state);

        tracing::info!(
            service = "invoicing-service",
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
