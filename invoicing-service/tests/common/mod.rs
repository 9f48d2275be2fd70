//! Common test utilities for invoicing-service integration tests.

use chrono::{TimeZone, Utc};
use invoicing_service::config::InvoicingConfig;
use invoicing_service::services::{InMemoryInvoiceStore, InvoiceStore};
use invoicing_service::startup::Application;
use serde_json::{json, Value};
use service_core::clock::FixedClock;
use service_core::config::Config as CommonConfig;
use std::sync::{Arc, Once};

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,invoicing_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

fn test_config() -> InvoicingConfig {
    InvoicingConfig {
        common: CommonConfig { port: 0 },
        service_name: "invoicing-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        default_currency: "EUR".to_string(),
        max_approval_levels: 3,
    }
}

/// Test application wrapper.
#[allow(dead_code)]
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: reqwest::Client,
    pub store: Arc<dyn InvoiceStore>,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .header("X-User-ID", "u-clerk")
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// POST as the given user.
    pub async fn post_as(&self, user_id: &str, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .header("X-User-ID", user_id)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, body: &Value) -> reqwest::Response {
        self.post_as("u-clerk", path, body).await
    }

    pub async fn post_anonymous(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Create an invoice and return its JSON.
    pub async fn create_invoice(&self, number: &str, direction: &str) -> Value {
        let body = json!({
            "number": number,
            "counterparty": "Suministros Levante SL",
            "amount": "1250.00",
            "direction": direction,
            "due_date": "2025-04-30",
        });
        let response = self.post("/invoices", &body).await;
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.expect("invoice json")
    }

    /// Create an incoming invoice and open an approval workflow of `levels`
    /// unassigned levels. Returns the invoice id.
    pub async fn pending_invoice(&self, number: &str, levels: usize) -> String {
        let invoice = self.create_invoice(number, "incoming").await;
        let id = invoice["id"].as_str().expect("invoice id").to_string();
        let approvers: Vec<Value> = (1..=levels)
            .map(|i| json!({ "name": format!("Approver {}", i) }))
            .collect();
        let response = self
            .post(
                &format!("/invoices/{}/submit-for-approval", id),
                &json!({ "approvers": approvers }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 200);
        id
    }
}

/// Spawn the service on a random port with a fixed clock.
pub async fn spawn_app() -> TestApp {
    init_tracing();

    let clock = Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2025, 3, 3, 9, 15, 0).unwrap(),
    ));
    let store: Arc<dyn InvoiceStore> = Arc::new(InMemoryInvoiceStore::new());
    let app = Application::build_with(test_config(), store.clone(), clock)
        .await
        .expect("Failed to build application");

    let port = app.port();
    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        port,
        client: reqwest::Client::new(),
        store,
    }
}
