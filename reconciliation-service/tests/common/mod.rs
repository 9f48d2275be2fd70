//! Common test utilities for reconciliation-service integration tests.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{TimeZone, Utc};
use reconciliation_service::config::{ReconciliationConfig, SepaConfig};
use reconciliation_service::sepa::{Creditor, PartyAccount};
use reconciliation_service::services::{InMemoryPaymentStore, PaymentStore};
use reconciliation_service::startup::Application;
use serde_json::Value;
use service_core::clock::FixedClock;
use service_core::config::Config as CommonConfig;
use std::sync::{Arc, Once};

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,reconciliation_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

fn test_config() -> ReconciliationConfig {
    ReconciliationConfig {
        common: CommonConfig { port: 0 },
        service_name: "reconciliation-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        default_currency: "EUR".to_string(),
        max_upload_bytes: 1024 * 1024,
        sepa: SepaConfig {
            creditor: Some(Creditor {
                account: PartyAccount {
                    name: "Fundacion Ejemplo".to_string(),
                    iban: "ES9121000418450200051332".to_string(),
                    bic: "CAIXESBBXXX".to_string(),
                },
                scheme_id: "ES12ZZZ12345678".to_string(),
            }),
            initiating_party: None,
        },
    }
}

/// Test application wrapper.
#[allow(dead_code)]
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: reqwest::Client,
    pub store: Arc<dyn PaymentStore>,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .header("X-User-ID", "u-test")
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .header("X-User-ID", "u-test")
            .header("X-User-Name", "Test Treasurer")
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_anonymous(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Create a payment and return its JSON.
    pub async fn create_payment(&self, reference: &str, amount: &str, direction: &str) -> Value {
        let body = serde_json::json!({
            "reference": reference,
            "amount": amount,
            "currency": "EUR",
            "direction": direction,
            "payment_type": "direct_debit",
        });
        let response = self.post("/payments", &body).await;
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.expect("payment json")
    }
}

/// Spawn the service on a random port with a fixed clock.
pub async fn spawn_app() -> TestApp {
    init_tracing();

    let clock = Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2024, 12, 20, 10, 30, 0).unwrap(),
    ));
    let store: Arc<dyn PaymentStore> = Arc::new(InMemoryPaymentStore::new());
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

#[allow(dead_code)]
pub fn b64(content: &[u8]) -> String {
    STANDARD.encode(content)
}

/// Fixed-width line of `width` spaces with `fields` written at their offsets.
#[allow(dead_code)]
pub fn fixed_line(width: usize, fields: &[(usize, &str)]) -> String {
    let mut line = vec![' '; width];
    for (start, value) in fields {
        for (i, c) in value.chars().enumerate() {
            line[start + i] = c;
        }
    }
    line.into_iter().collect()
}

/// Norma 43 movement line: D/C indicator `1` debit, `2` credit.
#[allow(dead_code)]
pub fn n43_movement(dc: &str, cents: u64, reference: &str) -> String {
    fixed_line(
        80,
        &[
            (0, "22"),
            (16, "250115"),
            (27, dc),
            (28, &format!("{:012}", cents)),
            (50, reference),
        ],
    )
}

/// Norma 43 statement with header, movements, totals and end record.
#[allow(dead_code)]
pub fn n43_statement(movements: &[String], debit_cents: u64, credit_cents: u64) -> String {
    let mut lines = vec![fixed_line(80, &[(0, "11"), (47, "978")])];
    lines.extend(movements.iter().cloned());
    lines.push(fixed_line(
        80,
        &[
            (0, "33"),
            (25, &format!("{:014}", debit_cents)),
            (44, &format!("{:014}", credit_cents)),
            (73, "978"),
        ],
    ));
    lines.push(fixed_line(80, &[(0, "88")]));
    lines.join("\n")
}
