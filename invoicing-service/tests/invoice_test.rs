//! Invoice CRUD and outgoing lifecycle integration tests.

mod common;

use common::spawn_app;
use serde_json::{json, Value};

#[tokio::test]
async fn health_and_metrics_endpoints_respond() {
    let app = spawn_app().await;
    assert_eq!(app.get("/health").await.status().as_u16(), 200);
    assert_eq!(app.get("/ready").await.status().as_u16(), 200);
    app.create_invoice("M-1", "outgoing").await;

    let response = app.get("/metrics").await;
    assert_eq!(response.status().as_u16(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("invoicing_invoices_total"));
}

#[tokio::test]
async fn create_invoice_starts_as_draft() {
    let app = spawn_app().await;
    let invoice = app.create_invoice("FR-2025-001", "incoming").await;

    assert_eq!(invoice["status"], "draft");
    assert_eq!(invoice["currency"], "EUR");
    assert_eq!(invoice["amount"], "1250.00");
    assert!(invoice["approval_workflow"].is_null());
    assert_eq!(invoice["audit_trail"][0]["action"], "invoice_created");
    assert_eq!(invoice["audit_trail"][0]["actor"], "u-clerk");

    let id = invoice["id"].as_str().unwrap();
    let fetched: Value = app
        .get(&format!("/invoices/{}", id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(fetched, invoice);
}

#[tokio::test]
async fn invalid_invoice_requests_are_rejected() {
    let app = spawn_app().await;
    let response = app
        .post(
            "/invoices",
            &json!({ "number": "", "counterparty": "X", "amount": "10", "direction": "incoming" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 422);

    let response = app
        .post(
            "/invoices",
            &json!({ "number": "F-1", "counterparty": "X", "amount": "-5", "direction": "incoming" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 422);

    let response = app
        .post_anonymous(
            "/invoices",
            &json!({ "number": "F-2", "counterparty": "X", "amount": "5", "direction": "incoming" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn duplicate_number_is_a_conflict() {
    let app = spawn_app().await;
    app.create_invoice("FV-7", "outgoing").await;
    let response = app
        .post(
            "/invoices",
            &json!({ "number": "FV-7", "counterparty": "Y", "amount": "1", "direction": "outgoing" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);

    // same number on the other track is a different invoice
    app.create_invoice("FV-7", "incoming").await;
}

#[tokio::test]
async fn outgoing_invoice_is_submitted_verified_and_sent() {
    let app = spawn_app().await;
    let invoice = app.create_invoice("FV-2025-010", "outgoing").await;
    let id = invoice["id"].as_str().unwrap();

    let response = app.post(&format!("/invoices/{}/send", id), &json!({})).await;
    assert_eq!(response.status().as_u16(), 409);

    for (step, status) in [("submit", "submitted"), ("verify", "verified"), ("send", "sent")] {
        let response = app
            .post(&format!("/invoices/{}/{}", id, step), &json!({}))
            .await;
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], status);
    }

    let audit: Value = app
        .get(&format!("/invoices/{}/audit", id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(audit.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn list_filters_by_direction_and_status() {
    let app = spawn_app().await;
    app.create_invoice("A-1", "incoming").await;
    app.create_invoice("A-2", "outgoing").await;
    app.pending_invoice("A-3", 1).await;

    let incoming: Vec<Value> = app
        .get("/invoices?direction=incoming")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(incoming.len(), 2);

    let pending: Vec<Value> = app
        .get("/invoices?status=pending_approval")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["number"], "A-3");
}

#[tokio::test]
async fn unknown_invoice_is_not_found() {
    let app = spawn_app().await;
    let response = app
        .get("/invoices/00000000-0000-0000-0000-000000000000")
        .await;
    assert_eq!(response.status().as_u16(), 404);
}
