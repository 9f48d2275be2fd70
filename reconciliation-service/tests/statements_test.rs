//! Integration tests for bank file parsing over HTTP.

mod common;

use common::{b64, fixed_line, n43_movement, n43_statement, spawn_app};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::str::FromStr;

fn decimal(v: &Value) -> Decimal {
    Decimal::from_str(v.as_str().expect("decimal as string")).unwrap()
}

#[tokio::test]
async fn health_and_metrics_endpoints_respond() {
    let app = spawn_app().await;
    assert_eq!(app.get("/health").await.status().as_u16(), 200);
    assert_eq!(app.get("/ready").await.status().as_u16(), 200);

    let response = app.get("/metrics").await;
    assert_eq!(response.status().as_u16(), 200);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn norma43_two_movements_are_summarized() {
    let app = spawn_app().await;
    let content = n43_statement(
        &[
            n43_movement("2", 12345, "REF001"),
            n43_movement("1", 6789, "REF002"),
        ],
        6789,
        12345,
    );

    let response = app
        .post(
            "/statements/parse",
            &json!({ "filename": "extracto.asc", "content_base64": b64(content.as_bytes()) }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["format"], "norma43");
    let meta = &body["metadata"];
    assert_eq!(meta["total_transactions"], 2);
    assert_eq!(meta["credits"], 1);
    assert_eq!(meta["debits"], 1);
    assert_eq!(decimal(&meta["total_amount"]), dec!(191.34));
    assert_eq!(meta["skipped_lines"], 0);

    let credits = decimal(&meta["credit_total"]);
    let debits = decimal(&meta["debit_total"]);
    assert_eq!(credits - debits, decimal(&meta["control_sum"]));

    let movements = body["records"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|r| r["record_type"] == "transaction")
        .count();
    assert!(body["records"].as_array().unwrap().len() >= movements);
    assert_eq!(movements, 2);
}

#[tokio::test]
async fn norma43_latin1_narrative_is_decoded() {
    let app = spawn_app().await;
    let mut content = n43_statement(&[n43_movement("2", 5000, "REF-LAT")], 0, 5000).into_bytes();
    // complement line inserted after the movement, with an N-tilde in Latin-1
    let complement = {
        let mut line = b"2301".to_vec();
        line.extend_from_slice(b"CUOTA A\xD1O 2025");
        line.resize(80, b' ');
        line
    };
    let insert_at = 81 * 2;
    content.splice(insert_at..insert_at, complement.into_iter().chain(*b"\n"));

    let response = app
        .post(
            "/statements/parse",
            &json!({ "filename": "extracto.asc", "content_base64": b64(&content) }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    let movement = body["records"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["record_type"] == "transaction")
        .unwrap()
        .clone();
    assert_eq!(movement["narrative"], "CUOTA AÑO 2025");
}

#[tokio::test]
async fn empty_file_is_a_format_error() {
    let app = spawn_app().await;
    let response = app
        .post(
            "/statements/parse",
            &json!({ "filename": "extracto.asc", "content_base64": b64(b"") }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Norma 43 file is empty");

    let response = app
        .post(
            "/statements/parse",
            &json!({ "filename": "extracto.asc", "content_base64": b64(b"\n\n") }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Norma 43 file is empty");
}

#[tokio::test]
async fn wrong_prefix_is_a_format_error() {
    let app = spawn_app().await;
    let norma19 = fixed_line(80, &[(0, "5180")]);
    let response = app
        .post(
            "/statements/parse",
            &json!({
                "filename": "extracto.asc",
                "format": "norma43",
                "content_base64": b64(norma19.as_bytes())
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["error"],
        "Norma 43 file must start with \"11\", found \"51\""
    );
}

#[tokio::test]
async fn norma19_is_detected_from_txt_content() {
    let app = spawn_app().await;
    let content = [
        fixed_line(80, &[(0, "5180"), (66, "000000002500")]),
        fixed_line(
            148,
            &[
                (0, "5680"),
                (16, "RCB-1"),
                (88, "0000002500"),
                (98, "150125"),
                (108, "CUOTA"),
            ],
        ),
        fixed_line(108, &[(0, "5980"), (88, "0000002500"), (98, "0000000003")]),
    ]
    .join("\n");

    let response = app
        .post(
            "/statements/parse",
            &json!({ "filename": "remesa.txt", "content_base64": b64(content.as_bytes()) }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["format"], "norma19");
    assert_eq!(decimal(&body["metadata"]["control_sum"]), dec!(25.00));
    assert_eq!(body["metadata"]["total_transactions"], 1);
}

#[tokio::test]
async fn invalid_base64_is_rejected() {
    let app = spawn_app().await;
    let response = app
        .post(
            "/statements/parse",
            &json!({ "filename": "extracto.asc", "content_base64": "***" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
}
