/// Receipt scan upload contract, confirmed-save validation, and the
/// coach chat endpoint. No LLM is configured in the harness, so these
/// exercise the degraded paths and the validation that runs before any
/// model call.
mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;

use common::{TestApp, json_get, json_post, register_user, setup_test_app};

const BOUNDARY: &str = "xYzZY-test-boundary";

fn multipart_body(field_name: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"upload.png\"\r\n",
            field_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

async fn upload_scan(
    app: &TestApp,
    token: &str,
    field_name: &str,
    content_type: &str,
    bytes: &[u8],
) -> anyhow::Result<common::ApiResponse> {
    let request = Request::builder()
        .method("POST")
        .uri("/api/receipts/scan")
        .header("authorization", format!("Bearer {}", token))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(field_name, content_type, bytes)))?;
    common::run_request(app, request).await
}

// ---------------------------------------------------------------------------
// POST /api/receipts/scan
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scan_requires_the_receipt_field() {
    let app = setup_test_app().await.expect("setup");
    let (token, _) = register_user(&app, "a@x.com", "secret1").await.expect("register");

    // A file under any other field name is ignored.
    let response = upload_scan(&app, &token, "image", "image/png", b"fake-png")
        .await
        .expect("upload");
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body.as_str(), Some("No image file uploaded."));
}

#[tokio::test]
async fn scan_rejects_non_image_uploads() {
    let app = setup_test_app().await.expect("setup");
    let (token, _) = register_user(&app, "a@x.com", "secret1").await.expect("register");

    let response = upload_scan(&app, &token, "receipt", "text/plain", b"not an image")
        .await
        .expect("upload");
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body.as_str(),
        Some("Invalid file type. Please upload a JPEG, PNG, WebP, or GIF image.")
    );
}

#[tokio::test]
async fn scan_without_llm_is_unavailable() {
    let app = setup_test_app().await.expect("setup");
    let (token, _) = register_user(&app, "a@x.com", "secret1").await.expect("register");

    // A well-formed upload gets past validation and hits the missing
    // service.
    let response = upload_scan(&app, &token, "receipt", "image/png", b"fake-png")
        .await
        .expect("upload");
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        response.body.as_str(),
        Some("Receipt scanning is not configured.")
    );
}

// ---------------------------------------------------------------------------
// POST /api/receipts/save
// ---------------------------------------------------------------------------

#[tokio::test]
async fn save_skips_invalid_entries_and_marks_rows_ai_identified() {
    let app = setup_test_app().await.expect("setup");
    let (token, _) = register_user(&app, "a@x.com", "secret1").await.expect("register");

    let response = json_post(
        &app,
        "/api/receipts/save",
        Some(&token),
        None,
        json!({
            "transactions": [
                { "amount": 120.5, "description": "Dinner at cafe", "date": "2024-03-01", "category": "Food" },
                { "amount": 0, "description": "zero amount is dropped" },
                { "description": "no amount at all" },
                { "amount": 80, "description": "   " },
                { "amount": 60, "description": "Metro card", "category": "Transport" }
            ]
        }),
    )
    .await
    .expect("save");

    assert_eq!(response.status, StatusCode::CREATED);
    let saved = response.body["transactions"].as_array().expect("array");
    assert_eq!(saved.len(), 2);
    for transaction in saved {
        assert_eq!(transaction["isAIIdentified"], true);
    }
    assert_eq!(saved[0]["category"]["name"], "Food");
    assert_eq!(saved[1]["category"]["name"], "Transport");

    // The skipped entries never reached the database.
    let listed = json_get(&app, "/api/transactions", Some(&token)).await.expect("list");
    assert_eq!(listed.body["count"], 2);
}

#[tokio::test]
async fn save_with_nothing_valid_is_rejected() {
    let app = setup_test_app().await.expect("setup");
    let (token, _) = register_user(&app, "a@x.com", "secret1").await.expect("register");

    let response = json_post(
        &app,
        "/api/receipts/save",
        Some(&token),
        None,
        json!({
            "transactions": [
                { "amount": -5, "description": "negative" },
                { "description": "missing amount" }
            ]
        }),
    )
    .await
    .expect("save");

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body.as_str(), Some("No valid transactions to save."));
}

#[tokio::test]
async fn save_accepts_a_single_object() {
    let app = setup_test_app().await.expect("setup");
    let (token, _) = register_user(&app, "a@x.com", "secret1").await.expect("register");

    let response = json_post(
        &app,
        "/api/receipts/save",
        Some(&token),
        None,
        json!({ "amount": 45, "description": "Parking", "category": "Transport" }),
    )
    .await
    .expect("save");

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["transaction"]["description"], "Parking");
    assert_eq!(response.body["transaction"]["isAIIdentified"], true);

    // An unknown category name resolves to the fallback row.
    let fallback = json_post(
        &app,
        "/api/receipts/save",
        Some(&token),
        None,
        json!({ "amount": 10, "description": "Mystery", "category": "Nonexistent" }),
    )
    .await
    .expect("save");
    assert_eq!(fallback.body["transaction"]["category"]["name"], "Other");
}

// ---------------------------------------------------------------------------
// POST /api/chat
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chat_rejects_empty_message() {
    let app = setup_test_app().await.expect("setup");
    let (token, _) = register_user(&app, "a@x.com", "secret1").await.expect("register");

    let response = json_post(
        &app,
        "/api/chat",
        Some(&token),
        None,
        json!({ "message": "   " }),
    )
    .await
    .expect("chat");

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body.as_str(), Some("Message cannot be empty."));
}

#[tokio::test]
async fn chat_answers_with_fallback_when_llm_is_absent() {
    let app = setup_test_app().await.expect("setup");
    let (token, _) = register_user(&app, "a@x.com", "secret1").await.expect("register");

    let response = json_post(
        &app,
        "/api/chat",
        Some(&token),
        None,
        json!({ "message": "How am I doing this month?" }),
    )
    .await
    .expect("chat");

    // Degraded service still answers 200 with the friendly reply.
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    assert_eq!(
        response.body["reply"],
        "Sorry, I'm having trouble right now. Please try again in a moment."
    );
}

#[tokio::test]
async fn chat_requires_authentication() {
    let app = setup_test_app().await.expect("setup");

    let response = json_post(&app, "/api/chat", None, None, json!({ "message": "hi" }))
        .await
        .expect("chat");
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}
