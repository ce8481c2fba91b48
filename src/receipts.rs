//! Receipt/screenshot scanning and confirmed-save endpoints.
//!
//! Scanning is not recovered on failure: the user gets a categorized,
//! human-readable detail and retries with a clearer image. Saving the
//! confirmed rows always succeeds or fails per normal validation.

use axum::{
    Json,
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::auth::get_current_user;
use crate::constants::*;
use crate::llm::{CompletionMessage, ContentPart, ImageUrl, LlmClient, MessageContent};
use crate::models::{
    ExtractedTransaction, SaveScannedPayload, SaveScannedResponse, ScanReceiptResponse,
    ScannedItem,
};
use crate::transactions::{insert_transaction, validate_amount};
use crate::utils::{resolve_category, today, validate_date};
use crate::AppState;

// ---------------------------------------------------------------------------
// POST /api/receipts/scan
// ---------------------------------------------------------------------------

pub async fn scan_receipt(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ScanReceiptResponse>), (StatusCode, String)> {
    get_current_user(&state, &headers)?;

    let mut image: Option<(Vec<u8>, String)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid upload.".to_string()))?
    {
        if field.name() == Some("receipt") {
            let mime = field.content_type().unwrap_or("").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid upload.".to_string()))?;
            image = Some((bytes.to_vec(), mime));
            break;
        }
    }

    let Some((bytes, mime)) = image else {
        return Err((
            StatusCode::BAD_REQUEST,
            "No image file uploaded.".to_string(),
        ));
    };

    if !ALLOWED_RECEIPT_TYPES.contains(&mime.as_str()) {
        return Err((
            StatusCode::BAD_REQUEST,
            "Invalid file type. Please upload a JPEG, PNG, WebP, or GIF image.".to_string(),
        ));
    }
    if bytes.len() > MAX_RECEIPT_BYTES {
        return Err((
            StatusCode::BAD_REQUEST,
            "File too large. Maximum size is 5 MB.".to_string(),
        ));
    }

    let Some(llm) = state.llm.clone() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "Receipt scanning is not configured.".to_string(),
        ));
    };

    let category_names = state.category_cache.get(&state.main_db).await?;

    let extracted = extract_transactions(&llm, &bytes, &mime, &category_names)
        .await
        .map_err(|message| (StatusCode::UNPROCESSABLE_ENTITY, message))?;

    Ok((
        StatusCode::OK,
        Json(ScanReceiptResponse {
            success: true,
            extracted,
        }),
    ))
}

async fn extract_transactions(
    llm: &LlmClient,
    bytes: &[u8],
    mime: &str,
    category_names: &[String],
) -> Result<Vec<ExtractedTransaction>, String> {
    let data_url = format!("data:{};base64,{}", mime, BASE64.encode(bytes));

    let prompt = format!(
        "Extract ALL transactions from this receipt/screenshot as a JSON array.\n\
         Each object: {{\"amount\":<number>,\"description\":\"<string>\",\
         \"date\":\"<YYYY-MM-DD|null>\",\"category\":\"<one of: {}>\",\
         \"type\":\"<debit|credit>\"}}\n\
         Rules: JSON array only, no markdown. Single txn = array of 1. \
         \"+\"/green = credit, \"-\"/red/plain = debit. Unknown fields: null or 0. \
         No transactions found: [{{\"error\":\"No transactions found\"}}]",
        category_names.join(",")
    );

    let messages = vec![CompletionMessage {
        role: "user".to_string(),
        content: MessageContent::Parts(vec![
            ContentPart::Text { text: prompt },
            ContentPart::ImageUrl {
                image_url: ImageUrl { url: data_url },
            },
        ]),
    }];

    let reply = llm
        .chat(VISION_MODEL, messages, 1024, 0.0)
        .await
        .map_err(|err| {
            tracing::error!("receipt scan failed: {}", err);
            err.to_string()
        })?;

    // The model sometimes wraps its reply in markdown fences.
    let cleaned = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let parsed: serde_json::Value = serde_json::from_str(cleaned)
        .map_err(|_| "AI returned an unreadable response. Try a clearer image.".to_string())?;

    let items = match parsed {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    };

    if items.len() == 1 {
        if let Some(error) = items[0].get("error").and_then(|e| e.as_str()) {
            return Err(error.to_string());
        }
    }

    let extracted: Vec<ExtractedTransaction> = items
        .into_iter()
        .filter(|item| item.get("error").is_none())
        .map(|item| {
            let category = item
                .get("category")
                .and_then(|c| c.as_str())
                .and_then(|raw| {
                    category_names
                        .iter()
                        .find(|name| name.eq_ignore_ascii_case(raw))
                })
                .cloned()
                .unwrap_or_else(|| FALLBACK_CATEGORY.to_string());

            ExtractedTransaction {
                amount: item
                    .get("amount")
                    .and_then(|a| a.as_f64())
                    .map(f64::abs)
                    .unwrap_or(0.0),
                description: item
                    .get("description")
                    .and_then(|d| d.as_str())
                    .unwrap_or("Unknown")
                    .to_string(),
                date: item
                    .get("date")
                    .and_then(|d| d.as_str())
                    .map(|d| d.to_string()),
                category,
                kind: match item.get("type").and_then(|t| t.as_str()) {
                    Some("credit") => "credit".to_string(),
                    _ => "debit".to_string(),
                },
            }
        })
        .collect();

    if extracted.is_empty() {
        return Err("Could not extract any transactions from this image.".to_string());
    }

    Ok(extracted)
}

// ---------------------------------------------------------------------------
// POST /api/receipts/save
// ---------------------------------------------------------------------------

/// Save one or many confirmed/edited transactions from a scan.
pub async fn save_scanned(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SaveScannedPayload>,
) -> Result<(StatusCode, Json<SaveScannedResponse>), (StatusCode, String)> {
    let claims = get_current_user(&state, &headers)?;

    let items = payload.transactions.unwrap_or_else(|| {
        vec![ScannedItem {
            amount: payload.amount,
            description: payload.description,
            date: payload.date,
            category: payload.category,
        }]
    });

    let mut saved = Vec::new();
    for item in items {
        let (Some(amount), Some(description)) = (item.amount, item.description) else {
            continue;
        };
        if validate_amount(amount).is_err() || description.trim().is_empty() {
            continue;
        }
        let date = match item.date {
            Some(ref date) if !date.trim().is_empty() => {
                validate_date(date)?;
                date.trim().to_string()
            }
            _ => today(),
        };

        let category_name = item.category.as_deref().unwrap_or(FALLBACK_CATEGORY);
        let category = resolve_category(&state.main_db, category_name).await?;

        let transaction = insert_transaction(
            &state.main_db,
            &claims.sub,
            amount,
            description.trim(),
            &date,
            true,
            &category,
        )
        .await?;
        saved.push(transaction);
    }

    if saved.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "No valid transactions to save.".to_string(),
        ));
    }

    state.summary_cache.invalidate(&claims.sub).await;

    let first = saved[0].clone();
    Ok((
        StatusCode::CREATED,
        Json(SaveScannedResponse {
            success: true,
            transactions: saved,
            transaction: first,
        }),
    ))
}
