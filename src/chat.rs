//! Conversational financial coach.
//!
//! Token-budget conscious: the prompt carries a compact spending summary
//! (cached per user for 2 minutes), history is trimmed to the last 6
//! messages, and replies are capped. LLM failures surface as a friendly
//! fallback reply, never as an error response.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use std::collections::HashMap;

use crate::AppState;
use crate::auth::get_current_user;
use crate::constants::*;
use crate::llm::CompletionMessage;
use crate::models::{ChatPayload, ChatResponse, Transaction};
use crate::transactions::list_transactions;

const FALLBACK_REPLY: &str =
    "Sorry, I'm having trouble right now. Please try again in a moment.";

/// Compact one-line summary of recent spending.
pub fn build_spending_summary(transactions: &[Transaction]) -> String {
    if transactions.is_empty() {
        return "No transactions yet.".to_string();
    }

    let total: f64 = transactions.iter().map(|t| t.amount).sum();

    let mut by_category: HashMap<&str, f64> = HashMap::new();
    for t in transactions {
        *by_category.entry(t.category.name.as_str()).or_insert(0.0) += t.amount;
    }
    let mut breakdown: Vec<(&str, f64)> = by_category.into_iter().collect();
    breakdown.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let breakdown = breakdown
        .iter()
        .map(|(cat, amt)| format!("{}:₹{}", cat, amt.round() as i64))
        .collect::<Vec<_>>()
        .join(", ");

    let now = time::OffsetDateTime::now_utc().date();
    let month_prefix = format!("{:04}-{:02}", now.year(), u8::from(now.month()));
    let this_month: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.date.starts_with(&month_prefix))
        .collect();
    let monthly_total: f64 = this_month.iter().map(|t| t.amount).sum();

    format!(
        "Txns:{} | Total:₹{} | This month:₹{}({} txns) | By category: {}",
        transactions.len(),
        total.round() as i64,
        monthly_total.round() as i64,
        this_month.len(),
        breakdown
    )
}

/// Spending summary for a user, cached for the TTL window. Writes to the
/// user's transactions invalidate the entry, so a post-write read here is
/// always fresh.
pub async fn get_summary(
    state: &AppState,
    user_id: &str,
) -> Result<String, (StatusCode, String)> {
    if let Some(cached) = state.summary_cache.get(user_id).await {
        return Ok(cached);
    }

    let transactions =
        list_transactions(&state.main_db, user_id, Some(SUMMARY_TRANSACTION_LIMIT)).await?;
    let summary = build_spending_summary(&transactions);
    state.summary_cache.put(user_id, summary.clone()).await;
    Ok(summary)
}

// ---------------------------------------------------------------------------
// POST /api/chat
// ---------------------------------------------------------------------------

pub async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ChatPayload>,
) -> Result<(StatusCode, Json<ChatResponse>), (StatusCode, String)> {
    let claims = get_current_user(&state, &headers)?;

    if payload.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Message cannot be empty.".to_string(),
        ));
    }

    let summary = get_summary(&state, &claims.sub).await?;

    let reply = match &state.llm {
        Some(llm) => {
            let mut messages = vec![CompletionMessage::system(format!(
                "You are a concise financial coach. User's data: {}\n\
                 Rules: Use ₹(INR). 2-3 sentences max. Be specific with numbers \
                 from the data. Be encouraging but honest.",
                summary
            ))];

            let history = payload.history.unwrap_or_default();
            let start = history.len().saturating_sub(MAX_CHAT_HISTORY);
            for message in &history[start..] {
                if message.role == "user" {
                    messages.push(CompletionMessage::user(message.content.clone()));
                } else {
                    messages.push(CompletionMessage::assistant(message.content.clone()));
                }
            }
            messages.push(CompletionMessage::user(payload.message.clone()));

            match llm.chat(CHAT_MODEL, messages, CHAT_MAX_TOKENS, 0.7).await {
                Ok(reply) => reply,
                Err(err) => {
                    tracing::warn!("coach chat failed: {}", err);
                    FALLBACK_REPLY.to_string()
                }
            }
        }
        None => FALLBACK_REPLY.to_string(),
    };

    Ok((
        StatusCode::OK,
        Json(ChatResponse {
            success: true,
            reply,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn txn(amount: f64, category: &str, date: &str) -> Transaction {
        Transaction {
            id: "t".to_string(),
            amount,
            description: "d".to_string(),
            date: date.to_string(),
            is_ai_identified: false,
            category: Category {
                id: "c".to_string(),
                name: category.to_string(),
                icon: "x".to_string(),
            },
        }
    }

    #[test]
    fn empty_summary() {
        assert_eq!(build_spending_summary(&[]), "No transactions yet.");
    }

    #[test]
    fn summary_totals_and_breakdown() {
        let transactions = vec![
            txn(100.0, "Food", "2001-01-01"),
            txn(300.0, "Transport", "2001-01-02"),
            txn(50.0, "Food", "2001-01-03"),
        ];
        let summary = build_spending_summary(&transactions);

        assert!(summary.starts_with("Txns:3 | Total:₹450"));
        // Breakdown sorted by amount descending.
        let transport_pos = summary.find("Transport:₹300").unwrap();
        let food_pos = summary.find("Food:₹150").unwrap();
        assert!(transport_pos < food_pos);
        // Old dates never count toward the current month.
        assert!(summary.contains("This month:₹0(0 txns)"));
    }
}
