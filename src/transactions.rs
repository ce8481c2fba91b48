use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use uuid::Uuid;

use crate::auth::get_current_user;
use crate::classify;
use crate::constants::*;
use crate::models::{
    Category, ClearTransactionsResponse, CreateTransactionPayload, GetTransactionsResponse,
    Transaction, TransactionResponse,
};
use crate::utils::{
    db_error, db_error_with_context, resolve_category, today, validate_date,
    validate_string_length,
};
use crate::{AppState, Db};

pub fn validate_amount(amount: f64) -> Result<(), (StatusCode, String)> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Amount must be a positive number.".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), (StatusCode, String)> {
    validate_string_length(description, "Description", MAX_DESCRIPTION_LENGTH)
}

/// Insert a transaction row for a user with an already-resolved category.
pub async fn insert_transaction(
    db: &Db,
    user_id: &str,
    amount: f64,
    description: &str,
    date: &str,
    is_ai_identified: bool,
    category: &Category,
) -> Result<Transaction, (StatusCode, String)> {
    let transaction_id = Uuid::new_v4().to_string();

    let conn = db.write().await;
    conn.execute(
        "INSERT INTO transactions (id, amount, description, date, is_ai_identified, user_id, category_id) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        (
            transaction_id.as_str(),
            amount,
            description,
            date,
            is_ai_identified,
            user_id,
            category.id.as_str(),
        ),
    )
    .await
    .map_err(|_| db_error_with_context("transaction creation failed"))?;

    Ok(Transaction {
        id: transaction_id,
        amount,
        description: description.to_string(),
        date: date.to_string(),
        is_ai_identified,
        category: category.clone(),
    })
}

// ---------------------------------------------------------------------------
// POST /api/transactions
// ---------------------------------------------------------------------------

pub async fn create_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateTransactionPayload>,
) -> Result<(StatusCode, Json<TransactionResponse>), (StatusCode, String)> {
    let claims = get_current_user(&state, &headers)?;

    validate_amount(payload.amount)?;
    validate_description(&payload.description)?;
    if let Some(ref date) = payload.date {
        validate_date(date)?;
    }

    let description = payload.description.trim().to_string();
    let date = payload
        .date
        .map(|d| d.trim().to_string())
        .unwrap_or_else(today);

    // Keyword or LLM classification; any failure resolves to "Other".
    let category_name = classify::classify(&state, &description).await;
    let category = resolve_category(&state.main_db, &category_name).await?;
    let is_ai_identified = category_name != FALLBACK_CATEGORY;

    let transaction = insert_transaction(
        &state.main_db,
        &claims.sub,
        payload.amount,
        &description,
        &date,
        is_ai_identified,
        &category,
    )
    .await?;

    // Next summary read must see this write.
    state.summary_cache.invalidate(&claims.sub).await;

    Ok((
        StatusCode::CREATED,
        Json(TransactionResponse {
            success: true,
            transaction,
        }),
    ))
}

// ---------------------------------------------------------------------------
// GET /api/transactions
// ---------------------------------------------------------------------------

pub async fn get_transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<GetTransactionsResponse>), (StatusCode, String)> {
    let claims = get_current_user(&state, &headers)?;

    let transactions = list_transactions(&state.main_db, &claims.sub, None).await?;

    Ok((
        StatusCode::OK,
        Json(GetTransactionsResponse {
            success: true,
            count: transactions.len(),
            transactions,
        }),
    ))
}

/// Newest-first transactions for a user, category embedded.
pub async fn list_transactions(
    db: &Db,
    user_id: &str,
    limit: Option<u32>,
) -> Result<Vec<Transaction>, (StatusCode, String)> {
    let conn = db.read().await;

    let query = "SELECT t.id, t.amount, t.description, t.date, t.is_ai_identified, \
                        c.id, c.name, c.icon \
                 FROM transactions t JOIN categories c ON t.category_id = c.id \
                 WHERE t.user_id = ? ORDER BY t.date DESC LIMIT ?";
    let limit = limit.map(i64::from).unwrap_or(-1);

    let mut rows = conn
        .query(query, (user_id, limit))
        .await
        .map_err(|_| db_error_with_context("failed to query transactions"))?;

    let mut transactions = Vec::new();
    while let Some(row) = rows.next().await.map_err(|_| db_error())? {
        transactions.push(extract_transaction_from_row(row)?);
    }
    Ok(transactions)
}

fn extract_transaction_from_row(row: libsql::Row) -> Result<Transaction, (StatusCode, String)> {
    let invalid = || db_error_with_context("invalid transaction data");

    let id: String = row.get(0).map_err(|_| invalid())?;
    let amount: f64 = row.get(1).map_err(|_| invalid())?;
    let description: String = row.get(2).map_err(|_| invalid())?;
    let date: String = row.get(3).map_err(|_| invalid())?;
    let is_ai_identified: bool = row.get(4).map_err(|_| invalid())?;
    let category_id: String = row.get(5).map_err(|_| invalid())?;
    let category_name: String = row.get(6).map_err(|_| invalid())?;
    let category_icon: String = row.get(7).map_err(|_| invalid())?;

    Ok(Transaction {
        id,
        amount,
        description,
        date,
        is_ai_identified,
        category: Category {
            id: category_id,
            name: category_name,
            icon: category_icon,
        },
    })
}

// ---------------------------------------------------------------------------
// DELETE /api/transactions/all
// ---------------------------------------------------------------------------

pub async fn clear_all_transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<ClearTransactionsResponse>), (StatusCode, String)> {
    let claims = get_current_user(&state, &headers)?;

    let count = {
        let conn = state.main_db.write().await;
        conn.execute(
            "DELETE FROM transactions WHERE user_id = ?",
            [claims.sub.as_str()],
        )
        .await
        .map_err(|_| db_error_with_context("failed to clear transactions"))?
    };

    state.summary_cache.invalidate(&claims.sub).await;

    Ok((
        StatusCode::OK,
        Json(ClearTransactionsResponse {
            success: true,
            message: format!("Deleted {} transactions.", count),
            count,
        }),
    ))
}

// ---------------------------------------------------------------------------
// DELETE /api/transactions/{id}
// ---------------------------------------------------------------------------

pub async fn delete_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(transaction_id): Path<String>,
) -> Result<(StatusCode, Json<serde_json::Value>), (StatusCode, String)> {
    let claims = get_current_user(&state, &headers)?;

    // Ownership check before deletion: a mismatched owner is forbidden,
    // a missing id is not-found.
    let owner_id: Option<String> = {
        let conn = state.main_db.read().await;
        let mut rows = conn
            .query(
                "SELECT user_id FROM transactions WHERE id = ?",
                [transaction_id.as_str()],
            )
            .await
            .map_err(|_| db_error_with_context("failed to query transaction"))?;

        match rows.next().await.map_err(|_| db_error())? {
            Some(row) => Some(row.get(0).map_err(|_| db_error())?),
            None => None,
        }
    };

    let owner_id = owner_id
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Transaction not found.".to_string()))?;

    if owner_id != claims.sub {
        return Err((
            StatusCode::FORBIDDEN,
            "You are not authorized to delete this transaction.".to_string(),
        ));
    }

    {
        let conn = state.main_db.write().await;
        conn.execute(
            "DELETE FROM transactions WHERE id = ?",
            [transaction_id.as_str()],
        )
        .await
        .map_err(|_| db_error_with_context("failed to delete transaction"))?;
    }

    state.summary_cache.invalidate(&claims.sub).await;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "message": "Transaction deleted."
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_validation() {
        assert!(validate_amount(250.0).is_ok());
        assert!(validate_amount(0.01).is_ok());
        assert!(validate_amount(0.0).is_err());
        assert!(validate_amount(-5.0).is_err());
        assert!(validate_amount(f64::NAN).is_err());
        assert!(validate_amount(f64::INFINITY).is_err());
    }

    #[test]
    fn description_validation() {
        assert!(validate_description("Zomato order").is_ok());
        assert!(validate_description("   ").is_err());
        assert!(validate_description(&"x".repeat(300)).is_err());
    }
}
