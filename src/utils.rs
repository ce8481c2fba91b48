use axum::http::StatusCode;

use crate::Db;
use crate::constants::*;
use crate::models::Category;

pub fn db_error() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ERR_DATABASE_OPERATION.to_string(),
    )
}

pub fn db_error_with_context(context: &str) -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Database error: {}", context),
    )
}

pub fn validate_string_length(
    value: &str,
    field_name: &str,
    max_length: usize,
) -> Result<(), (StatusCode, String)> {
    if value.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("{} cannot be empty", field_name),
        ));
    }
    if value.len() > max_length {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("{} must be less than {} characters", field_name, max_length),
        ));
    }
    Ok(())
}

pub fn validate_date(value: &str) -> Result<(), (StatusCode, String)> {
    if value.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Date cannot be empty".to_string()));
    }

    let format = time::format_description::parse("[year]-[month]-[day]")
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid date format".to_string()))?;

    time::Date::parse(value.trim(), &format)
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid date format".to_string()))?;

    Ok(())
}

/// Today's date as a YYYY-MM-DD string (UTC).
pub fn today() -> String {
    let date = time::OffsetDateTime::now_utc().date();
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

pub fn extract_category_from_row(row: libsql::Row) -> Result<Category, (StatusCode, String)> {
    let id: String = row
        .get(0)
        .map_err(|_| db_error_with_context("invalid category data"))?;
    let name: String = row
        .get(1)
        .map_err(|_| db_error_with_context("invalid category data"))?;
    let icon: String = row
        .get(2)
        .map_err(|_| db_error_with_context("invalid category data"))?;

    Ok(Category { id, name, icon })
}

/// Look up a category by name; unknown names fall back to "Other".
pub async fn resolve_category(
    db: &Db,
    name: &str,
) -> Result<Category, (StatusCode, String)> {
    let conn = db.read().await;

    let mut rows = conn
        .query(
            "SELECT id, name, icon FROM categories WHERE name = ?",
            [name],
        )
        .await
        .map_err(|_| db_error_with_context("failed to query category"))?;

    if let Some(row) = rows.next().await.map_err(|_| db_error())? {
        return extract_category_from_row(row);
    }

    let mut rows = conn
        .query(
            "SELECT id, name, icon FROM categories WHERE name = ?",
            [FALLBACK_CATEGORY],
        )
        .await
        .map_err(|_| db_error_with_context("failed to query fallback category"))?;

    match rows.next().await.map_err(|_| db_error())? {
        Some(row) => extract_category_from_row(row),
        None => Err(db_error_with_context("fallback category missing")),
    }
}
