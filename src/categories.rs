use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use crate::AppState;
use crate::auth::get_current_user;
use crate::models::GetCategoriesResponse;
use crate::utils::{db_error, db_error_with_context, extract_category_from_row};

/// GET /api/categories: the reference category set for dropdowns and charts.
pub async fn get_categories(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<GetCategoriesResponse>), (StatusCode, String)> {
    get_current_user(&state, &headers)?;

    let conn = state.main_db.read().await;
    let mut rows = conn
        .query("SELECT id, name, icon FROM categories ORDER BY name ASC", ())
        .await
        .map_err(|_| db_error_with_context("failed to query categories"))?;

    let mut categories = Vec::new();
    while let Some(row) = rows.next().await.map_err(|_| db_error())? {
        categories.push(extract_category_from_row(row)?);
    }

    Ok((
        StatusCode::OK,
        Json(GetCategoriesResponse {
            success: true,
            categories,
        }),
    ))
}
