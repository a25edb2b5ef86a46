//! Line Routes
//!
//! - GET /lines/:index - Record `index` (0-based) of the served file, as text

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;

/// GET /lines/:index
///
/// 200 with the raw record bytes. Negative and past-end indices are 413.
pub async fn get_line(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> ApiResult<Response> {
    let index = parse_index(&raw)?;

    let record = tokio::time::timeout(state.request_timeout, state.service.fetch_record(index))
        .await
        .map_err(|_| ApiError::Timeout(state.request_timeout))??;

    match record {
        Some(bytes) => Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            bytes,
        )
            .into_response()),
        None => Err(ApiError::OutOfRange),
    }
}

/// Integers beyond i64 are out of range, anything else non-numeric is invalid
fn parse_index(raw: &str) -> ApiResult<i64> {
    if let Ok(index) = raw.parse::<i64>() {
        return Ok(index);
    }

    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::OutOfRange);
    }

    Err(ApiError::InvalidIndex(raw.to_string()))
}
