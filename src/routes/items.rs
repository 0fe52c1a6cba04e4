use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::constants::{
    CACHE_CONTROL_PRIVATE, ERR_INVALID_CATEGORY, ERR_INVALID_TITLE, MAX_CATEGORY_LEN,
    MAX_TITLE_LEN,
};
use crate::error::{AppError, Result};
use crate::etag::{compute_fingerprint, validator_matches};
use crate::items::{self, ItemPatch, NewItem, QuerySummary};
use crate::linking;
use crate::models::PlanItemRecord;
use crate::routes::auth::require_account;
use crate::routes::timestamp_to_rfc3339;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(rename = "dueAt")]
    pub due_at: Option<i64>,
    #[serde(rename = "remindEnabled", default)]
    pub remind_enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub title: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "dueAt")]
    pub due_at: Option<i64>,
    #[serde(rename = "remindEnabled")]
    pub remind_enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ListItemsParams {
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: String,
    #[serde(rename = "ownerId")]
    pub owner_id: String,
    pub title: String,
    pub category: String,
    #[serde(rename = "dueAt")]
    pub due_at: Option<i64>,
    #[serde(rename = "remindEnabled")]
    pub remind_enabled: bool,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

impl ItemResponse {
    fn from_record(id: String, record: PlanItemRecord) -> Self {
        Self {
            id,
            owner_id: record.owner_id,
            title: record.title,
            category: record.category,
            due_at: record.due_at,
            remind_enabled: record.remind_enabled,
            created_at: timestamp_to_rfc3339(record.created_at),
            updated_at: timestamp_to_rfc3339(record.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListItemsResponse {
    pub items: Vec<ItemResponse>,
}

fn validate_fields(title: Option<&str>, category: Option<&str>) -> Result<()> {
    if let Some(title) = title {
        if title.trim().is_empty() || title.len() > MAX_TITLE_LEN {
            return Err(AppError::InvalidInput(ERR_INVALID_TITLE.to_string()));
        }
    }
    if let Some(category) = category {
        if category.len() > MAX_CATEGORY_LEN {
            return Err(AppError::InvalidInput(ERR_INVALID_CATEGORY.to_string()));
        }
    }
    Ok(())
}

/// Fingerprint inputs for an item list query: the visible owner set, every
/// row-selecting filter, the max `updated_at`, and the row count (the count
/// disambiguates clock-resolution ties).
fn items_validator(owners: &[String], category: Option<&str>, summary: &QuerySummary) -> String {
    compute_fingerprint(&[
        ("owners", owners.join(",")),
        ("category", category.unwrap_or_default().to_string()),
        (
            "max_updated_at",
            summary
                .max_updated_at
                .map(|ts| ts.to_string())
                .unwrap_or_default(),
        ),
        ("count", summary.count.to_string()),
    ])
}

/// Create a plan item owned by the caller
pub async fn create_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateItemRequest>,
) -> Result<Json<ItemResponse>> {
    let owner_id = require_account(&state, &headers).await?;
    validate_fields(Some(&payload.title), Some(&payload.category))?;

    let db = state.db.clone();
    let new = NewItem {
        title: payload.title,
        category: payload.category,
        due_at: payload.due_at,
        remind_enabled: payload.remind_enabled,
    };
    let (id, record) = tokio::task::spawn_blocking(move || {
        items::create_item(&db, &owner_id, new, Utc::now().timestamp())
    })
    .await??;

    Ok(Json(ItemResponse::from_record(id, record)))
}

/// Update a plan item visible to the caller (own or linked partner's)
pub async fn update_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(item_id): Path<String>,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<Json<ItemResponse>> {
    let account_id = require_account(&state, &headers).await?;
    validate_fields(payload.title.as_deref(), payload.category.as_deref())?;

    let db = state.db.clone();
    let patch = ItemPatch {
        title: payload.title,
        category: payload.category,
        due_at: payload.due_at,
        remind_enabled: payload.remind_enabled,
    };
    let update_id = item_id.clone();
    let record = tokio::task::spawn_blocking(move || {
        // Visibility is resolved fresh per request; the link may have changed
        let visible = linking::resolve_visible_accounts(&db, &account_id)?;
        items::update_item(&db, &update_id, &visible, patch, Utc::now().timestamp())
    })
    .await??;

    Ok(Json(ItemResponse::from_record(item_id, record)))
}

/// List plan items visible to the caller, with conditional-read support
///
/// The caller may supply a previously-received validator via `If-None-Match`.
/// A cheap pre-check (max `updated_at` + count, no rows) decides whether the
/// full query can be skipped; on a match the response is `304` with no body.
/// Otherwise the full query runs and the validator is recomputed from the
/// rows actually returned, so a write landing between the two phases can
/// never stamp stale data as fresh. Every response carries the validator and
/// a private, always-revalidate cache directive.
pub async fn list_items(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListItemsParams>,
) -> Result<Response> {
    let account_id = require_account(&state, &headers).await?;

    let db = state.db.clone();
    let owners =
        tokio::task::spawn_blocking(move || linking::resolve_visible_accounts(&db, &account_id))
            .await??;

    // Phase 1: cheap pre-check, no row materialization
    let db = state.db.clone();
    let summary_owners = owners.clone();
    let category = params.category.clone();
    let summary = tokio::task::spawn_blocking(move || {
        items::scan_summary(&db, &summary_owners, category.as_deref())
    })
    .await??;

    let validator = items_validator(&owners, params.category.as_deref(), &summary);

    if let Some(client_validator) = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
    {
        if validator_matches(client_validator, &validator) {
            tracing::debug!("Validator match, returning 304");
            return Ok((
                StatusCode::NOT_MODIFIED,
                [
                    (header::ETAG, validator),
                    (header::CACHE_CONTROL, CACHE_CONTROL_PRIVATE.to_string()),
                ],
            )
                .into_response());
        }
    }

    // Phase 2: full query; recompute the validator from the actual rows
    let db = state.db.clone();
    let list_owners = owners.clone();
    let category = params.category.clone();
    let rows = tokio::task::spawn_blocking(move || {
        items::list_items(&db, &list_owners, category.as_deref())
    })
    .await??;

    let final_summary = items::summarize_rows(&rows);
    let validator = items_validator(&owners, params.category.as_deref(), &final_summary);

    let body = ListItemsResponse {
        items: rows
            .into_iter()
            .map(|(id, record)| ItemResponse::from_record(id, record))
            .collect(),
    };

    Ok((
        StatusCode::OK,
        [
            (header::ETAG, validator),
            (header::CACHE_CONTROL, CACHE_CONTROL_PRIVATE.to_string()),
        ],
        Json(body),
    )
        .into_response())
}
