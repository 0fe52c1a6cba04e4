use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::constants::{ERR_INVALID_ACCOUNT_ID, ERR_INVALID_ACTION};
use crate::error::{AppError, Result};
use crate::linking::{self, RespondAction};
use crate::models::{Account, LinkRequestRecord};
use crate::routes::auth::require_account;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequestBody {
    /// Target account id
    pub to: String,
}

#[derive(Debug, Serialize)]
pub struct LinkRequestResponse {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct RespondBody {
    #[serde(rename = "requestId")]
    pub request_id: String,
    /// "accept" or "reject"
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct DisconnectResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct LinkStatusResponse {
    #[serde(rename = "partnerId")]
    pub partner_id: Option<String>,
}

/// Propose a link to another account
///
/// A previous request for the same pair, whatever state it ended in, is
/// re-opened as pending rather than duplicated.
pub async fn create_link_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateLinkRequestBody>,
) -> Result<Json<LinkRequestResponse>> {
    let from = require_account(&state, &headers).await?;

    if !Account::validate_id(&payload.to) {
        return Err(AppError::InvalidInput(ERR_INVALID_ACCOUNT_ID.to_string()));
    }

    let db = state.db.clone();
    let to = payload.to.clone();
    let record = tokio::task::spawn_blocking(move || {
        linking::create_request(&db, &from, &to, Utc::now().timestamp())
    })
    .await??;

    Ok(Json(LinkRequestResponse {
        request_id: LinkRequestRecord::request_key(&record.from, &record.to),
        state: record.state.as_str().to_string(),
    }))
}

/// Accept or reject a pending link request addressed to the caller
pub async fn respond_link_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RespondBody>,
) -> Result<Json<LinkRequestResponse>> {
    let respondent = require_account(&state, &headers).await?;

    let action = match payload.action.as_str() {
        "accept" => RespondAction::Accept,
        "reject" => RespondAction::Reject,
        _ => return Err(AppError::InvalidInput(ERR_INVALID_ACTION.to_string())),
    };

    let db = state.db.clone();
    let request_id = payload.request_id.clone();
    let new_state = tokio::task::spawn_blocking(move || {
        linking::respond_to_request(&db, &request_id, &respondent, action, Utc::now().timestamp())
    })
    .await??;

    Ok(Json(LinkRequestResponse {
        request_id: payload.request_id,
        state: new_state.as_str().to_string(),
    }))
}

/// Tear down the caller's active link
pub async fn disconnect_link(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DisconnectResponse>> {
    let account_id = require_account(&state, &headers).await?;

    let db = state.db.clone();
    tokio::task::spawn_blocking(move || linking::disconnect(&db, &account_id)).await??;

    Ok(Json(DisconnectResponse { success: true }))
}

/// Current link status for the caller
pub async fn link_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LinkStatusResponse>> {
    let account_id = require_account(&state, &headers).await?;

    let db = state.db.clone();
    let partner_id =
        tokio::task::spawn_blocking(move || linking::get_partner(&db, &account_id)).await??;

    Ok(Json(LinkStatusResponse { partner_id }))
}
