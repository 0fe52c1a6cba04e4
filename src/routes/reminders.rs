use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::reminder::{self, SweepReport};
use crate::routes::auth::require_account;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SendNowResponse {
    pub sent: u64,
}

/// Extract the bearer token from an Authorization header
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Time-triggered reminder sweep
///
/// Guarded by a shared secret distinct from per-user authentication: this is
/// for the external scheduler (cron), not for users. Outside the configured
/// trigger hour the sweep no-ops and reports zero sent.
///
/// POST /api/reminders/sweep, `Authorization: Bearer <sweep secret>`
pub async fn sweep_reminders(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SweepReport>> {
    let token = bearer_token(&headers).ok_or(AppError::Unauthorized)?;
    if token != state.config.sweep_secret_key {
        tracing::warn!("Sweep invoked with invalid secret");
        return Err(AppError::Unauthorized);
    }

    let report = reminder::run_sweep(
        &state.db,
        state.notifier.as_ref(),
        state.config.sweep_hour,
        Utc::now(),
    )
    .await?;

    tracing::info!(
        "Sweep finished: ran={} scanned={} sent={} failed={} skipped={}",
        report.ran,
        report.scanned,
        report.sent,
        report.failed,
        report.skipped_no_endpoint
    );
    Ok(Json(report))
}

/// User-triggered "send now"
///
/// Dispatches reminders for the caller's visible records due today or
/// tomorrow. Never reads or writes the sent markers, so the automatic sweep
/// is unaffected.
pub async fn send_now(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SendNowResponse>> {
    let account_id = require_account(&state, &headers).await?;

    let sent = reminder::manual_send(
        &state.db,
        state.notifier.as_ref(),
        &account_id,
        Utc::now(),
    )
    .await?;

    Ok(Json(SendNowResponse { sent }))
}
