use axum::http::HeaderMap;

use crate::db::{self, tables};
use crate::error::{AppError, Result};
use crate::models::{Account, AccountRecord};
use crate::AppState;

/// Request header carrying the caller's account id.
///
/// Session issuance lives outside this service; by the time a request gets
/// here the gateway has already authenticated it and stamped this header.
pub const ACCOUNT_ID_HEADER: &str = "x-account-id";

/// Extract and format-check the caller's account id from request headers
pub fn account_id_from_headers(headers: &HeaderMap) -> Result<String> {
    let id = headers
        .get(ACCOUNT_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::Unauthenticated)?;

    if !Account::validate_id(id) {
        tracing::warn!("Malformed account id header");
        return Err(AppError::Unauthenticated);
    }
    Ok(id.to_string())
}

/// Resolve the caller to a live (registered, not soft-deleted) account
pub async fn require_account(state: &AppState, headers: &HeaderMap) -> Result<String> {
    let account_id = account_id_from_headers(headers)?;

    let db = state.db.clone();
    let lookup_id = account_id.clone();
    let active = tokio::task::spawn_blocking(move || -> Result<bool> {
        let read_txn = db.begin_read()?;
        let accounts = read_txn.open_table(tables::ACCOUNTS)?;
        let record: Option<AccountRecord> = accounts
            .get(lookup_id.as_str())?
            .map(|bytes| db::decode(bytes.value()))
            .transpose()?;
        Ok(record.map_or(false, |r| r.is_active()))
    })
    .await??;

    if !active {
        tracing::warn!("Request from unknown or deleted account");
        return Err(AppError::Unauthenticated);
    }
    Ok(account_id)
}
