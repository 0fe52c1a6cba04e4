use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use redb::ReadableTable;
use serde::{Deserialize, Serialize};

use crate::constants::{ERR_ACCOUNT_ID_MUST_BE_SHA256, ERR_INVALID_WEBHOOK_URL};
use crate::db::{self, tables};
use crate::error::{AppError, Result};
use crate::models::{Account, AccountRecord, LinkRecord};
use crate::routes::auth::require_account;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(rename = "accountId")]
    pub account_id: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct WebhookRequest {
    /// Delivery endpoint for reminder notifications; null clears it
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteAccountResponse {
    pub success: bool,
    pub message: String,
}

/// Register a new account
///
/// Creates an account record under the client-derived id (SHA-256 hash).
/// Returns 409 Conflict if the id is already taken, including by a
/// soft-deleted account (ids are never recycled).
pub async fn register_account(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>> {
    if !Account::validate_id(&payload.account_id) {
        tracing::warn!("Invalid account id format at registration");
        return Err(AppError::InvalidInput(
            ERR_ACCOUNT_ID_MUST_BE_SHA256.to_string(),
        ));
    }

    let db = state.db.clone();
    let account_id = payload.account_id.clone();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let write_txn = db.begin_write()?;
        {
            let mut accounts = write_txn.open_table(tables::ACCOUNTS)?;
            if accounts.get(account_id.as_str())?.is_some() {
                tracing::info!("Account already exists");
                return Err(AppError::AccountAlreadyExists);
            }

            let record = AccountRecord::new(Utc::now().timestamp());
            accounts.insert(account_id.as_str(), db::encode(&record)?.as_slice())?;
        }
        write_txn.commit()?;

        tracing::info!("New account registered");
        Ok(())
    })
    .await??;

    Ok(Json(RegisterResponse { success: true }))
}

/// Set or clear the caller's reminder delivery endpoint
pub async fn set_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<WebhookRequest>,
) -> Result<Json<WebhookResponse>> {
    let account_id = require_account(&state, &headers).await?;

    if let Some(url) = &payload.url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(AppError::InvalidInput(ERR_INVALID_WEBHOOK_URL.to_string()));
        }
    }

    let db = state.db.clone();
    let url = payload.url.clone();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let write_txn = db.begin_write()?;
        {
            let mut accounts = write_txn.open_table(tables::ACCOUNTS)?;
            let mut record: AccountRecord = accounts
                .get(account_id.as_str())?
                .map(|bytes| db::decode(bytes.value()))
                .transpose()?
                .ok_or(AppError::AccountNotFound)?;

            record.webhook_url = url;
            accounts.insert(account_id.as_str(), db::encode(&record)?.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    })
    .await??;

    Ok(Json(WebhookResponse { success: true }))
}

/// Soft-delete the caller's account
///
/// The record is kept (accounts are never hard-deleted) but stops
/// authenticating, and any active link is torn down so the former partner's
/// visible set shrinks immediately. Plan items are left in place.
pub async fn delete_account(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DeleteAccountResponse>> {
    let account_id = require_account(&state, &headers).await?;

    let db = state.db.clone();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let write_txn = db.begin_write()?;
        {
            let mut accounts = write_txn.open_table(tables::ACCOUNTS)?;
            let mut record: AccountRecord = accounts
                .get(account_id.as_str())?
                .map(|bytes| db::decode(bytes.value()))
                .transpose()?
                .ok_or(AppError::AccountNotFound)?;

            record.deleted_at = Some(Utc::now().timestamp());
            accounts.insert(account_id.as_str(), db::encode(&record)?.as_slice())?;
            drop(accounts);

            // Tear down an active link in the same transaction
            let mut partners = write_txn.open_table(tables::PARTNERS)?;
            let partner = partners
                .get(account_id.as_str())?
                .map(|guard| guard.value().to_string());
            if let Some(partner) = partner {
                partners.remove(account_id.as_str())?;
                partners.remove(partner.as_str())?;
                drop(partners);

                let mut links = write_txn.open_table(tables::LINKS)?;
                let pair_key = LinkRecord::pair_key(&account_id, &partner);
                links.remove(pair_key.as_str())?;
            }
        }
        write_txn.commit()?;

        tracing::info!("Account soft-deleted");
        Ok(())
    })
    .await??;

    Ok(Json(DeleteAccountResponse {
        success: true,
        message: "Account deleted".to_string(),
    }))
}
