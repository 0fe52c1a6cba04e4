//! Identity & Linking Store and the Shared-View Resolver.
//!
//! An account participates in at most one active link. Link acceptance runs
//! the existing-link re-check and the link insert inside a single redb write
//! transaction; redb serializes writers, so two concurrent accepts targeting
//! the same account cannot both pass the check.

use redb::ReadableTable;

use crate::constants::ERR_SELF_LINK;
use crate::db::{self, tables, Db};
use crate::error::{AppError, Result};
use crate::models::{AccountRecord, LinkRecord, LinkRequestRecord, RequestState};

/// Action a respondent can take on a pending link request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespondAction {
    Accept,
    Reject,
}

/// Create (or re-open) a link request from `from` to `to`.
///
/// An existing request for the same directed pair is reset to pending rather
/// than duplicated, whatever state it was left in.
pub fn create_request(db: &Db, from: &str, to: &str, now: i64) -> Result<LinkRequestRecord> {
    if from == to {
        return Err(AppError::InvalidInput(ERR_SELF_LINK.to_string()));
    }

    let write_txn = db.begin_write()?;
    let record = {
        // Target must exist and not be soft-deleted
        let accounts = write_txn.open_table(tables::ACCOUNTS)?;
        let target: AccountRecord = accounts
            .get(to)?
            .map(|bytes| db::decode(bytes.value()))
            .transpose()?
            .ok_or(AppError::AccountNotFound)?;
        if !target.is_active() {
            return Err(AppError::AccountNotFound);
        }
        drop(accounts);

        // Requester must not already hold an active link
        let partners = write_txn.open_table(tables::PARTNERS)?;
        if partners.get(from)?.is_some() {
            return Err(AppError::AlreadyLinked);
        }
        drop(partners);

        // Upsert: a terminal request for the same pair is reset to pending
        let mut requests = write_txn.open_table(tables::LINK_REQUESTS)?;
        let record = LinkRequestRecord {
            from: from.to_string(),
            to: to.to_string(),
            state: RequestState::Pending,
            created_at: now,
            updated_at: now,
        };
        let key = LinkRequestRecord::request_key(from, to);
        requests.insert(key.as_str(), db::encode(&record)?.as_slice())?;
        record
    };
    write_txn.commit()?;

    tracing::info!("Link request created: {} -> {}", from, to);
    Ok(record)
}

/// Accept or reject a pending request addressed to `respondent`.
///
/// On accept, the request-state update and the link creation commit as one
/// atomic unit, and both parties are re-checked for an existing link at accept
/// time (the requester may have been linked since the request was created).
pub fn respond_to_request(
    db: &Db,
    request_id: &str,
    respondent: &str,
    action: RespondAction,
    now: i64,
) -> Result<RequestState> {
    let write_txn = db.begin_write()?;
    let new_state = {
        let mut requests = write_txn.open_table(tables::LINK_REQUESTS)?;
        let mut record: LinkRequestRecord = requests
            .get(request_id)?
            .map(|bytes| db::decode(bytes.value()))
            .transpose()?
            .ok_or(AppError::RequestNotFound)?;

        // Only the addressee may respond, and only while pending
        if record.to != respondent || record.state != RequestState::Pending {
            return Err(AppError::RequestNotFound);
        }

        record.state = match action {
            RespondAction::Accept => RequestState::Accepted,
            RespondAction::Reject => RequestState::Rejected,
        };
        record.updated_at = now;

        if action == RespondAction::Accept {
            // Re-check both parties inside this write transaction; either may
            // have acquired a link since the request was created
            let mut partners = write_txn.open_table(tables::PARTNERS)?;
            if partners.get(record.from.as_str())?.is_some()
                || partners.get(record.to.as_str())?.is_some()
            {
                return Err(AppError::AlreadyLinked);
            }

            let link = LinkRecord {
                account_a: record.from.clone(),
                account_b: record.to.clone(),
                created_at: now,
            };
            let pair_key = LinkRecord::pair_key(&record.from, &record.to);
            let mut links = write_txn.open_table(tables::LINKS)?;
            links.insert(pair_key.as_str(), db::encode(&link)?.as_slice())?;
            drop(links);

            partners.insert(record.from.as_str(), record.to.as_str())?;
            partners.insert(record.to.as_str(), record.from.as_str())?;
        }

        requests.insert(request_id, db::encode(&record)?.as_slice())?;
        record.state
    };
    write_txn.commit()?;

    tracing::info!(
        "Link request {} {}",
        request_id,
        if new_state == RequestState::Accepted {
            "accepted"
        } else {
            "rejected"
        }
    );
    Ok(new_state)
}

/// Tear down the caller's active link, whichever side asks.
pub fn disconnect(db: &Db, account_id: &str) -> Result<()> {
    let write_txn = db.begin_write()?;
    {
        let mut partners = write_txn.open_table(tables::PARTNERS)?;
        let partner = partners
            .get(account_id)?
            .map(|guard| guard.value().to_string())
            .ok_or(AppError::NoActiveLink)?;

        partners.remove(account_id)?;
        partners.remove(partner.as_str())?;
        drop(partners);

        let mut links = write_txn.open_table(tables::LINKS)?;
        let pair_key = LinkRecord::pair_key(account_id, &partner);
        links.remove(pair_key.as_str())?;
    }
    write_txn.commit()?;

    tracing::info!("Link disconnected by {}", account_id);
    Ok(())
}

/// Look up the caller's linked partner, if any.
pub fn get_partner(db: &Db, account_id: &str) -> Result<Option<String>> {
    let read_txn = db.begin_read()?;
    let partners = read_txn.open_table(tables::PARTNERS)?;
    Ok(partners
        .get(account_id)?
        .map(|guard| guard.value().to_string()))
}

/// Compute the set of account ids whose records the caller may see.
///
/// Always includes the caller; includes the partner iff a link is active.
/// Domain queries must go through this function and must call it fresh per
/// request, since the link can change between requests.
pub fn resolve_visible_accounts(db: &Db, account_id: &str) -> Result<Vec<String>> {
    let mut visible = vec![account_id.to_string()];
    if let Some(partner) = get_partner(db, account_id)? {
        visible.push(partner);
    }
    Ok(visible)
}
