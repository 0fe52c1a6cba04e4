pub mod account;
pub mod auth;
pub mod health;
pub mod items;
pub mod link;
pub mod reminders;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use chrono::{DateTime, Utc};

use crate::AppState;

pub use account::{delete_account, register_account, set_webhook};
pub use health::health_check;
pub use items::{create_item, list_items, update_item};
pub use link::{create_link_request, disconnect_link, link_status, respond_link_request};
pub use reminders::{send_now, sweep_reminders};

/// Convert Unix timestamp to RFC3339 string, defaulting to now if invalid
pub fn timestamp_to_rfc3339(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .unwrap_or_else(Utc::now)
        .to_rfc3339()
}

/// Build the application router over the shared state
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/register", post(register_account))
        .route("/api/account/webhook", post(set_webhook))
        .route("/api/account", delete(delete_account))
        .route("/api/link/request", post(create_link_request))
        .route("/api/link/respond", post(respond_link_request))
        .route("/api/link/disconnect", post(disconnect_link))
        .route("/api/link", get(link_status))
        .route("/api/items", post(create_item).get(list_items))
        .route("/api/items/:id", put(update_item))
        .route("/api/reminders/sweep", post(sweep_reminders))
        .route("/api/reminders/send-now", post(send_now))
        .with_state(state)
}
