//! PairPlan Server Library
//!
//! Backend for a two-person planning app: accounts pair up ("connect") so each
//! partner sees the other's plan items merged into their own views. The
//! interesting parts are the pairwise linking store, the conditional-read
//! (ETag) protocol on list endpoints, and the idempotent reminder sweep.

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod etag;
pub mod items;
pub mod linking;
pub mod models;
pub mod notify;
pub mod reminder;
pub mod routes;

pub use config::Config;
pub use db::{open_database, Db};
pub use error::{AppError, Result};

use std::sync::Arc;

use notify::Notifier;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: Config,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    /// Create a new AppState with the given database, configuration and notifier
    pub fn new(db: Db, config: Config, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db,
            config,
            notifier,
        }
    }
}
