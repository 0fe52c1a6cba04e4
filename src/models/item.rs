use serde::{Deserialize, Serialize};

/// A plan item (wedding prep, real estate, travel) stored in redb
///
/// The two `reminded_*` fields are the per-window sent markers. Once set they
/// are never cleared automatically; only the automatic sweep reads or writes
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanItemRecord {
    /// Owning account id
    pub owner_id: String,
    pub title: String,
    /// Free-form grouping label ("wedding", "estate", "travel", ...)
    pub category: String,
    /// Due timestamp (Unix), if the item is schedulable
    pub due_at: Option<i64>,
    /// Whether the automatic sweep considers this item
    pub remind_enabled: bool,
    /// When the day-before reminder was sent (Unix timestamp)
    pub reminded_day_before_at: Option<i64>,
    /// When the day-of reminder was sent (Unix timestamp)
    pub reminded_day_of_at: Option<i64>,
    /// When the item was created (Unix timestamp)
    pub created_at: i64,
    /// When the item was last modified (Unix timestamp)
    pub updated_at: i64,
}

impl PlanItemRecord {
    /// Create a fresh item owned by `owner_id`
    pub fn new(
        owner_id: String,
        title: String,
        category: String,
        due_at: Option<i64>,
        remind_enabled: bool,
        now: i64,
    ) -> Self {
        Self {
            owner_id,
            title,
            category,
            due_at,
            remind_enabled,
            reminded_day_before_at: None,
            reminded_day_of_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
