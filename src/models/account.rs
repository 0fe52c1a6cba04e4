use serde::{Deserialize, Serialize};

/// Account record stored in redb
/// Uses Unix timestamps for compact storage with bincode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    /// When the account was created (Unix timestamp)
    pub created_at: i64,
    /// When the account was soft-deleted, if it was (never hard-deleted)
    pub deleted_at: Option<i64>,
    /// Reminder delivery endpoint; None means no endpoint configured
    pub webhook_url: Option<String>,
}

impl AccountRecord {
    /// Create a fresh account record
    pub fn new(now: i64) -> Self {
        Self {
            created_at: now,
            deleted_at: None,
            webhook_url: None,
        }
    }

    /// Whether the account is still active (not soft-deleted)
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Account identity helpers
pub struct Account;

impl Account {
    /// Validate that an account ID is a valid SHA-256 hash (64 hex characters)
    pub fn validate_id(id: &str) -> bool {
        id.len() == 64 && id.chars().all(|c| c.is_ascii_hexdigit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        // Valid SHA-256 hash (64 hex characters)
        let valid_id = "a".repeat(64);
        assert!(Account::validate_id(&valid_id));

        // Too short
        assert!(!Account::validate_id("abc123"));

        // Too long
        let long_id = "a".repeat(65);
        assert!(!Account::validate_id(&long_id));

        // Invalid characters
        let invalid_id = "z".repeat(64);
        assert!(!Account::validate_id(&invalid_id));

        // Real SHA-256 hash
        let real_hash = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        assert!(Account::validate_id(real_hash));
    }

    #[test]
    fn test_new_record_is_active() {
        let record = AccountRecord::new(1_733_788_800);
        assert!(record.is_active());
        assert!(record.webhook_url.is_none());
    }

    #[test]
    fn test_soft_deleted_record_is_inactive() {
        let mut record = AccountRecord::new(1_733_788_800);
        record.deleted_at = Some(1_733_790_000);
        assert!(!record.is_active());
    }
}
