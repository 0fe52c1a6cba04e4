/// UTC offset of the reference timezone (KST, UTC+9)
/// All reminder calendar-day math runs in this timezone
pub const LOCAL_UTC_OFFSET_HOURS: i32 = 9;

/// Default hour-of-day (in the reference timezone) at which the sweep fires
pub const DEFAULT_SWEEP_HOUR: u32 = 9;

/// Timeout for a single outbound webhook delivery
pub const WEBHOOK_TIMEOUT_SECS: u64 = 10;

/// Number of hash bytes kept in a fingerprint (hex-encoded to 32 chars)
pub const FINGERPRINT_BYTES: usize = 16;

/// Cache directive sent with every conditional-read response:
/// private to the requesting user, revalidate with the server every time
pub const CACHE_CONTROL_PRIVATE: &str = "private, no-cache";

/// Maximum length of a plan item title
pub const MAX_TITLE_LEN: usize = 200;

/// Maximum length of a plan item category
pub const MAX_CATEGORY_LEN: usize = 50;

// =============================================================================
// Error Messages
// =============================================================================

/// Error message for invalid account ID format
pub const ERR_INVALID_ACCOUNT_ID: &str = "Invalid account ID format";

/// Detailed error message for account ID validation in registration
pub const ERR_ACCOUNT_ID_MUST_BE_SHA256: &str =
    "Account ID must be a valid SHA-256 hash (64 hex characters)";

/// Error message for a link request targeting the requester itself
pub const ERR_SELF_LINK: &str = "Cannot send a link request to yourself";

/// Error message for a malformed webhook URL
pub const ERR_INVALID_WEBHOOK_URL: &str = "Webhook URL must start with http:// or https://";

/// Error message for an empty or oversized item title
pub const ERR_INVALID_TITLE: &str = "Title must be non-empty and at most 200 characters";

/// Error message for an oversized item category
pub const ERR_INVALID_CATEGORY: &str = "Category must be at most 50 characters";

/// Error message for an unknown respond action
pub const ERR_INVALID_ACTION: &str = "Action must be 'accept' or 'reject'";
