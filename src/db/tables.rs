use redb::TableDefinition;

/// Accounts table: account_id (SHA-256 hash) -> AccountRecord (serialized)
pub const ACCOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");

/// Links table: canonical pair key ("<smaller_id>:<larger_id>") -> LinkRecord (serialized)
/// The canonical ordering makes at-most-one-link-per-pair enforceable by the key alone
pub const LINKS: TableDefinition<&str, &[u8]> = TableDefinition::new("links");

/// Partner index: account_id -> partner account_id
/// Both directions of an active link are stored; O(1) partner lookup
pub const PARTNERS: TableDefinition<&str, &str> = TableDefinition::new("partners");

/// Link requests table: directed key ("<from>:<to>") -> LinkRequestRecord (serialized)
/// Keying by the ordered pair enforces at most one non-terminal request per (from, to)
pub const LINK_REQUESTS: TableDefinition<&str, &[u8]> = TableDefinition::new("link_requests");

/// Plan items table: item_id (UUID) -> PlanItemRecord (serialized)
pub const ITEMS: TableDefinition<&str, &[u8]> = TableDefinition::new("items");

/// Owner items index: account_id -> Vec<item_id>
/// Used for visible-account-set queries without scanning the whole items table
pub const OWNER_ITEMS: TableDefinition<&str, &[u8]> = TableDefinition::new("owner_items");
