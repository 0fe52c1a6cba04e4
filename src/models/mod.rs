pub mod account;
pub mod item;
pub mod link;

pub use account::{Account, AccountRecord};
pub use item::PlanItemRecord;
pub use link::{LinkRecord, LinkRequestRecord, RequestState};
