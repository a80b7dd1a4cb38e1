pub mod blacklist;
pub mod event;

pub use blacklist::{BlacklistEntry, FirewallBanEntry};
pub use event::{ActivitySummary, AuthEvent};
