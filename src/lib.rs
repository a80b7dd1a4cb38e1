pub mod config;
pub mod detection;
pub mod enforcement;
pub mod input;
pub mod models;
pub mod output;
pub mod persistence;
pub mod pipeline;

// Re-export commonly used types
pub use config::Config;
pub use detection::{partition_suspects, pending_bans, WindowAggregator};
pub use enforcement::{enforce, CommandFirewall, Firewall};
pub use input::{AuthLogParser, AuthLogSource, FileAuthLog, FirewallStateParser};
pub use models::{ActivitySummary, AuthEvent, BlacklistEntry, FirewallBanEntry};
pub use persistence::{merge, BlacklistStore, JsonBlacklistStore, SqliteBlacklistStore};
pub use pipeline::{Pipeline, PipelineError};
