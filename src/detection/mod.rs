pub mod reconcile;
pub mod threshold;
pub mod window;

pub use reconcile::pending_bans;
pub use threshold::{partition_suspects, ThresholdSplit};
pub use window::{WindowAggregation, WindowAggregator, WindowBounds};
