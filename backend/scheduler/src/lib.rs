pub mod activity;
pub mod refresh;

pub use activity::{ActivityState, ActivityTracker, InputEvent};
pub use refresh::{RefreshConfig, MIN_INTERVAL, RefreshFn, RefreshHandle, RefreshScheduler, RefreshStatsSnapshot};
