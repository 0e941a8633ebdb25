pub mod rules;
pub mod streak;

pub use rules::StreakConfig;
pub use streak::compute_snapshot;
