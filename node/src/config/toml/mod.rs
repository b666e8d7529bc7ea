mod active_elections_toml;
mod confirmation_height_toml;
mod node_toml;
mod online_reps_toml;
mod stats_toml;
mod vote_cache_toml;

pub use active_elections_toml::ActiveElectionsToml;
pub use confirmation_height_toml::ConfirmationHeightToml;
pub use node_toml::NodeToml;
pub use online_reps_toml::OnlineRepsToml;
pub use stats_toml::StatsToml;
pub use vote_cache_toml::VoteCacheToml;
