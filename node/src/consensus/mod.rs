mod active_elections;
mod confirmation_solicitor;
mod election;
mod election_network;
mod election_scheduler;
mod election_status;
mod recently_cemented_cache;
mod recently_confirmed_cache;
mod vote_cache;

pub use active_elections::*;
pub use confirmation_solicitor::ConfirmationSolicitor;
pub use election::*;
pub use election_network::*;
pub use election_scheduler::*;
pub use election_status::{ElectionStatus, ElectionStatusType, VoteWithWeightInfo};
pub use recently_cemented_cache::RecentlyCementedCache;
pub use recently_confirmed_cache::RecentlyConfirmedCache;
pub use vote_cache::{VoteCache, VoteCacheConfig};
