use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;
use sea_orm::DatabaseConnection;

use crate::config::CacheConfig;
use crate::engine::DecisionPolicy;
use crate::models::assembly::VotingEntityView;
use crate::models::voting::TallyView;

#[derive(Clone)]
pub struct AppState {
    pub database: DatabaseConnection,
    pub cache: Arc<ApiCache>,
    pub policy: DecisionPolicy,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(database: DatabaseConnection, cache: Arc<ApiCache>, policy: DecisionPolicy) -> Self {
        assert!(
            cache.voters_capacity >= 16,
            "Voter cache capacity must be configured"
        );
        assert!(
            !policy.affirmative_labels.is_empty(),
            "Decision policy must carry affirmative labels"
        );
        Self {
            database,
            cache,
            policy,
            start_time: Instant::now(),
        }
    }
}

/// Read caches for the two expensive derived views: the eligibility roster
/// (keyed by assembly) and the running tally (keyed by question). Writers
/// invalidate at the call site.
pub struct ApiCache {
    pub voters: Cache<i64, Arc<Vec<VotingEntityView>>>,
    pub tallies: Cache<i64, Arc<TallyView>>,
    pub voters_capacity: u64,
}

impl ApiCache {
    pub fn new(config: &CacheConfig) -> Self {
        assert!(
            config.voters_max_capacity >= 16,
            "Voter cache capacity threshold"
        );
        assert!(
            config.tallies_max_capacity >= 16,
            "Tally cache capacity threshold"
        );

        let voters = Cache::builder()
            .max_capacity(config.voters_max_capacity)
            .time_to_live(Duration::from_secs(config.voters_ttl_seconds))
            .time_to_idle(Duration::from_secs(config.voters_ttl_seconds / 2 + 1))
            .build();

        let tallies = Cache::builder()
            .max_capacity(config.tallies_max_capacity)
            .time_to_live(Duration::from_secs(config.tallies_ttl_seconds))
            .time_to_idle(Duration::from_secs(config.tallies_ttl_seconds / 2 + 1))
            .build();

        Self {
            voters,
            tallies,
            voters_capacity: config.voters_max_capacity,
        }
    }
}
