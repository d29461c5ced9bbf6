pub mod doctor;
pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use mission_proto::{Mission, Parameters};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;

pub use memory::MemoryStore;
pub use mongo::{MongoConfig, MongoCredentials, MongoStore};

pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("no matching mission")]
    NotFound,
    #[error("mission {0} already exists")]
    Duplicate(String),
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("store transport: {0}")]
    Transport(String),
    #[error("document codec: {0}")]
    Codec(String),
    #[error("store config: {0}")]
    Config(String),
}

/// One logical operation per call, one round-trip per operation.
#[async_trait]
pub trait MissionStore: Send + Sync {
    /// Writes a new mission and returns the storage-assigned id.
    async fn insert(&self, mission: &Mission) -> Result<String, StoreError>;

    /// Overwrites `parameters` and advances `lastUpdated`, nothing else.
    /// `last_updated` is the caller's clock; the stored value becomes
    /// [`mission_proto::next_update`] of it, computed atomically with the write.
    async fn update_parameters(
        &self,
        mission_id: &str,
        last_updated: OffsetDateTime,
        parameters: &Parameters,
    ) -> Result<(), StoreError>;

    /// Same `lastUpdated` rule as `update_parameters`.
    async fn set_in_progress(
        &self,
        mission_id: &str,
        last_updated: OffsetDateTime,
        in_progress: bool,
    ) -> Result<(), StoreError>;

    async fn find_by_mission_id(&self, mission_id: &str) -> Result<Mission, StoreError>;

    /// All missions flown by a drone, in storage order. Never returns an
    /// empty list: zero matches is `NotFound`.
    async fn find_by_drone_id(&self, drone_id: &str) -> Result<Vec<Mission>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// "mongo" or "memory".
    pub backend: String,

    /// Deadline for a single store operation. Default 10s.
    pub op_timeout_s: Option<u64>,

    pub mongo: Option<MongoConfig>,
}

impl StoreConfig {
    pub fn op_timeout(&self) -> Duration {
        self.op_timeout_s.map(Duration::from_secs).unwrap_or(DEFAULT_OP_TIMEOUT)
    }
}

/// Builds the configured backend. Nothing is dialed here; the Mongo client
/// connects on first use so an unreachable cluster only fails requests.
pub fn open(cfg: &StoreConfig) -> Result<Arc<dyn MissionStore>, StoreError> {
    match cfg.backend.as_str() {
        "mongo" => {
            let m = cfg.mongo.as_ref().ok_or_else(|| StoreError::Config("[store.mongo] section missing".into()))?;
            let creds = MongoCredentials::from_env(m)?;
            Ok(Arc::new(MongoStore::new(m.clone(), creds, cfg.op_timeout())))
        }
        "memory" => Ok(Arc::new(MemoryStore::default())),
        other => Err(StoreError::Config(format!("unknown store.backend: {}", other))),
    }
}
