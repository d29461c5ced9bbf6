use async_trait::async_trait;
use mission_proto::{next_update, Mission, Parameters};
use std::sync::atomic::{AtomicU64, Ordering};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{MissionStore, StoreError};

/// Process-local store with the same contract as the Mongo backend.
#[derive(Default)]
pub struct MemoryStore {
    missions: RwLock<Vec<Mission>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.missions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.missions.read().await.is_empty()
    }
}

#[async_trait]
impl MissionStore for MemoryStore {
    async fn insert(&self, mission: &Mission) -> Result<String, StoreError> {
        let mut missions = self.missions.write().await;
        if missions.iter().any(|m| m.mission_id == mission.mission_id) {
            return Err(StoreError::Duplicate(mission.mission_id.clone()));
        }
        let mut stored = mission.clone();
        if stored.id.is_empty() {
            stored.id = format!("{:024x}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        }
        let id = stored.id.clone();
        missions.push(stored);
        debug!(mission_id = %mission.mission_id, id = %id, "memory: inserted");
        Ok(id)
    }

    async fn update_parameters(
        &self,
        mission_id: &str,
        last_updated: OffsetDateTime,
        parameters: &Parameters,
    ) -> Result<(), StoreError> {
        let mut missions = self.missions.write().await;
        let m = missions.iter_mut().find(|m| m.mission_id == mission_id).ok_or(StoreError::NotFound)?;
        m.last_updated = next_update(m.last_updated, last_updated);
        m.parameters = parameters.clone();
        Ok(())
    }

    async fn set_in_progress(
        &self,
        mission_id: &str,
        last_updated: OffsetDateTime,
        in_progress: bool,
    ) -> Result<(), StoreError> {
        let mut missions = self.missions.write().await;
        let m = missions.iter_mut().find(|m| m.mission_id == mission_id).ok_or(StoreError::NotFound)?;
        m.last_updated = next_update(m.last_updated, last_updated);
        m.in_progress = in_progress;
        Ok(())
    }

    async fn find_by_mission_id(&self, mission_id: &str) -> Result<Mission, StoreError> {
        self.missions
            .read()
            .await
            .iter()
            .find(|m| m.mission_id == mission_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_drone_id(&self, drone_id: &str) -> Result<Vec<Mission>, StoreError> {
        let found: Vec<Mission> =
            self.missions.read().await.iter().filter(|m| m.drone_id == drone_id).cloned().collect();
        if found.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(found)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
