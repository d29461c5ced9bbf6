use mission_proto::{
    new_mission_id, timestamp_now, CreateMission, Mission, Parameters, UpdateMission,
};
use mission_store::MissionStore;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ApiError;

/// Mission operations over an injected store handle. Shared by all requests.
pub struct MissionService {
    store: Arc<dyn MissionStore>,
}

impl MissionService {
    pub fn new(store: Arc<dyn MissionStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, req: CreateMission) -> Result<Mission, ApiError> {
        req.validate().map_err(|e| ApiError::Decode(e.to_string()))?;

        let mut mission = Mission::new(new_mission_id(), req, timestamp_now());
        mission.id = self.store.insert(&mission).await.map_err(ApiError::Store)?;
        info!(
            mission_id = %mission.mission_id,
            drone_id = %mission.drone_id,
            waypoints = mission.waypoints.len(),
            "mission created"
        );
        Ok(mission)
    }

    /// Replaces the telemetry of `mission_id`. The path id wins; a body id, if
    /// present, must agree with it.
    pub async fn update(&self, mission_id: &str, req: UpdateMission) -> Result<Parameters, ApiError> {
        if let Some(body_id) = req.mission_id.as_deref().filter(|s| !s.is_empty()) {
            if body_id != mission_id {
                warn!(path = mission_id, body = body_id, "update: missionID mismatch");
                return Err(ApiError::Decode(format!(
                    "missionID in body ({}) does not match path ({})",
                    body_id, mission_id
                )));
            }
        }

        let parameters = req.telemetry()?;
        self.store
            .update_parameters(mission_id, timestamp_now(), &parameters)
            .await
            .map_err(|e| ApiError::from_store(e, || format!("mission {} not found", mission_id)))?;
        info!(mission_id, sats = parameters.num_sats, "telemetry stored");
        Ok(parameters)
    }

    /// Marks the mission finished. Completing twice is fine.
    pub async fn complete(&self, mission_id: &str) -> Result<(), ApiError> {
        self.store
            .set_in_progress(mission_id, timestamp_now(), false)
            .await
            .map_err(|e| ApiError::from_store(e, || format!("mission {} not found", mission_id)))?;
        info!(mission_id, "mission completed");
        Ok(())
    }

    pub async fn get(&self, mission_id: &str) -> Result<Mission, ApiError> {
        self.store
            .find_by_mission_id(mission_id)
            .await
            .map_err(|e| ApiError::from_store(e, || format!("mission {} not found", mission_id)))
    }

    /// Zero missions for the drone is reported as not-found, not as `[]`.
    pub async fn list_for_drone(&self, drone_id: &str) -> Result<Vec<Mission>, ApiError> {
        self.store.find_by_drone_id(drone_id).await.map_err(|e| ApiError::from_store(e, || "No data found.".into()))
    }
}
