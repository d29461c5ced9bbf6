use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use mission_proto::{CreateMission, Mission, UpdateMission};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::SharedService;

fn decode<T: DeserializeOwned>(body: &[u8], what: &str) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        warn!("{} decode: {}", what, e);
        ApiError::Decode(format!("{} body: {}", what, e))
    })
}

/// POST /mission/create
pub async fn create_mission(State(svc): State<SharedService>, body: Bytes) -> Result<String, ApiError> {
    debug!(bytes = body.len(), "create mission");
    let req: CreateMission = decode(&body, "create mission")?;
    let mission = svc.create(req).await?;
    Ok(format!("Mission Successfully, missionID: {}", mission.mission_id))
}

/// PUT /mission/update/{missionID}
pub async fn update_mission(
    State(svc): State<SharedService>,
    Path(mission_id): Path<String>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    debug!(%mission_id, bytes = body.len(), "update mission");
    let req: UpdateMission = decode(&body, "update mission")?;
    svc.update(&mission_id, req).await?;
    Ok("success")
}

/// PUT /mission/complete/{missionID}
pub async fn complete_mission(
    State(svc): State<SharedService>,
    Path(mission_id): Path<String>,
) -> Result<&'static str, ApiError> {
    svc.complete(&mission_id).await?;
    Ok("success")
}

/// GET /mission/{missionID}
pub async fn get_mission(
    State(svc): State<SharedService>,
    Path(mission_id): Path<String>,
) -> Result<Json<Mission>, ApiError> {
    Ok(Json(svc.get(&mission_id).await?))
}

/// GET /mission/drone/{droneID}
pub async fn list_drone_missions(
    State(svc): State<SharedService>,
    Path(drone_id): Path<String>,
) -> Result<Json<Vec<Mission>>, ApiError> {
    let missions = svc.list_for_drone(&drone_id).await?;
    debug!(%drone_id, count = missions.len(), "drone missions");
    Ok(Json(missions))
}

/// OPTIONS without pre-flight headers. Real pre-flights never get here, the
/// CORS layer answers them.
pub async fn preflight() {}
