use serde::{de, Deserialize, Deserializer, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::telemetry::{self, Reading, TelemetryError, TelemetryPayload};

/// A drone flight plan plus its latest telemetry snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    /// Storage-assigned primary key. Empty until the store has written it.
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "missionID")]
    pub mission_id: String,
    #[serde(rename = "droneID")]
    pub drone_id: String,
    #[serde(rename = "dateCreated", with = "time::serde::rfc3339")]
    pub date_created: OffsetDateTime,
    #[serde(rename = "lastUpdated", with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    #[serde(rename = "inProgress")]
    pub in_progress: bool,
    pub waypoints: Vec<Coordinates>,
    pub parameters: Parameters,
}

impl Mission {
    /// Builds an in-progress mission with sentinel telemetry.
    pub fn new(mission_id: String, req: CreateMission, now: OffsetDateTime) -> Self {
        Self {
            id: String::new(),
            mission_id,
            drone_id: req.drone_id,
            date_created: now,
            last_updated: now,
            in_progress: true,
            waypoints: req.waypoints,
            parameters: Parameters::default(),
        }
    }
}

/// Latest telemetry snapshot. Replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub altimeter: String,
    pub gyro: String,
    pub barometer: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "numSats")]
    pub num_sats: u32,
    pub voltage: String,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            altimeter: "null".into(),
            gyro: "null".into(),
            barometer: "null".into(),
            lat: 0.00,
            lng: 0.00,
            num_sats: 0,
            voltage: "null".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

// Waypoints arrive either as numbers or as numeric strings.
impl<'de> Deserialize<'de> for Coordinates {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            lat: Option<Reading>,
            lng: Option<Reading>,
        }

        let raw = Raw::deserialize(d)?;
        let lat = telemetry::coordinate("lat", &raw.lat);
        let lng = telemetry::coordinate("lng", &raw.lng);
        match (lat, lng) {
            (Ok(lat), Ok(lng)) => Ok(Coordinates { lat, lng }),
            (Err(e), _) | (_, Err(e)) => Err(de::Error::custom(format!("waypoint: {}", e))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateMission {
    #[serde(rename = "droneID", alias = "DroneID", alias = "droneId")]
    pub drone_id: String,
    #[serde(alias = "Waypoints")]
    pub waypoints: Vec<Coordinates>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidMission {
    #[error("droneID must not be empty")]
    EmptyDroneId,
    #[error("waypoints must not be empty")]
    NoWaypoints,
}

impl CreateMission {
    pub fn validate(&self) -> Result<(), InvalidMission> {
        if self.drone_id.trim().is_empty() {
            return Err(InvalidMission::EmptyDroneId);
        }
        if self.waypoints.is_empty() {
            return Err(InvalidMission::NoWaypoints);
        }
        Ok(())
    }
}

/// Telemetry push. `mission_id` is optional in the body; the URL carries the
/// authoritative one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateMission {
    #[serde(default, rename = "MissionID", alias = "missionID", alias = "missionId")]
    pub mission_id: Option<String>,
    #[serde(default, rename = "DroneID", alias = "droneID", alias = "droneId")]
    pub drone_id: Option<String>,
    #[serde(rename = "Parameters", alias = "parameters")]
    pub parameters: TelemetryPayload,
}

impl UpdateMission {
    pub fn telemetry(&self) -> Result<Parameters, TelemetryError> {
        Parameters::try_from(&self.parameters)
    }
}

/// Current UTC time truncated to milliseconds, the precision the document
/// store keeps.
pub fn timestamp_now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(u32::from(now.millisecond()) * 1_000_000).unwrap_or(now)
}

/// `lastUpdated` for a record stamped at `prev` and touched at `now`. Always
/// at least one millisecond past `prev`, even if the clock stalled or stepped
/// back.
pub fn next_update(prev: OffsetDateTime, now: OffsetDateTime) -> OffsetDateTime {
    now.max(prev + time::Duration::milliseconds(1))
}
