pub mod id;
pub mod mission;
pub mod telemetry;

pub use id::new_mission_id;
pub use mission::{
    next_update, timestamp_now, Coordinates, CreateMission, InvalidMission, Mission, Parameters, UpdateMission,
};
pub use telemetry::{Reading, TelemetryError, TelemetryPayload};
