use uuid::Uuid;

/// Fresh public mission identifier: a random v4 UUID rendered as 32 lowercase
/// hex characters, hyphens stripped. Carries no timestamp or counter.
pub fn new_mission_id() -> String {
    Uuid::new_v4().simple().to_string()
}
