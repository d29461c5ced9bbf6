use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::mission::Parameters;

/// A required numeric reading was absent or did not parse. `value` is empty
/// when the field was missing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TelemetryError {
    #[error("telemetry field `{field}` is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

/// A single loosely-typed reading. Drones send most values as strings,
/// operators tend to send plain JSON numbers; both are accepted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    Number(f64),
    Text(String),
}

impl Reading {
    pub fn parse<T: FromStr>(&self) -> Option<T> {
        match self {
            Reading::Text(s) => s.trim().parse().ok(),
            Reading::Number(n) => n.to_string().parse().ok(),
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Number(n) => write!(f, "{}", n),
            Reading::Text(s) => f.write_str(s),
        }
    }
}

/// Telemetry as pushed by the drone, before typing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TelemetryPayload {
    #[serde(default)]
    pub altimeter: Option<Reading>,
    #[serde(default)]
    pub gyro: Option<Reading>,
    #[serde(default)]
    pub barometer: Option<Reading>,
    #[serde(default)]
    pub lat: Option<Reading>,
    #[serde(default)]
    pub lng: Option<Reading>,
    #[serde(default, alias = "numSats")]
    pub connected_sats: Option<Reading>,
    #[serde(default)]
    pub voltage: Option<Reading>,
}

impl TryFrom<&TelemetryPayload> for Parameters {
    type Error = TelemetryError;

    fn try_from(p: &TelemetryPayload) -> Result<Self, Self::Error> {
        Ok(Parameters {
            altimeter: text(&p.altimeter),
            gyro: text(&p.gyro),
            barometer: text(&p.barometer),
            lat: coordinate("lat", &p.lat)?,
            lng: coordinate("lng", &p.lng)?,
            num_sats: number("connected_sats", &p.connected_sats)?,
            voltage: text(&p.voltage),
        })
    }
}

impl TryFrom<TelemetryPayload> for Parameters {
    type Error = TelemetryError;

    fn try_from(p: TelemetryPayload) -> Result<Self, Self::Error> {
        Parameters::try_from(&p)
    }
}

fn text(r: &Option<Reading>) -> String {
    r.as_ref().map(|r| r.to_string()).unwrap_or_default()
}

pub(crate) fn number<T: FromStr>(field: &'static str, r: &Option<Reading>) -> Result<T, TelemetryError> {
    let r = r.as_ref().ok_or(TelemetryError::InvalidNumber { field, value: String::new() })?;
    r.parse().ok_or_else(|| TelemetryError::InvalidNumber { field, value: r.to_string() })
}

/// Any finite number is accepted; "NaN" and "inf" parse as f64 but have no
/// JSON form, so they are refused.
pub(crate) fn coordinate(field: &'static str, r: &Option<Reading>) -> Result<f64, TelemetryError> {
    let v: f64 = number(field, r)?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(TelemetryError::InvalidNumber { field, value: text(r) })
    }
}
