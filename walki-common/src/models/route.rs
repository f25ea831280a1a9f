use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable snapshot of a route's content. Only the highest `version_number`
/// of a route is sold and played.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteVersion {
    pub id: i32,
    pub route_id: i32,
    pub version_number: i32,
    pub title: String,
    pub description: String,
    pub duration_minutes: i32,
    pub length_km: f64,
    pub price: f64,
    pub city: String,
    pub created_at: DateTime<Utc>,
}

/// One waypoint of a route version. `idx` is unique within the version but
/// not necessarily contiguous or zero-based.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutePoint {
    pub id: i32,
    pub version_id: i32,
    pub idx: i32,
    pub title: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
}

/// Media ids attached to a waypoint, split by role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointMedia {
    pub photo_ids: Vec<i64>,
    pub audio_ids: Vec<i64>,
}
