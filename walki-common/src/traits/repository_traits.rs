use async_trait::async_trait;
use crate::error::Error;
use crate::models::{
    Media, MessageIdUpdate, PlatformReference, PointMedia, RoutePoint, RouteProgress, RouteVersion,
};

#[async_trait]
pub trait RouteRepository: Send + Sync {
    /// The version currently sold and played for `route_id`.
    async fn latest_version(&self, route_id: i32) -> Result<Option<RouteVersion>, Error>;
    async fn version_by_id(&self, version_id: i32) -> Result<Option<RouteVersion>, Error>;
}

#[async_trait]
pub trait AccessRepository: Send + Sync {
    /// Whether the user holds a paid, unexpired entitlement to the route.
    async fn user_has_access(&self, user_id: i32, route_id: i32) -> Result<bool, Error>;
}

/// Ordered waypoints of a route version.
#[async_trait]
pub trait PointRepository: Send + Sync {
    async fn point_at_index(&self, version_id: i32, idx: i32) -> Result<Option<RoutePoint>, Error>;

    /// Waypoint with the lowest index, whatever its numbering starts at.
    async fn first_point(&self, version_id: i32) -> Result<Option<RoutePoint>, Error>;

    /// Smallest index strictly greater than `after`.
    async fn next_index(&self, version_id: i32, after: i32) -> Result<Option<i32>, Error>;

    /// Largest index strictly smaller than `before`.
    async fn prev_index(&self, version_id: i32, before: i32) -> Result<Option<i32>, Error>;

    async fn media_for_point(&self, point_id: i32) -> Result<PointMedia, Error>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Inserts or moves the progress row for `(user_id, version_id)` to `idx`.
    /// With `reopen` the finish timestamp is cleared, otherwise it is kept.
    async fn upsert_progress(
        &self,
        user_id: i32,
        route_id: i32,
        version_id: i32,
        idx: i32,
        reopen: bool,
    ) -> Result<(), Error>;

    async fn get_progress(&self, user_id: i32, version_id: i32) -> Result<Option<RouteProgress>, Error>;

    /// Marks the progress finished. Re-finishing keeps the first timestamp.
    /// Fails with `Error::ProgressNotFound` when there is no row.
    async fn finish(&self, user_id: i32, version_id: i32) -> Result<(), Error>;

    /// Fails with `Error::ProgressNotFound` when there is no row.
    async fn update_message_ids(
        &self,
        user_id: i32,
        version_id: i32,
        content: MessageIdUpdate,
        voice: MessageIdUpdate,
    ) -> Result<(), Error>;
}

#[async_trait]
pub trait MediaRepository: Send + Sync {
    async fn get_by_id(&self, media_id: i64) -> Result<Option<Media>, Error>;
}

/// Persisted media id => platform reference mapping. Derived data; safe to drop.
#[async_trait]
pub trait PlatformReferenceRepository: Send + Sync {
    async fn get_reference(&self, media_id: i64) -> Result<Option<PlatformReference>, Error>;

    async fn upsert_reference(
        &self,
        media_id: i64,
        native_ref: &str,
        content_type: &str,
        chat_id: Option<i64>,
    ) -> Result<(), Error>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Creates or refreshes the user behind a Telegram account, returning the internal id.
    async fn upsert_by_telegram_id(
        &self,
        telegram_id: i64,
        username: Option<&str>,
        full_name: Option<&str>,
    ) -> Result<i32, Error>;
}
