//! Route playback: moves a user through the waypoints of the latest version
//! of a route and packs the waypoint to show next.
//!
//! State per `(user, version)`:
//! no progress -> in progress(idx) -> ... -> finished. Only `restart` (or
//! `start`) reopens a finished run; no transition deletes a progress row.

use std::sync::Arc;
use tracing::{debug, info, warn};

use walki_common::models::{MessageIdUpdate, RoutePoint, RouteProgress, RouteVersion};
use walki_common::traits::repository_traits::{
    AccessRepository, PointRepository, ProgressRepository, RouteRepository,
};
use crate::Error;

/// Everything the chat layer needs to render one waypoint.
#[derive(Debug, Clone, PartialEq)]
pub struct PointView {
    pub point: RoutePoint,
    pub photo_ids: Vec<i64>,
    pub voice_ids: Vec<i64>,
    pub route_id: i32,
    pub version_id: i32,
    pub idx: i32,
    pub has_prev: bool,
    pub has_next: bool,
    /// Messages of the previously shown card, still on screen.
    pub content_message_id: Option<i32>,
    pub voice_message_id: Option<i32>,
}

/// Result of a relative navigation step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Progress moved; show this waypoint.
    Moved(Box<PointView>),
    /// No waypoint after the current one; the run is now finished.
    Finished,
    /// No waypoint before the current one; nothing changed.
    AtFirst,
    /// The user never started this route version.
    NoProgress,
}

impl StepOutcome {
    pub fn advanced(&self) -> bool {
        matches!(self, StepOutcome::Moved(_))
    }

    pub fn view(&self) -> Option<&PointView> {
        match self {
            StepOutcome::Moved(view) => Some(view),
            _ => None,
        }
    }

    pub fn into_view(self) -> Option<PointView> {
        match self {
            StepOutcome::Moved(view) => Some(*view),
            _ => None,
        }
    }
}

pub struct RouteRunService {
    routes: Arc<dyn RouteRepository>,
    access: Arc<dyn AccessRepository>,
    points: Arc<dyn PointRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl RouteRunService {
    pub fn new(
        routes: Arc<dyn RouteRepository>,
        access: Arc<dyn AccessRepository>,
        points: Arc<dyn PointRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self { routes, access, points, progress }
    }

    /// Checks the entitlement and puts the user on the first waypoint.
    /// Always resets; callers wanting resume semantics look at `progress` first.
    pub async fn start(&self, user_id: i32, route_id: i32) -> Result<PointView, Error> {
        self.ensure_access(user_id, route_id).await?;
        let version = self.latest_version(route_id).await?;
        info!("User {} starts route {} (version {})", user_id, route_id, version.id);
        self.move_first(user_id, &version).await
    }

    /// Current progress on the latest version, `None` if the user never started it.
    pub async fn progress(&self, user_id: i32, route_id: i32) -> Result<Option<RouteProgress>, Error> {
        let version = self.latest_version(route_id).await?;
        self.progress.get_progress(user_id, version.id).await
    }

    /// One step forward. Running out of waypoints finishes the run.
    pub async fn continue_route(&self, user_id: i32, route_id: i32) -> Result<StepOutcome, Error> {
        let version = self.latest_version(route_id).await?;
        let Some(current) = self.progress.get_progress(user_id, version.id).await? else {
            debug!("User {} has no progress on version {}", user_id, version.id);
            return Ok(StepOutcome::NoProgress);
        };

        match self.points.next_index(version.id, current.current_idx).await? {
            Some(next_idx) => {
                let view = self.move_to_index(user_id, &version, next_idx, false).await?;
                Ok(StepOutcome::Moved(Box::new(view)))
            }
            None => {
                self.progress.finish(user_id, version.id).await?;
                info!("User {} finished route {} (version {})", user_id, route_id, version.id);
                Ok(StepOutcome::Finished)
            }
        }
    }

    /// One step back. Does not reopen a finished run.
    pub async fn prev(&self, user_id: i32, route_id: i32) -> Result<StepOutcome, Error> {
        let version = self.latest_version(route_id).await?;
        let Some(current) = self.progress.get_progress(user_id, version.id).await? else {
            return Ok(StepOutcome::NoProgress);
        };

        match self.points.prev_index(version.id, current.current_idx).await? {
            Some(prev_idx) => {
                let view = self.move_to_index(user_id, &version, prev_idx, false).await?;
                Ok(StepOutcome::Moved(Box::new(view)))
            }
            None => Ok(StepOutcome::AtFirst),
        }
    }

    /// Back to the first waypoint with the finish mark cleared, whatever the current state.
    pub async fn restart(&self, user_id: i32, route_id: i32) -> Result<PointView, Error> {
        let version = self.latest_version(route_id).await?;
        info!("User {} restarts route {} (version {})", user_id, route_id, version.id);
        self.move_first(user_id, &version).await
    }

    pub async fn finish(&self, user_id: i32, version_id: i32) -> Result<(), Error> {
        self.progress.finish(user_id, version_id).await
    }

    pub async fn update_message_ids(
        &self,
        user_id: i32,
        version_id: i32,
        content: MessageIdUpdate,
        voice: MessageIdUpdate,
    ) -> Result<(), Error> {
        self.progress
            .update_message_ids(user_id, version_id, content, voice)
            .await
    }

    /// Latest version of a route; a route without versions cannot be played.
    pub async fn latest_version(&self, route_id: i32) -> Result<RouteVersion, Error> {
        self.routes
            .latest_version(route_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("route {} has no versions", route_id)))
    }

    async fn ensure_access(&self, user_id: i32, route_id: i32) -> Result<(), Error> {
        if self.access.user_has_access(user_id, route_id).await? {
            Ok(())
        } else {
            Err(Error::NoAccess { user_id, route_id })
        }
    }

    async fn move_first(&self, user_id: i32, version: &RouteVersion) -> Result<PointView, Error> {
        // Index 0 is the convention, but tolerate versions numbered from elsewhere.
        let first = match self.points.point_at_index(version.id, 0).await? {
            Some(p) => p,
            None => self
                .points
                .first_point(version.id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("route version {} has no points", version.id)))?,
        };
        self.upsert_and_pack(user_id, version, first, true).await
    }

    async fn move_to_index(
        &self,
        user_id: i32,
        version: &RouteVersion,
        idx: i32,
        reopen: bool,
    ) -> Result<PointView, Error> {
        let point = self
            .points
            .point_at_index(version.id, idx)
            .await?
            .ok_or_else(|| Error::NotFound(format!("point {} of version {}", idx, version.id)))?;
        self.upsert_and_pack(user_id, version, point, reopen).await
    }

    async fn upsert_and_pack(
        &self,
        user_id: i32,
        version: &RouteVersion,
        point: RoutePoint,
        reopen: bool,
    ) -> Result<PointView, Error> {
        self.progress
            .upsert_progress(user_id, version.route_id, version.id, point.idx, reopen)
            .await?;
        self.pack(user_id, version, point).await
    }

    /// Neighbour flags are probed from the waypoint itself, and a failed probe
    /// only hides a button.
    async fn neighbours(&self, version_id: i32, idx: i32) -> (bool, bool) {
        let has_prev = match self.points.prev_index(version_id, idx).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                warn!("prev probe for version {} idx {} failed: {:?}", version_id, idx, e);
                false
            }
        };
        let has_next = match self.points.next_index(version_id, idx).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                warn!("next probe for version {} idx {} failed: {:?}", version_id, idx, e);
                false
            }
        };
        (has_prev, has_next)
    }

    async fn pack(&self, user_id: i32, version: &RouteVersion, point: RoutePoint) -> Result<PointView, Error> {
        let media = self.points.media_for_point(point.id).await?;
        let (has_prev, has_next) = self.neighbours(version.id, point.idx).await;

        // Message ids of the card currently on screen, so it can be replaced.
        let stored = match self.progress.get_progress(user_id, version.id).await {
            Ok(p) => p,
            Err(e) => {
                warn!("Could not reload progress for user {} version {}: {:?}", user_id, version.id, e);
                None
            }
        };

        Ok(PointView {
            idx: point.idx,
            point,
            photo_ids: media.photo_ids,
            voice_ids: media.audio_ids,
            route_id: version.route_id,
            version_id: version.id,
            has_prev,
            has_next,
            content_message_id: stored.as_ref().and_then(|p| p.content_message_id),
            voice_message_id: stored.as_ref().and_then(|p| p.voice_message_id),
        })
    }
}
