use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user traversal state of one route version. Keyed by `(user_id, version_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteProgress {
    pub id: i32,
    pub user_id: i32,
    pub route_id: i32,
    pub version_id: i32,
    pub current_idx: i32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub content_message_id: Option<i32>,
    pub voice_message_id: Option<i32>,
}

impl RouteProgress {
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

/// Partial update of one stored message reference.
///
/// `Unset` leaves the stored value alone, `Clear` writes NULL and `Set`
/// overwrites it. Chat layers that speak the "zero means clear" dialect can
/// go through [`MessageIdUpdate::from_raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageIdUpdate {
    #[default]
    Unset,
    Clear,
    Set(i32),
}

impl MessageIdUpdate {
    /// `None` => `Unset`, `Some(0)` => `Clear`, `Some(n)` => `Set(n)`.
    pub fn from_raw(raw: Option<i32>) -> Self {
        match raw {
            None => MessageIdUpdate::Unset,
            Some(0) => MessageIdUpdate::Clear,
            Some(id) => MessageIdUpdate::Set(id),
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, MessageIdUpdate::Unset)
    }

    /// Value to write when the field is touched at all.
    pub fn value(&self) -> Option<i32> {
        match self {
            MessageIdUpdate::Set(id) => Some(*id),
            _ => None,
        }
    }

    /// Applies the update to a currently stored value.
    pub fn apply(&self, current: Option<i32>) -> Option<i32> {
        match self {
            MessageIdUpdate::Unset => current,
            MessageIdUpdate::Clear => None,
            MessageIdUpdate::Set(id) => Some(*id),
        }
    }
}
