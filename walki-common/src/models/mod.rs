// File: walki-common/src/models/mod.rs
pub mod route;
pub mod progress;
pub mod media;
pub mod platform;
pub mod user;

pub use route::{RouteVersion, RoutePoint, PointMedia};
pub use progress::{RouteProgress, MessageIdUpdate};
pub use media::{Media, MediaKind, PlatformReference};
pub use platform::{TextFormat, MediaSource, SentMedia, InlineButton, InlineKeyboard};
pub use user::User;
