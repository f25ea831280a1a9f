// File: src/services/mod.rs

pub mod route_run_service;
pub mod media_service;
pub mod route_card;
pub mod route_session;

pub use route_run_service::{PointView, RouteRunService, StepOutcome};
pub use media_service::MediaService;
pub use route_card::{CardRender, RouteCardService};
pub use route_session::{RouteRunAction, RouteSessionService, SessionReply};
