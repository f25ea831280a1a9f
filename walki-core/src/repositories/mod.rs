// src/repositories/mod.rs

pub mod postgres;

pub use walki_common::traits::repository_traits::{
    AccessRepository, MediaRepository, PlatformReferenceRepository, PointRepository,
    ProgressRepository, RouteRepository, UserRepository,
};

pub use postgres::{
    PostgresMediaRepository, PostgresOrderRepository, PostgresRouteRepository,
    PostgresRouteRunRepository, PostgresUserRepository,
};
