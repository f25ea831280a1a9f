// src/repositories/postgres/mod.rs

pub mod route;
pub mod order;
pub mod route_run;
pub mod media;
pub mod user;

pub use route::PostgresRouteRepository;
pub use order::PostgresOrderRepository;
pub use route_run::PostgresRouteRunRepository;
pub use media::PostgresMediaRepository;
pub use user::PostgresUserRepository;
