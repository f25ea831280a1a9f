// src/lib.rs

pub mod db;
pub mod repositories;
pub mod platforms;
pub mod storage;
pub mod cache;
pub mod services;
pub mod test_utils;

pub use db::{Database, DbConfig};
pub use walki_common::error::Error;
