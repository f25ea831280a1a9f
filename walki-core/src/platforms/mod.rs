// File: src/platforms/mod.rs

pub mod telegram;

pub use walki_common::traits::platform_traits::ChatPlatform;
