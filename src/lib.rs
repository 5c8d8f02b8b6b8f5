// ABOUTME: Root library module for the Matrix side of quatbot
// ABOUTME: Matrix client/login and per-room wiring; the bot logic lives in quatbot-core

pub mod matrix_client;
pub mod matrix_room;

// Re-export platform-agnostic modules from quatbot-core
pub use quatbot_core::config;
pub use quatbot_core::metrics;
pub use quatbot_core::paths;
