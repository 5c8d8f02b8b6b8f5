// ABOUTME: Chat-room bot core - command routing, meetings, transcripts and coffee
// ABOUTME: Knows nothing about Matrix; the transport feeds events and provides a RoomSink

pub mod basic;
pub mod bot;
pub mod coffee;
pub mod coffee_store;
pub mod commands;
pub mod config;
pub mod context;
pub mod logger;
pub mod meeting;
pub mod metrics;
pub mod operators;
pub mod paths;
pub mod room_loop;
pub mod roster;
pub mod timer;
pub mod traits;
pub mod transcript;
pub mod watcher;

pub use bot::{standard_watchers, Bot};
pub use commands::CommandArgs;
pub use config::Config;
pub use context::BotContext;
pub use room_loop::{run_room, RoomEvent, RoomExit};
pub use traits::{ChatUser, IncomingMessage, RoomSink};
pub use watcher::Watcher;
