// ABOUTME: Per-room event loop - feeds message batches and roster changes to a Bot
// ABOUTME: Sleeps until the earliest module deadline when nothing arrives

use crate::bot::Bot;
use crate::traits::{ChatUser, IncomingMessage};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// What the transport hands to a room's bot
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// New text messages, oldest first
    Messages(Vec<IncomingMessage>),
    /// Fresh member list
    Roster(Vec<ChatUser>),
    Shutdown,
}

/// Why [`run_room`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomExit {
    /// The bot was told to quit
    Finished,
    Shutdown,
    /// The transport went away
    Closed,
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Drive `bot` until it finishes, is shut down, or the channel closes.
///
/// All events for a room go through this one task, so the bot is never
/// touched concurrently.
pub async fn run_room(mut bot: Bot, mut events: mpsc::Receiver<RoomEvent>) -> RoomExit {
    tracing::info!(room_id = %bot.room_id(), "Room loop started");
    let exit = loop {
        if bot.is_finished() {
            break RoomExit::Finished;
        }
        let deadline = bot.next_deadline();
        tokio::select! {
            event = events.recv() => match event {
                Some(RoomEvent::Messages(messages)) => bot.process_batch(&messages),
                Some(RoomEvent::Roster(members)) => bot.update_roster(members),
                Some(RoomEvent::Shutdown) => break RoomExit::Shutdown,
                None => break RoomExit::Closed,
            },
            _ = sleep_until(deadline) => bot.handle_timeout(),
        }
    };
    tracing::info!(room_id = %bot.room_id(), ?exit, "Room loop ended");
    exit
}
