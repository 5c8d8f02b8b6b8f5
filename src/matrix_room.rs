// ABOUTME: One joined Matrix room wired to a quatbot-core room loop
// ABOUTME: Converts room events into RoomEvents and posts the bot's text back to the room

use anyhow::{Context, Result};
use matrix_sdk::{
    room::Room,
    ruma::{
        events::room::{
            member::SyncRoomMemberEvent,
            message::{MessageType, OriginalSyncRoomMessageEvent, RoomMessageEventContent},
        },
        OwnedRoomOrAliasId,
    },
    Client, RoomMemberships,
};
use quatbot_core::{
    run_room, Bot, ChatUser, Config, IncomingMessage, RoomEvent, RoomExit, RoomSink,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Room events waiting for the bot; a slow room applies back-pressure to sync
const EVENT_QUEUE: usize = 64;

/// Fire-and-forget sink; a sender task does the actual posting
#[derive(Debug)]
pub struct MatrixRoomSink {
    room_id: String,
    tx: mpsc::UnboundedSender<String>,
}

impl MatrixRoomSink {
    pub fn new(room_id: impl Into<String>, tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            room_id: room_id.into(),
            tx,
        }
    }

    /// Sink for `room`, plus the task that posts to it. The task ends once
    /// the sink is dropped and everything queued has been sent.
    pub fn spawn(room: Room) -> (Arc<Self>, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let sink = Arc::new(Self::new(room.room_id().as_str(), tx));
        let handle = tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                if let Err(e) = room.send(RoomMessageEventContent::text_plain(text)).await {
                    tracing::error!(room_id = %room.room_id(), error = %e, "Failed to post message");
                }
            }
        });
        (sink, handle)
    }
}

impl RoomSink for MatrixRoomSink {
    fn post_plain_text(&self, text: String) {
        if self.tx.send(text).is_err() {
            tracing::warn!(room_id = %self.room_id, "Room sender is gone, message dropped");
        }
    }
}

/// Text of the message types the bot reads
pub fn message_body(msgtype: &MessageType) -> Option<&str> {
    match msgtype {
        MessageType::Text(content) => Some(&content.body),
        MessageType::Notice(content) => Some(&content.body),
        MessageType::Emote(content) => Some(&content.body),
        _ => None,
    }
}

/// Hand an event to the room loop; false once the loop has ended
pub async fn forward(tx: &mpsc::Sender<RoomEvent>, event: RoomEvent) -> bool {
    let what = match &event {
        RoomEvent::Messages(_) => "message",
        RoomEvent::Roster(_) => "roster",
        RoomEvent::Shutdown => "shutdown",
    };
    if tx.send(event).await.is_err() {
        tracing::debug!(event = what, "Room loop has ended, event ignored");
        return false;
    }
    true
}

/// Active members of the room
pub async fn members(room: &Room) -> Result<Vec<ChatUser>> {
    let members = room
        .members(RoomMemberships::ACTIVE)
        .await
        .context("Failed to get room members")?;
    Ok(members
        .into_iter()
        .map(|m| ChatUser {
            id: m.user_id().to_string(),
            display_name: m.display_name().map(|n| n.to_string()),
        })
        .collect())
}

/// Join `name` (room id or alias)
pub async fn join(client: &Client, name: &str) -> Result<Room> {
    let id: OwnedRoomOrAliasId = name
        .parse()
        .with_context(|| format!("Invalid room id or alias: {name}"))?;
    let room = client
        .join_room_by_id_or_alias(&id, &[])
        .await
        .with_context(|| format!("Failed to join {name}"))?;
    tracing::info!(room = %name, room_id = %room.room_id(), "Joined room");
    Ok(room)
}

/// Join the room and run its bot until it quits or the transport goes away
pub async fn serve(client: Client, config: Arc<Config>, name: String) -> Result<RoomExit> {
    let room = join(&client, &name).await?;
    let own_id = client
        .user_id()
        .context("Client is not logged in")?
        .to_owned();

    let (sink, sender) = MatrixRoomSink::spawn(room.clone());
    let bot = Bot::from_config(&config, room.room_id().as_str(), own_id.as_str(), sink)
        .context("Invalid operator list")?;

    let (tx, rx) = mpsc::channel(EVENT_QUEUE);
    tx.send(RoomEvent::Roster(members(&room).await?))
        .await
        .context("Room loop is gone")?;

    let message_handler = client.add_room_event_handler(room.room_id(), {
        let tx = tx.clone();
        move |ev: OriginalSyncRoomMessageEvent| {
            let tx = tx.clone();
            let own_id = own_id.clone();
            async move {
                if ev.sender == own_id {
                    return;
                }
                let Some(body) = message_body(&ev.content.msgtype) else {
                    return;
                };
                let msg = IncomingMessage::new(
                    ChatUser::new(ev.sender.as_str()),
                    ev.event_id.as_str(),
                    u64::from(ev.origin_server_ts.as_secs()) as i64,
                    body,
                );
                forward(&tx, RoomEvent::Messages(vec![msg])).await;
            }
        }
    });

    let member_handler = client.add_room_event_handler(room.room_id(), {
        let tx = tx.clone();
        move |_ev: SyncRoomMemberEvent, room: Room| {
            let tx = tx.clone();
            async move {
                match members(&room).await {
                    Ok(members) => {
                        forward(&tx, RoomEvent::Roster(members)).await;
                    }
                    Err(e) => {
                        tracing::warn!(room_id = %room.room_id(), error = %e, "Roster refresh failed");
                    }
                }
            }
        }
    });
    drop(tx);

    let exit = run_room(bot, rx).await;

    client.remove_event_handler(message_handler);
    client.remove_event_handler(member_handler);
    if let Err(e) = sender.await {
        tracing::warn!(room = %name, error = %e, "Room sender task failed");
    }
    if exit == RoomExit::Finished {
        room.leave().await.context("Failed to leave room")?;
        tracing::info!(room = %name, "Left room");
    }
    Ok(exit)
}
