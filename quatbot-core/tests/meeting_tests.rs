// ABOUTME: End-to-end meeting tests through a Bot with the standard modules
// ABOUTME: Roll-call, turns, transcript recording and reminders on a paused clock

use quatbot_core::meeting::notes_id;
use quatbot_core::{Bot, ChatUser, Config, IncomingMessage, RoomSink};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const BOT: &str = "@bot:example.org";
const A: &str = "@a:example.org";
const B: &str = "@b:example.org";
const C: &str = "@c:example.org";

#[derive(Debug, Default)]
struct MockSink {
    posts: Mutex<Vec<String>>,
}

impl RoomSink for MockSink {
    fn post_plain_text(&self, text: String) {
        self.posts.lock().unwrap().push(text);
    }
}

struct Room {
    bot: Bot,
    sink: Arc<MockSink>,
    dir: TempDir,
}

impl Room {
    fn new(members: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = Config::default();
        config.logging.transcript_dir = Some(dir.path().join("logs").display().to_string());
        config.coffee.enabled = false;

        let sink = Arc::new(MockSink::default());
        let mut bot = Bot::from_config(&config, "!room:example.org", BOT, sink.clone()).unwrap();
        bot.update_roster(
            members
                .iter()
                .map(|(id, name)| ChatUser::with_name(*id, *name))
                .collect(),
        );
        Self { bot, sink, dir }
    }

    fn send(&mut self, sender: &str, body: &str) -> Vec<String> {
        let msg = IncomingMessage::new(ChatUser::new(sender), "$event", 1_700_000_000, body);
        self.bot.process_batch(&[msg]);
        self.take()
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.sink.posts.lock().unwrap())
    }

    fn transcript(&self) -> PathBuf {
        self.dir
            .path()
            .join("logs")
            .join(format!("quatbot-{}.log", notes_id()))
    }
}

fn abc() -> Room {
    Room::new(&[(BOT, "bot"), (A, "alice"), (B, "bob"), (C, "carol")])
}

#[test]
fn test_three_person_meeting() {
    let mut room = abc();

    assert_eq!(
        room.send(A, "~rollcall"),
        vec![format!(
            "Hello @room, this is the roll-call! {A} is chair. Calling {B} {C}"
        )]
    );
    assert!(room.send(B, "here").is_empty());
    assert!(room.send(C, "me too").is_empty());

    let posts = room.send(A, "~next");
    assert_eq!(posts.len(), 1);
    assert!(posts[0].starts_with("(meeting) Meeting in progress."));
    assert!(posts[0].ends_with(&format!("{B}, you're up (after that, {C}).")));

    // The speaker hands over themselves
    let posts = room.send(B, "~next");
    assert_eq!(
        posts,
        vec![format!(
            "{C}, you're up (after that, we're done!).\n\
             {A} or any operator, don't forget to call ~next to finish the meeting."
        )]
    );

    assert_eq!(
        room.send(A, "~next"),
        vec!["That was the last one! We're done."]
    );
    assert_eq!(
        room.send(B, "~meeting status"),
        vec!["(meeting) No meeting in progress."]
    );
}

#[test]
fn test_meeting_is_recorded() {
    let mut room = abc();
    room.send(A, "~rollcall");
    room.send(B, "here");
    room.send(C, "present");
    room.send(A, "~next");
    room.send(B, "I did things");
    room.send(A, "~next");
    room.send(A, "~next");
    room.send(B, "not recorded any more");

    let text = std::fs::read_to_string(room.transcript()).unwrap();
    assert!(text.contains("this is the roll-call!"));
    assert!(text.contains("@b          \tI did things"));
    assert!(text.contains("*BOT*       \tThat was the last one! We're done."));
    assert!(!text.contains("not recorded"));
    assert_eq!(
        room.send(B, "~log status"),
        vec!["Logging is off."]
    );
}

#[test]
fn test_only_chair_or_operator_moves_on() {
    let mut room = abc();
    room.send(A, "~rollcall");
    assert_eq!(
        room.send(C, "~next"),
        vec!["Only operators can do that."]
    );
    assert_eq!(
        room.send(B, "~done"),
        vec!["Only operators can do that."]
    );
}

#[tokio::test(start_paused = true)]
async fn test_rollcall_reminders() {
    let mut room = Room::new(&[(BOT, "bot"), (A, "alice"), (B, "bob"), (C, "carol")]);
    room.send(A, "~rollcall");
    room.send(B, "here");

    tokio::time::advance(Duration::from_secs(59)).await;
    room.bot.handle_timeout();
    assert!(room.take().is_empty());

    tokio::time::advance(Duration::from_secs(2)).await;
    room.bot.handle_timeout();
    assert_eq!(room.take(), vec![format!("Roll-call reminder for {C}")]);

    room.send(C, "sorry, here");
    tokio::time::advance(Duration::from_secs(61)).await;
    room.bot.handle_timeout();
    assert!(room.take().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_speaker_reminder() {
    let mut room = abc();
    room.send(A, "~rollcall");
    room.send(B, "here");
    room.send(C, "here");
    room.send(A, "~next");

    tokio::time::advance(Duration::from_secs(31)).await;
    room.bot.handle_timeout();
    assert_eq!(room.take(), vec![format!("{B} are you with us?")]);

    room.send(B, "yes, sorry");
    tokio::time::advance(Duration::from_secs(31)).await;
    room.bot.handle_timeout();
    assert!(room.take().is_empty());
    assert!(room.bot.next_deadline().is_none());
}
