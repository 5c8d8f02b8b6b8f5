// ABOUTME: Tests for command routing through a Bot with the standard modules
// ABOUTME: Covers module-name routing, unknown and ambiguous verbs, operators, help and quit

use quatbot_core::{
    Bot, BotContext, ChatUser, CommandArgs, Config, IncomingMessage, RoomSink, Watcher,
};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const ROOM: &str = "!room:example.org";
const BOT: &str = "@bot:example.org";
const ADE: &str = "@ade:kde.org";
const BOB: &str = "@bob:example.org";

#[derive(Debug, Default)]
struct MockSink {
    posts: Mutex<Vec<String>>,
}

impl RoomSink for MockSink {
    fn post_plain_text(&self, text: String) {
        self.posts.lock().unwrap().push(text);
    }
}

impl MockSink {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.posts.lock().unwrap())
    }
}

struct Harness {
    bot: Bot,
    sink: Arc<MockSink>,
    _dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = Config::default();
        config.bot.operators = vec![ADE.to_string()];
        config.logging.transcript_dir = Some(dir.path().join("logs").display().to_string());
        config.logging.fortune_program = "/nonexistent/fortune".to_string();
        config.coffee.data_dir = Some(dir.path().join("data").display().to_string());

        let sink = Arc::new(MockSink::default());
        let mut bot = Bot::from_config(&config, ROOM, BOT, sink.clone()).unwrap();
        bot.update_roster(vec![
            ChatUser::with_name(BOT, "bot"),
            ChatUser::with_name(ADE, "ade"),
            ChatUser::with_name(BOB, "bob"),
        ]);
        Self {
            bot,
            sink,
            _dir: dir,
        }
    }

    fn send(&mut self, sender: &str, body: &str) -> Vec<String> {
        let msg = IncomingMessage::new(ChatUser::new(sender), "$event", 1_700_000_000, body);
        self.bot.process_batch(&[msg]);
        self.sink.take()
    }
}

#[test]
fn test_plain_chatter_gets_no_answer() {
    let mut h = Harness::new();
    assert!(h.send(BOB, "good morning").is_empty());
    assert!(h.send(BOB, "~").is_empty());
}

#[test]
fn test_unknown_verb() {
    let mut h = Harness::new();
    assert_eq!(
        h.send(BOB, "~frobnicate now"),
        vec!["I don't understand 'frobnicate'."]
    );
}

#[test]
fn test_module_name_routes_sub_command() {
    let mut h = Harness::new();
    assert_eq!(h.send(BOB, "~log status"), vec!["Logging is off."]);
    assert_eq!(
        h.send(BOB, "~meeting status"),
        vec!["(meeting) No meeting in progress."]
    );
    assert_eq!(
        h.send(BOB, "~log"),
        vec!["Usage: ~log <on|off|status>"]
    );
}

#[test]
fn test_fallback_owns_shared_verbs() {
    let mut h = Harness::new();
    let posts = h.send(BOB, "~status");
    assert_eq!(posts.len(), 1);
    assert!(posts[0].starts_with("It is "));
    assert!(posts[0].contains("I can see 3 people in the room."));
}

#[test]
fn test_echo_and_fortune() {
    let mut h = Harness::new();
    assert_eq!(h.send(BOB, "~echo hello  world"), vec!["hello world"]);
    assert_eq!(h.send(BOB, "~fortune"), vec!["No fortune for you!"]);
}

#[test]
fn test_operator_commands() {
    let mut h = Harness::new();
    assert_eq!(
        h.send(BOB, "~ops"),
        vec![format!("There are 2 operators. {ADE} {BOT}")]
    );
    assert_eq!(h.send(BOB, "~op bob"), vec!["Only operators can do that."]);
    assert!(!h.bot.is_operator(BOB));

    assert_eq!(h.send(ADE, "~op"), vec!["Usage: ~op <userid>"]);
    assert_eq!(
        h.send(ADE, "~op bob"),
        vec![format!("{BOB} is now an operator")]
    );
    assert!(h.bot.is_operator(BOB));
    assert_eq!(
        h.send(BOB, "~deop ade"),
        vec![format!("{ADE} is no longer an operator")]
    );
    assert_eq!(h.send(BOB, &format!("~deop {BOT}")), vec!["~deop failed."]);
    assert_eq!(h.bot.operator_ids(), vec![BOB.to_string(), BOT.to_string()]);
}

#[test]
fn test_help() {
    let mut h = Harness::new();
    assert_eq!(
        h.send(BOB, "~help"),
        vec![
            "Commands: ~echo ~fortune ~op ~deop ~ops ~status ~help ~quit\n\
             ~log <on|off|status>\n\
             ~meeting <status|rollcall|next|breakout|skip|bump|queue|done>\n\
             ~coffee <coffee|cookie|lart|stats|status>"
        ]
    );
    assert_eq!(h.send(BOB, "~help log"), vec!["~log <on|off|status>"]);
    assert_eq!(h.send(BOB, "~help nope"), vec!["There is no module 'nope'."]);
}

#[test]
fn test_quit_needs_operator() {
    let mut h = Harness::new();
    assert_eq!(h.send(BOB, "~quit"), vec!["Only operators can do that."]);
    assert!(!h.bot.is_finished());
    assert_eq!(
        h.send(ADE, "~quit"),
        vec!["Goodbye (bot operation terminated)!"]
    );
    assert!(h.bot.is_finished());
}

#[test]
fn test_coffee_through_the_bot() {
    let mut h = Harness::new();
    assert_eq!(
        h.send(ADE, "~coffee"),
        vec![format!("{ADE} is now a coffee drinker.")]
    );
    assert_eq!(
        h.send(ADE, "~cookie give bob"),
        vec![format!("{BOB} gets a cookie from the jar.")]
    );
    assert_eq!(
        h.send(BOB, "~cookie"),
        vec![format!("**{BOB}** nom nom nom")]
    );
    assert_eq!(
        h.send(BOB, "~coffee status"),
        vec!["(coffee) There are 11 cookies in the jar."]
    );
}

/// Module with a fixed name and verbs that reports what reached it
struct Echoing {
    name: &'static str,
    verbs: &'static [&'static str],
}

impl Watcher for Echoing {
    fn name(&self) -> &str {
        self.name
    }

    fn commands(&self) -> &[&'static str] {
        self.verbs
    }

    fn handle_message(&mut self, _msg: &IncomingMessage, _ctx: &mut BotContext<'_>) {}

    fn handle_command(&mut self, cmd: &CommandArgs, ctx: &mut BotContext<'_>) {
        ctx.message(format!("{} got {}", self.name, cmd.verb));
    }
}

fn echoing_bot(sink: Arc<MockSink>) -> Bot {
    Bot::new(
        ROOM,
        BOT,
        '~',
        sink,
        vec![
            Box::new(Echoing {
                name: "one",
                verbs: &["reset", "ping"],
            }),
            Box::new(Echoing {
                name: "two",
                verbs: &["reset", "pong"],
            }),
        ],
    )
}

#[test]
fn test_shared_verb_is_ambiguous() {
    let sink = Arc::new(MockSink::default());
    let mut bot = echoing_bot(sink.clone());
    let say = |bot: &mut Bot, body: &str| {
        bot.process_batch(&[IncomingMessage::new(ChatUser::new(BOB), "$e", 0, body)]);
    };

    say(&mut bot, "~reset");
    say(&mut bot, "~two reset");
    say(&mut bot, "~ping");
    say(&mut bot, "~pong");
    assert_eq!(
        sink.take(),
        vec![
            "'reset' is ambiguous. Please use a module command.",
            "two got reset",
            "one got ping",
            "two got pong",
        ]
    );
}

#[test]
fn test_module_names_in_order() {
    let bot = echoing_bot(Arc::new(MockSink::default()));
    assert_eq!(bot.module_names(), vec!["one", "two"]);
    assert!(bot.module("two").is_some());
    assert!(bot.module("three").is_none());
}
