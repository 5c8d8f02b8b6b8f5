// ABOUTME: Shared bot state (operators, roster, outbox) and the per-call context
// ABOUTME: BotContext is how a module talks to the room and to the other modules

use crate::commands::{display_command, CommandArgs};
use crate::metrics;
use crate::operators::{OperatorSet, OpsError};
use crate::roster::Roster;
use crate::traits::RoomSink;
use crate::watcher::Watcher;
use std::sync::Arc;
use tokio::time::Instant;

/// Standard reply when a privileged command is refused
pub const OPERATORS_ONLY: &str = "Only operators can do that.";

/// Name and verbs of one module, for help output
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub name: String,
    pub commands: Vec<&'static str>,
}

/// State of one room-bot that is not owned by any module
#[derive(Debug)]
pub struct BotCore {
    pub(crate) room_id: String,
    pub(crate) prefix: char,
    pub(crate) operators: OperatorSet,
    pub(crate) roster: Roster,
    pub(crate) modules: Vec<ModuleInfo>,
    pub(crate) now: Instant,
    pub(crate) finished: bool,
    outbox: Vec<String>,
    sink: Arc<dyn RoomSink>,
}

impl BotCore {
    pub(crate) fn new(
        room_id: String,
        bot_user: String,
        prefix: char,
        sink: Arc<dyn RoomSink>,
    ) -> Self {
        Self {
            room_id,
            prefix,
            operators: OperatorSet::new(bot_user),
            roster: Roster::default(),
            modules: Vec::new(),
            now: Instant::now(),
            finished: false,
            outbox: Vec::new(),
            sink,
        }
    }

    pub(crate) fn push(&mut self, text: String) {
        self.outbox.push(text);
    }

    /// Send everything said so far as one message
    pub(crate) fn flush(&mut self) {
        if self.outbox.is_empty() {
            return;
        }
        let text = self.outbox.join("\n");
        self.outbox.clear();
        metrics::record_post();
        tracing::debug!(room_id = %self.room_id, lines = text.lines().count(), "Posting to room");
        self.sink.post_plain_text(text);
    }

    pub(crate) fn is_privileged(&self, cmd: &CommandArgs) -> bool {
        cmd.internal || self.operators.contains(cmd.sender_id())
    }
}

/// The modules other than the one currently being called
#[derive(Default)]
pub struct Others<'a> {
    pub(crate) before: &'a mut [Box<dyn Watcher>],
    pub(crate) after: &'a mut [Box<dyn Watcher>],
}

impl<'a> Others<'a> {
    /// All modules; used when the bot itself is speaking
    pub(crate) fn all(watchers: &'a mut [Box<dyn Watcher>]) -> Self {
        Self {
            before: watchers,
            after: Default::default(),
        }
    }

    /// Every module except the one at `index`, which is returned separately
    pub(crate) fn split(
        watchers: &'a mut [Box<dyn Watcher>],
        index: usize,
    ) -> Option<(&'a mut Box<dyn Watcher>, Self)> {
        if index >= watchers.len() {
            return None;
        }
        let (before, rest) = watchers.split_at_mut(index);
        let (current, after) = rest.split_first_mut()?;
        Some((current, Self { before, after }))
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Watcher>> {
        self.before.iter_mut().chain(self.after.iter_mut())
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut Box<dyn Watcher>> {
        self.iter_mut().find(|w| w.name() == name)
    }
}

/// What a module gets to work with while handling a message, command or
/// timeout.
pub struct BotContext<'a> {
    pub(crate) core: &'a mut BotCore,
    pub(crate) others: Others<'a>,
}

impl<'a> BotContext<'a> {
    /// Say something in the room. Lines are collected and sent together
    /// when the current command is done (or on [`BotContext::flush`]).
    pub fn message(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        for watcher in self.others.iter_mut() {
            watcher.handle_bot_message(&text);
        }
        self.core.push(text);
    }

    /// Say a list of words, joined with spaces
    pub fn message_words<S: AsRef<str>>(&mut self, words: &[S]) {
        let text = words
            .iter()
            .map(|w| w.as_ref())
            .collect::<Vec<_>>()
            .join(" ");
        self.message(text);
    }

    /// Send what has been said so far as a separate message
    pub fn flush(&mut self) {
        self.core.flush();
    }

    /// Is the command issued by an operator? Says so in the room if not.
    pub fn check_ops(&mut self, cmd: &CommandArgs) -> bool {
        if self.core.is_privileged(cmd) {
            return true;
        }
        self.message(OPERATORS_ONLY);
        false
    }

    /// Is the command issued by an operator? No message.
    pub fn is_privileged(&self, cmd: &CommandArgs) -> bool {
        self.core.is_privileged(cmd)
    }

    pub fn is_operator(&self, identity: &str) -> bool {
        self.core.operators.contains(identity)
    }

    pub fn set_ops(&mut self, identity: &str, enable: bool) -> Result<(), OpsError> {
        let result = self.core.operators.set_ops(identity, enable);
        match &result {
            Ok(()) => tracing::info!(
                room_id = %self.core.room_id,
                identity = %identity,
                enable,
                "Operator status changed"
            ),
            Err(e) => tracing::debug!(
                room_id = %self.core.room_id,
                identity = %identity,
                enable,
                error = %e,
                "Operator change refused"
            ),
        }
        result
    }

    pub fn operator_ids(&self) -> Vec<String> {
        self.core.operators.ids()
    }

    pub fn lookup_identity(&self, name: &str) -> Option<String> {
        self.core.roster.lookup_identity(name)
    }

    pub fn lookup_identities<S: AsRef<str>>(&self, words: &[S]) -> Vec<String> {
        self.core.roster.lookup_identities(words)
    }

    pub fn roster(&self) -> &Roster {
        &self.core.roster
    }

    /// All identities currently in the room
    pub fn user_ids(&self) -> Vec<String> {
        self.core.roster.user_ids()
    }

    pub fn bot_user(&self) -> &str {
        self.core.operators.bot_user()
    }

    pub fn room_id(&self) -> &str {
        &self.core.room_id
    }

    pub fn prefix(&self) -> char {
        self.core.prefix
    }

    /// Human-readable command with prefix, e.g. "~next"
    pub fn display_command(&self, verb: &str) -> String {
        display_command(self.core.prefix, verb)
    }

    /// Time at which the current event is being processed
    pub fn now(&self) -> Instant {
        self.core.now
    }

    /// All modules, fallback first
    pub fn modules(&self) -> &[ModuleInfo] {
        &self.core.modules
    }

    /// Pass a command to another module. Returns false if there is no
    /// such module. The called module's own output is not shown to the
    /// other modules.
    pub fn call_module(&mut self, name: &str, cmd: &CommandArgs) -> bool {
        let BotContext { core, others } = self;
        let Some(watcher) = others.find_mut(name) else {
            return false;
        };
        let mut nested = BotContext {
            core: &mut **core,
            others: Others::default(),
        };
        watcher.handle_command(cmd, &mut nested);
        true
    }

    /// Ask the room loop to shut this bot down once output is flushed
    pub fn finish(&mut self) {
        tracing::info!(room_id = %self.core.room_id, "Bot asked to quit");
        self.core.finished = true;
    }
}


#[cfg(test)]
mod tests {
    use super::testing::TestRoom;
    use super::*;

    #[test]
    fn test_lines_are_coalesced_on_flush() {
        let mut room = TestRoom::new("@bot:example.org", &[]);
        let mut ctx = room.context();
        ctx.message("one");
        ctx.message("");
        ctx.message_words(&["two", "three"]);
        ctx.flush();
        ctx.flush();
        assert_eq!(room.posts(), vec!["one\ntwo three"]);
    }

    #[test]
    fn test_check_ops_complains() {
        let mut room = TestRoom::new("@bot:example.org", &[]);
        let mut ctx = room.context();
        let user = CommandArgs {
            sender: Some("@user:example.org".to_string()),
            verb: "x".to_string(),
            ..CommandArgs::default()
        };
        assert!(!ctx.check_ops(&user));
        let internal = CommandArgs {
            internal: true,
            ..user.clone()
        };
        assert!(ctx.check_ops(&internal));
        let bot = CommandArgs {
            sender: Some("@bot:example.org".to_string()),
            ..user
        };
        assert!(ctx.check_ops(&bot));
        ctx.flush();
        assert_eq!(room.posts(), vec![OPERATORS_ONLY]);
    }

    #[test]
    fn test_call_module_without_modules() {
        let mut room = TestRoom::new("@bot:example.org", &[]);
        let mut ctx = room.context();
        assert!(!ctx.call_module("log", &CommandArgs::default()));
    }
}
