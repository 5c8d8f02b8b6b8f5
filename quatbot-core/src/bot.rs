// ABOUTME: The dispatcher for one room - owns the modules, operators, roster and outbox
// ABOUTME: Routes commands by module name first, then by unique verb ownership

use crate::basic::BasicCommands;
use crate::coffee::Coffee;
use crate::commands::CommandArgs;
use crate::config::Config;
use crate::context::{BotContext, BotCore, ModuleInfo, Others};
use crate::logger::Logger;
use crate::meeting::Meeting;
use crate::metrics;
use crate::operators::OpsError;
use crate::timer::earliest;
use crate::traits::{ChatUser, IncomingMessage, RoomSink};
use crate::watcher::Watcher;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::time::Instant;

/// The standard set of modules: basic commands (fallback), log, meeting and
/// (when enabled) coffee.
pub fn standard_watchers(config: &Config) -> Vec<Box<dyn Watcher>> {
    let mut watchers: Vec<Box<dyn Watcher>> = vec![
        Box::new(BasicCommands::new(&config.logging.fortune_program)),
        Box::new(Logger::new(config.logging.transcript_path())),
        Box::new(Meeting::new(&config.meeting)),
    ];
    if config.coffee.enabled {
        watchers.push(Box::new(Coffee::new(&config.coffee)));
    }
    watchers
}

/// Verbs declared by more than one module, not counting the fallback
/// module (empty name), which never makes a verb ambiguous.
fn ambiguous_verbs(watchers: &[Box<dyn Watcher>]) -> HashSet<&'static str> {
    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    let mut fallback: HashSet<&'static str> = HashSet::new();
    for watcher in watchers {
        if watcher.name().is_empty() {
            fallback.extend(watcher.commands().iter().copied());
            continue;
        }
        for &verb in watcher.commands() {
            *counts.entry(verb).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .filter(|(verb, n)| *n > 1 && !fallback.contains(verb))
        .map(|(verb, _)| verb)
        .collect()
}

/// One bot instance, serving one room.
pub struct Bot {
    core: BotCore,
    watchers: Vec<Box<dyn Watcher>>,
    ambiguous: HashSet<&'static str>,
}

impl Bot {
    pub fn new(
        room_id: impl Into<String>,
        bot_user: impl Into<String>,
        prefix: char,
        sink: Arc<dyn RoomSink>,
        watchers: Vec<Box<dyn Watcher>>,
    ) -> Self {
        let mut core = BotCore::new(room_id.into(), bot_user.into(), prefix, sink);
        core.modules = watchers
            .iter()
            .map(|w| ModuleInfo {
                name: w.name().to_string(),
                commands: w.commands().to_vec(),
            })
            .collect();
        let ambiguous = ambiguous_verbs(&watchers);
        if !ambiguous.is_empty() {
            let mut verbs: Vec<_> = ambiguous.iter().copied().collect();
            verbs.sort_unstable();
            tracing::debug!(room_id = %core.room_id, ?verbs, "Ambiguous verbs");
        }
        tracing::info!(
            room_id = %core.room_id,
            modules = core.modules.len(),
            "Bot created"
        );
        Self {
            core,
            watchers,
            ambiguous,
        }
    }

    /// A bot with the standard modules and the configured operators
    pub fn from_config(
        config: &Config,
        room_id: impl Into<String>,
        bot_user: impl Into<String>,
        sink: Arc<dyn RoomSink>,
    ) -> Result<Self, OpsError> {
        let mut bot = Self::new(
            room_id,
            bot_user,
            config.bot.prefix_char(),
            sink,
            standard_watchers(config),
        );
        for op in &config.bot.operators {
            bot.set_ops(op, true)?;
        }
        Ok(bot)
    }

    /// Handle newly arrived messages, in order
    pub fn process_batch(&mut self, messages: &[IncomingMessage]) {
        for msg in messages {
            self.handle_incoming(msg);
        }
        self.core.flush();
    }

    /// Let every module see the message, then route it if it is a command.
    /// Everything said in response goes out as one post.
    pub fn handle_incoming(&mut self, msg: &IncomingMessage) {
        self.core.now = Instant::now();
        metrics::record_message();

        for index in 0..self.watchers.len() {
            if let Some((watcher, others)) = Others::split(&mut self.watchers, index) {
                let mut ctx = BotContext {
                    core: &mut self.core,
                    others,
                };
                watcher.handle_message(msg, &mut ctx);
            }
        }

        let cmd = CommandArgs::from_message(msg, self.core.prefix);
        if cmd.is_valid() {
            self.dispatch(cmd);
        }
        self.core.flush();
    }

    fn dispatch(&mut self, mut cmd: CommandArgs) {
        let by_name = self
            .watchers
            .iter()
            .position(|w| !w.name().is_empty() && w.name() == cmd.verb);
        if let Some(index) = by_name {
            cmd.pop();
            self.invoke(index, &cmd);
            return;
        }

        if self.ambiguous.contains(cmd.verb.as_str()) {
            metrics::record_routing_failure("ambiguous");
            tracing::debug!(verb = %cmd.verb, "Ambiguous command");
            self.say(format!(
                "'{}' is ambiguous. Please use a module command.",
                cmd.verb
            ));
            return;
        }

        let by_verb = self
            .watchers
            .iter()
            .position(|w| w.commands().contains(&cmd.verb.as_str()));
        match by_verb {
            Some(index) => self.invoke(index, &cmd),
            None => {
                metrics::record_routing_failure("unknown");
                self.say(format!("I don't understand '{}'.", cmd.verb));
            }
        }
    }

    fn invoke(&mut self, index: usize, cmd: &CommandArgs) {
        let Some((watcher, others)) = Others::split(&mut self.watchers, index) else {
            return;
        };
        tracing::debug!(
            room_id = %self.core.room_id,
            module = %watcher.name(),
            verb = %cmd.verb,
            sender = %cmd.sender_id(),
            "Dispatching command"
        );
        metrics::record_command(watcher.name(), &cmd.verb);
        let mut ctx = BotContext {
            core: &mut self.core,
            others,
        };
        watcher.handle_command(cmd, &mut ctx);
    }

    /// Say something as the dispatcher; every module sees it
    fn say(&mut self, text: String) {
        let mut ctx = BotContext {
            core: &mut self.core,
            others: Others::all(&mut self.watchers),
        };
        ctx.message(text);
    }

    /// Run module timers whose deadline has passed, then flush
    pub fn handle_timeout(&mut self) {
        self.core.now = Instant::now();
        let now = self.core.now;
        for index in 0..self.watchers.len() {
            let due = self.watchers[index]
                .next_deadline()
                .is_some_and(|deadline| deadline <= now);
            if !due {
                continue;
            }
            if let Some((watcher, others)) = Others::split(&mut self.watchers, index) {
                let mut ctx = BotContext {
                    core: &mut self.core,
                    others,
                };
                watcher.handle_timeout(&mut ctx);
            }
        }
        self.core.flush();
    }

    /// Earliest pending module deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.watchers
            .iter()
            .fold(None, |acc, w| earliest(acc, w.next_deadline()))
    }

    /// Replace the roster snapshot
    pub fn update_roster(&mut self, members: Vec<ChatUser>) {
        tracing::debug!(room_id = %self.core.room_id, members = members.len(), "Roster updated");
        self.core.roster.replace(members);
    }

    pub fn is_finished(&self) -> bool {
        self.core.finished
    }

    pub fn room_id(&self) -> &str {
        &self.core.room_id
    }

    pub fn prefix(&self) -> char {
        self.core.prefix
    }

    pub fn module(&self, name: &str) -> Option<&dyn Watcher> {
        self.watchers
            .iter()
            .find(|w| w.name() == name)
            .map(|w| w.as_ref())
    }

    /// Names of the named modules, in registration order
    pub fn module_names(&self) -> Vec<String> {
        self.watchers
            .iter()
            .map(|w| w.name())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn set_ops(&mut self, identity: &str, enable: bool) -> Result<(), OpsError> {
        self.core.operators.set_ops(identity, enable)
    }

    pub fn is_operator(&self, identity: &str) -> bool {
        self.core.operators.contains(identity)
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
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("room_id", &self.core.room_id)
            .field("modules", &self.module_names())
            .field("finished", &self.core.finished)
            .finish()
    }
}
