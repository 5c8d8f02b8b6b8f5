// ABOUTME: Watcher trait - the capability interface every bot module implements
// ABOUTME: Modules see every message, and handle the commands routed to them

use crate::commands::{display_command, CommandArgs};
use crate::context::BotContext;
use crate::traits::IncomingMessage;
use tokio::time::Instant;

/// A module of the bot.
///
/// A watcher sees every text message in the room through
/// [`Watcher::handle_message`]. Messages that are commands are additionally
/// routed to exactly one watcher's [`Watcher::handle_command`], **after** all
/// the message hooks have run.
///
/// The name identifies which commands go where: the watcher named "log"
/// receives "~log on" as the sub-command "on". The fallback module has an
/// empty name and only receives verbs it declares in [`Watcher::commands`].
pub trait Watcher: Send {
    /// Identifier of this module; empty only for the fallback module
    fn name(&self) -> &str;

    /// The (sub-)commands this module understands. Don't include the
    /// module name unless it is a valid sub-command itself.
    fn commands(&self) -> &[&'static str];

    /// Called for every text message in the room
    fn handle_message(&mut self, msg: &IncomingMessage, ctx: &mut BotContext<'_>);

    /// Called for commands routed to this module
    fn handle_command(&mut self, cmd: &CommandArgs, ctx: &mut BotContext<'_>);

    /// Called for each line the bot itself says
    fn handle_bot_message(&mut self, _text: &str) {}

    /// When this module next wants [`Watcher::handle_timeout`] to be called
    fn next_deadline(&self) -> Option<Instant> {
        None
    }

    /// Called from the room loop once a deadline has passed
    fn handle_timeout(&mut self, _ctx: &mut BotContext<'_>) {}

    /// Standard usage line, e.g. "Usage: ~log <on|off|status>"
    fn usage(&self, prefix: char) -> String {
        format!(
            "Usage: {} <{}>",
            display_command(prefix, self.name()),
            self.commands().join("|")
        )
    }
}
