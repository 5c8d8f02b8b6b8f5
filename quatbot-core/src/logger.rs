// ABOUTME: The "log" module - writes a transcript of the room while logging is on
// ABOUTME: Records every message and every line the bot says; on/off/status sub-commands

use crate::commands::CommandArgs;
use crate::context::BotContext;
use crate::traits::IncomingMessage;
use crate::transcript::{LogFile, BOT_SENDER};
use crate::watcher::Watcher;
use std::path::PathBuf;

const COMMANDS: &[&str] = &["on", "off", "status"];

/// Argument that suppresses the status report after on/off
pub const QUIET: &str = "?quiet";

pub struct Logger {
    file: LogFile,
}

impl Logger {
    pub fn new(transcript_dir: impl Into<PathBuf>) -> Self {
        Self {
            file: LogFile::new(transcript_dir),
        }
    }

    pub fn is_logging(&self) -> bool {
        self.file.is_open()
    }

    /// Say something; the other modules see it through the context, the
    /// transcript gets it here.
    fn say(&mut self, ctx: &mut BotContext<'_>, text: String) {
        self.file.append(None, BOT_SENDER, &text);
        ctx.message(text);
    }

    fn report(&mut self, ctx: &mut BotContext<'_>) {
        let text = match self.file.path() {
            None => "Logging is off.".to_string(),
            Some(_) if self.file.line_count() > 0 => {
                format!("Logging is on, {} lines.", self.file.line_count())
            }
            Some(path) => format!("Logging to {}", path.display()),
        };
        self.say(ctx, text);
    }

    fn usage_line(&self, ctx: &BotContext<'_>) -> String {
        self.usage(ctx.prefix())
    }
}

impl Watcher for Logger {
    fn name(&self) -> &str {
        "log"
    }

    fn commands(&self) -> &[&'static str] {
        COMMANDS
    }

    fn handle_message(&mut self, msg: &IncomingMessage, ctx: &mut BotContext<'_>) {
        tracing::debug!(
            room_id = %ctx.room_id(),
            sender = %msg.sender.id,
            event_id = %msg.event_id,
            body = %msg.body,
            "Room message"
        );
        self.file.append(Some(msg.time()), &msg.sender.id, &msg.body);
    }

    fn handle_bot_message(&mut self, text: &str) {
        self.file.append(None, BOT_SENDER, text);
    }

    fn handle_command(&mut self, cmd: &CommandArgs, ctx: &mut BotContext<'_>) {
        let quiet = match cmd.args.as_slice() {
            [] => false,
            [arg] if arg == QUIET => true,
            _ => {
                let usage = self.usage_line(ctx);
                self.say(ctx, usage);
                return;
            }
        };

        match cmd.verb.as_str() {
            "on" => {
                if ctx.check_ops(cmd) {
                    let id = cmd.source_event_id.as_deref().unwrap_or_default();
                    if let Err(e) = self.file.open(id) {
                        tracing::error!(error = %e, id = %id, "Could not start transcript");
                    }
                }
            }
            "off" => {
                if ctx.check_ops(cmd) {
                    self.file.close();
                }
            }
            "status" => {}
            _ => {
                let usage = self.usage_line(ctx);
                self.say(ctx, usage);
                return;
            }
        }

        if !quiet {
            self.report(ctx);
        }
    }
}
