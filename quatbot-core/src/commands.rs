// ABOUTME: Command parsing for prefixed chat directives like "~rollcall"
// ABOUTME: Produces CommandArgs (verb + args) and supports popping sub-commands

use crate::traits::IncomingMessage;

/// Default command prefix character
pub const DEFAULT_PREFIX: char = '~';

/// A command with zero or more arguments.
///
/// Commands have a primary verb and an argument list. Sub-commands are
/// supported through [`CommandArgs::pop`], which shifts the first argument
/// into the verb position.
///
/// A command built from a real message carries the event id and the sender;
/// the sender is what the operator checks look at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    /// Event id of the message this command came from, if any
    pub source_event_id: Option<String>,
    /// Identity of the sender, if any
    pub sender: Option<String>,
    /// The primary verb (without prefix)
    pub verb: String,
    /// Remaining whitespace-separated words
    pub args: Vec<String>,
    /// Synthesized by the bot itself; always passes operator checks
    pub internal: bool,
}

/// Check whether `body` looks like a command for the given prefix
pub fn is_command(body: &str, prefix: char) -> bool {
    body.starts_with(prefix)
}

impl CommandArgs {
    /// Parse a command from plain text.
    ///
    /// If the text does not start with `prefix`, or there is no verb right
    /// after the prefix, the result is invalid (empty verb).
    pub fn parse(body: &str, prefix: char) -> Self {
        let Some(rest) = body.strip_prefix(prefix) else {
            return Self::default();
        };

        let mut parts = rest.split(' ').map(str::trim);
        let verb = parts.next().unwrap_or_default().to_string();
        let args = parts
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            verb,
            args,
            ..Self::default()
        }
    }

    /// Parse a command from an incoming message, keeping event id and sender
    pub fn from_message(msg: &IncomingMessage, prefix: char) -> Self {
        Self {
            source_event_id: Some(msg.event_id.clone()),
            sender: Some(msg.sender.id.clone()),
            ..Self::parse(&msg.body, prefix)
        }
    }

    /// Build a command the bot issues to itself.
    ///
    /// The prefix is optional here; internal commands always count as
    /// issued by an operator.
    pub fn internal(text: &str, prefix: char) -> Self {
        let mut cmd = if is_command(text, prefix) {
            Self::parse(text, prefix)
        } else {
            Self::parse(&format!("{prefix}{text}"), prefix)
        };
        cmd.internal = true;
        cmd
    }

    /// Is this a usable command (non-empty verb)?
    pub fn is_valid(&self) -> bool {
        !self.verb.is_empty()
    }

    /// Shift the first argument into the verb position.
    ///
    /// With no arguments left the verb is cleared and the command becomes
    /// invalid. Returns whether the command is still valid.
    pub fn pop(&mut self) -> bool {
        if self.args.is_empty() {
            self.verb.clear();
        } else {
            self.verb = self.args.remove(0);
        }
        self.is_valid()
    }

    /// Sender identity, or empty string when there is none
    pub fn sender_id(&self) -> &str {
        self.sender.as_deref().unwrap_or_default()
    }

    /// Get the first argument if present
    pub fn first_arg(&self) -> Option<&str> {
        self.args.first().map(|s| s.as_str())
    }
}

/// Human-readable form of a command, with prefix (e.g. "~log")
pub fn display_command(prefix: char, verb: &str) -> String {
    format!("{prefix}{verb}")
}
