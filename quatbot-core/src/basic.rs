// ABOUTME: Fallback module with the bot's own commands: echo, fortune, op, deop, ops, status, help, quit
// ABOUTME: Has an empty name, so it is reached only through the verbs it declares

use crate::commands::CommandArgs;
use crate::context::BotContext;
use crate::traits::IncomingMessage;
use crate::watcher::Watcher;
use chrono::{DateTime, Utc};
use std::process::Command;

const COMMANDS: &[&str] = &["echo", "fortune", "op", "deop", "ops", "status", "help", "quit"];

const NO_FORTUNE: &str = "No fortune for you!";

/// Run the fortune program (which may include arguments) and return its
/// output, or the standard refusal if it can't be run or fails.
fn fortune(program: &str) -> String {
    let mut words = program.split_whitespace();
    let Some(executable) = words.next() else {
        return NO_FORTUNE.to_string();
    };
    match Command::new(executable).args(words).output() {
        Ok(output) if output.status.success() => {
            let text = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
            if text.is_empty() {
                NO_FORTUNE.to_string()
            } else {
                text
            }
        }
        Ok(output) => {
            tracing::debug!(program = %program, status = %output.status, "Fortune program failed");
            NO_FORTUNE.to_string()
        }
        Err(e) => {
            tracing::debug!(program = %program, error = %e, "Could not run fortune program");
            NO_FORTUNE.to_string()
        }
    }
}

pub struct BasicCommands {
    fortune_program: String,
    last_message_time: Option<DateTime<Utc>>,
    message_count: u64,
    command_count: u64,
}

impl BasicCommands {
    pub fn new(fortune_program: &str) -> Self {
        Self {
            fortune_program: fortune_program.to_string(),
            last_message_time: None,
            message_count: 0,
            command_count: 0,
        }
    }

    fn change_ops(&self, cmd: &CommandArgs, ctx: &mut BotContext<'_>, enable: bool) {
        if !ctx.check_ops(cmd) {
            return;
        }
        let command = ctx.display_command(&cmd.verb);
        if cmd.args.is_empty() {
            ctx.message(format!("Usage: {command} <userid>"));
            return;
        }
        for name in &cmd.args {
            let Some(user) = ctx.lookup_identity(name) else {
                continue;
            };
            match ctx.set_ops(&user, enable) {
                Ok(()) if enable => ctx.message(format!("{user} is now an operator")),
                Ok(()) => ctx.message(format!("{user} is no longer an operator")),
                Err(_) => ctx.message(format!("{command} failed.")),
            }
        }
    }

    fn help(&self, cmd: &CommandArgs, ctx: &mut BotContext<'_>) {
        let prefix = ctx.prefix();
        let mut lines = Vec::new();
        for module in ctx.modules() {
            if let Some(wanted) = cmd.first_arg() {
                if module.name != wanted {
                    continue;
                }
            }
            let verbs = module.commands.join("|");
            if module.name.is_empty() {
                let all: Vec<String> = module
                    .commands
                    .iter()
                    .map(|v| format!("{prefix}{v}"))
                    .collect();
                lines.push(format!("Commands: {}", all.join(" ")));
            } else {
                lines.push(format!("{prefix}{} <{verbs}>", module.name));
            }
        }
        if lines.is_empty() {
            if let Some(wanted) = cmd.first_arg() {
                lines.push(format!("There is no module '{wanted}'."));
            }
        }
        for line in lines {
            ctx.message(line);
        }
    }

    fn status(&self, ctx: &mut BotContext<'_>) {
        let now = Utc::now().format("%H:%M:%S");
        let sent = self
            .last_message_time
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_default();
        ctx.message(format!(
            "It is {now}. Your message was sent at {sent}.\n\
             I can see {} people in the room. I have processed {} messages and {} commands.",
            ctx.roster().len(),
            self.message_count,
            self.command_count
        ));
    }
}

impl Watcher for BasicCommands {
    fn name(&self) -> &str {
        ""
    }

    fn commands(&self) -> &[&'static str] {
        COMMANDS
    }

    fn handle_message(&mut self, msg: &IncomingMessage, _ctx: &mut BotContext<'_>) {
        self.last_message_time = Some(msg.time());
        self.message_count += 1;
    }

    fn handle_command(&mut self, cmd: &CommandArgs, ctx: &mut BotContext<'_>) {
        match cmd.verb.as_str() {
            "echo" => ctx.message_words(&cmd.args[..]),
            "fortune" => ctx.message(fortune(&self.fortune_program)),
            "op" => self.change_ops(cmd, ctx, true),
            "deop" => self.change_ops(cmd, ctx, false),
            "ops" => {
                let ids = ctx.operator_ids();
                ctx.message(format!("There are {} operators. {}", ids.len(), ids.join(" ")));
            }
            "status" => self.status(ctx),
            "help" => self.help(cmd, ctx),
            "quit" => {
                if ctx.check_ops(cmd) {
                    ctx.message("Goodbye (bot operation terminated)!");
                    ctx.finish();
                }
            }
            _ => {}
        }
        self.command_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fortune_falls_back_when_program_missing() {
        assert_eq!(fortune("/nonexistent/fortune-program"), NO_FORTUNE);
        assert_eq!(fortune(""), NO_FORTUNE);
    }

    #[cfg(unix)]
    #[test]
    fn test_fortune_runs_program_with_arguments() {
        assert_eq!(fortune("echo be excellent"), "be excellent");
        assert_eq!(fortune("false"), NO_FORTUNE);
    }

    #[test]
    fn test_basic_commands_is_fallback() {
        let basic = BasicCommands::new("fortune");
        assert!(basic.name().is_empty());
        assert!(basic.commands().contains(&"quit"));
    }
}
