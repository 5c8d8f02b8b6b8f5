// ABOUTME: The "meeting" module - roll-call, speaker queue, breakouts and reminders
// ABOUTME: State machine None -> RollCall -> InProgress -> None, driven by the chair and operators

use crate::commands::CommandArgs;
use crate::config::MeetingConfig;
use crate::context::{BotContext, OPERATORS_ONLY};
use crate::logger::QUIET;
use crate::timer::IdleTimer;
use crate::traits::IncomingMessage;
use crate::watcher::Watcher;
use chrono::{Datelike, Utc};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

const COMMANDS: &[&str] = &[
    "status", "rollcall", "next", "breakout", "skip", "bump", "queue", "done",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingState {
    None,
    RollCall,
    InProgress,
}

impl MeetingState {
    fn short_status(self) -> &'static str {
        match self {
            MeetingState::None => "No meeting in progress.",
            MeetingState::RollCall => "Doing the rollcall.",
            MeetingState::InProgress => "Meeting in progress.",
        }
    }
}

/// A side discussion registered during a meeting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakout {
    pub id: String,
    pub description: String,
    pub chair: String,
    pub participants: Vec<String>,
}

impl std::fmt::Display for Breakout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let title = if self.description.is_empty() {
            &self.id
        } else {
            &self.description
        };
        write!(f, "Breakout: {} ; Chair: {}", title, self.chair)?;
        if !self.participants.is_empty() {
            write!(f, " ; Participants: {}", self.participants.join(" "))?;
        }
        Ok(())
    }
}

/// Transcript id for meetings held this week, e.g. "notes_2024_07"
pub fn notes_id() -> String {
    let week = Utc::now().iso_week();
    format!("notes_{}_{:02}", week.year(), week.week())
}

pub struct Meeting {
    rollcall_interval: Duration,
    turn_interval: Duration,
    reminder_budget: i32,

    state: MeetingState,
    chair: String,
    current: Option<String>,
    queue: Vec<String>,
    done: HashSet<String>,
    skipped: HashSet<String>,
    breakouts: Vec<Breakout>,
    timer: IdleTimer,
    reminders_left: i32,
}

impl Default for Meeting {
    fn default() -> Self {
        Self::new(&MeetingConfig::default())
    }
}

impl Meeting {
    pub fn new(config: &MeetingConfig) -> Self {
        Self {
            rollcall_interval: config.rollcall_interval(),
            turn_interval: config.turn_interval(),
            reminder_budget: config.reminders,
            state: MeetingState::None,
            chair: String::new(),
            current: None,
            queue: Vec::new(),
            done: HashSet::new(),
            skipped: HashSet::new(),
            breakouts: Vec::new(),
            timer: IdleTimer::new(),
            reminders_left: 0,
        }
    }

    pub fn state(&self) -> MeetingState {
        self.state
    }

    pub fn chair(&self) -> &str {
        &self.chair
    }

    pub fn current_speaker(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Upcoming speakers, in order
    pub fn queue(&self) -> &[String] {
        &self.queue
    }

    pub fn is_done(&self, identity: &str) -> bool {
        self.done.contains(identity)
    }

    pub fn breakouts(&self) -> &[Breakout] {
        &self.breakouts
    }

    fn has_started(&self) -> bool {
        self.state != MeetingState::None
    }

    fn is_new(&self, identity: &str) -> bool {
        !self.done.contains(identity) && !self.queue.iter().any(|q| q == identity)
    }

    fn remove_from_queue(&mut self, identity: &str) {
        self.queue.retain(|q| q != identity);
    }

    /// Add a speaker; the chair stays at the tail until they are done
    fn add_participant(&mut self, identity: &str) {
        self.queue.push(identity.to_string());
        if !self.done.contains(&self.chair) {
            let chair = self.chair.clone();
            self.remove_from_queue(&chair);
            self.queue.push(chair);
        }
    }

    fn may_run(&self, cmd: &CommandArgs, ctx: &BotContext<'_>) -> bool {
        cmd.sender_id() == self.chair || ctx.is_privileged(cmd)
    }

    /// Chair or operator; says so if not
    fn check_chair(&self, cmd: &CommandArgs, ctx: &mut BotContext<'_>) -> bool {
        if self.may_run(cmd, ctx) {
            return true;
        }
        ctx.message(OPERATORS_ONLY);
        false
    }

    fn short_status(&self, ctx: &mut BotContext<'_>) {
        ctx.message(self.state.short_status());
    }

    fn status(&self, ctx: &mut BotContext<'_>) {
        let mut parts = vec![
            "(meeting)".to_string(),
            self.state.short_status().to_string(),
        ];
        if self.has_started() {
            parts.push(format!(
                "It is {} (time UTC).",
                Utc::now().format("%a %b %e %H:%M:%S %Y")
            ));
            parts.push(format!("Chaired by {}.", self.chair));
            parts.push(format!("There are {} participants left.", self.queue.len()));
            let done = self
                .done
                .iter()
                .filter(|d| **d != self.chair && d.as_str() != ctx.bot_user())
                .count();
            if done > 0 {
                parts.push(format!("{done} people are already done."));
            }
        }
        let mut text = parts.join(" ");
        if let Some(current) = self.turn() {
            text.push_str(&format!("\nIt is {current} 's turn."));
        }
        ctx.message(text);
    }

    /// The current speaker, while turns are being taken
    fn turn(&self) -> Option<&str> {
        match self.state {
            MeetingState::InProgress => self.current.as_deref(),
            _ => None,
        }
    }

    fn enable_logging(&self, ctx: &mut BotContext<'_>, enable: bool) {
        let cmd = CommandArgs {
            source_event_id: Some(notes_id()),
            sender: Some(self.chair.clone()),
            verb: if enable { "on" } else { "off" }.to_string(),
            args: vec![QUIET.to_string()],
            internal: true,
        };
        if !ctx.call_module("log", &cmd) {
            tracing::debug!("No log module, meeting is not recorded");
        }
    }

    fn arm(&mut self, now: Instant, interval: Duration) {
        self.reminders_left = self.reminder_budget;
        self.timer.start(now, interval);
    }

    fn rollcall(&mut self, cmd: &CommandArgs, ctx: &mut BotContext<'_>) {
        if self.has_started() {
            self.short_status(ctx);
            return;
        }
        let chair = cmd.sender_id().to_string();
        self.state = MeetingState::RollCall;
        self.breakouts.clear();
        self.done.clear();
        self.skipped.clear();
        self.queue = vec![chair.clone()];
        self.chair = chair;
        self.current = None;
        if ctx.bot_user() != self.chair {
            // Don't rollcall the bot itself
            self.done.insert(ctx.bot_user().to_string());
        }
        self.arm(ctx.now(), self.rollcall_interval);
        tracing::info!(room_id = %ctx.room_id(), chair = %self.chair, "Roll-call started");

        self.enable_logging(ctx, true);
        let outstanding: Vec<String> = ctx
            .user_ids()
            .into_iter()
            .filter(|u| self.is_new(u))
            .collect();
        let mut words = vec![
            "Hello @room, this is the roll-call!".to_string(),
            format!("{} is chair.", self.chair),
            "Calling".to_string(),
        ];
        words.extend(outstanding);
        ctx.message_words(&words[..]);
    }

    /// First `next` of the meeting: roll-call answers stop counting as done,
    /// the chair closes the meeting rather than taking a turn. Skips hold.
    fn start_proper(&mut self, ctx: &BotContext<'_>) {
        self.state = MeetingState::InProgress;
        self.done.clear();
        self.done.extend(self.skipped.iter().cloned());
        let bot = ctx.bot_user().to_string();
        let chair = self.chair.clone();
        self.remove_from_queue(&bot);
        self.remove_from_queue(&chair);
        self.done.insert(bot);
        self.done.insert(chair);
        tracing::info!(room_id = %ctx.room_id(), speakers = self.queue.len(), "Meeting started");
    }

    fn next(&mut self, cmd: &CommandArgs, ctx: &mut BotContext<'_>) {
        if !self.has_started() {
            self.short_status(ctx);
            return;
        }
        let yielding = self
            .turn()
            .is_some_and(|current| current == cmd.sender_id());
        if !yielding && !self.check_chair(cmd, ctx) {
            return;
        }

        if self.state == MeetingState::RollCall {
            self.start_proper(ctx);
            self.status(ctx);
        }

        if self.queue.is_empty() {
            self.finish(ctx);
            return;
        }

        let current = self.queue.remove(0);
        self.done.insert(current.clone());
        match self.queue.first() {
            Some(after) => ctx.message(format!("{current}, you're up (after that, {after}).")),
            None => {
                ctx.message(format!("{current}, you're up (after that, we're done!)."));
                ctx.message(format!(
                    "{} or any operator, don't forget to call {} to finish the meeting.",
                    self.chair,
                    ctx.display_command("next")
                ));
            }
        }
        self.current = Some(current);
        self.arm(ctx.now(), self.turn_interval);
    }

    /// Everyone has spoken
    fn finish(&mut self, ctx: &mut BotContext<'_>) {
        self.state = MeetingState::None;
        self.current = None;
        ctx.message("That was the last one! We're done.");
        if !self.breakouts.is_empty() {
            ctx.flush();
            for breakout in &self.breakouts {
                ctx.message(breakout.to_string());
            }
        }
        self.timer.stop();
        tracing::info!(room_id = %ctx.room_id(), breakouts = self.breakouts.len(), "Meeting finished");
        self.enable_logging(ctx, false);
    }

    fn skip(&mut self, cmd: &CommandArgs, ctx: &mut BotContext<'_>) {
        if !self.has_started() {
            self.short_status(ctx);
            return;
        }
        if !self.check_chair(cmd, ctx) {
            return;
        }
        for word in ctx.lookup_identities(&cmd.args[..]) {
            match ctx.lookup_identity(&word) {
                Some(user) => {
                    self.remove_from_queue(&user);
                    ctx.message(format!("User {user} will be skipped this meeting."));
                    self.done.insert(user.clone());
                    self.skipped.insert(user);
                }
                None => ctx.message(format!("{word} isn't here, Dave.")),
            }
        }
    }

    fn bump(&mut self, cmd: &CommandArgs, ctx: &mut BotContext<'_>) {
        if !self.has_started() {
            self.short_status(ctx);
            return;
        }
        if !self.check_chair(cmd, ctx) {
            return;
        }
        let mut position: usize = 1;
        for word in ctx.lookup_identities(&cmd.args[..]) {
            if let Ok(n) = word.parse::<i64>() {
                let max = self.queue.len().max(1) as i64;
                position = n.clamp(1, max) as usize;
                continue;
            }
            let Some(user) = ctx.lookup_identity(&word) else {
                ctx.message(format!("{word} isn't here, Dave."));
                continue;
            };
            self.remove_from_queue(&user);
            self.done.remove(&user);
            self.skipped.remove(&user);
            let index = (position - 1).min(self.queue.len());
            self.queue.insert(index, user.clone());
            if index == 0 {
                ctx.message(format!("User {user} is up next."));
            } else {
                ctx.message(format!("User {user} will be up in {}.", index + 1));
            }
            position += 1;
        }
    }

    fn show_queue(&self, cmd: &CommandArgs, ctx: &mut BotContext<'_>) {
        if !self.has_started() {
            self.short_status(ctx);
            return;
        }
        let len = self.queue.len();
        let mut amount = len;
        if let Some(n) = cmd.first_arg().and_then(|a| a.parse::<i64>().ok()) {
            amount = n.clamp(1, len.max(1) as i64) as usize;
        }

        let mut words = Vec::new();
        if let Some(current) = self.turn() {
            words.push(format!("It is {current} 's turn."));
        }
        if self.queue.is_empty() {
            words.push("No participants after that.".to_string());
        } else {
            if amount >= len {
                words.push("All upcoming participants:".to_string());
            } else {
                words.push(format!("Next {amount} participants:"));
            }
            words.extend(self.queue.iter().take(amount).cloned());
        }
        ctx.message_words(&words[..]);
    }

    fn breakout(&mut self, cmd: &CommandArgs, ctx: &mut BotContext<'_>) {
        if !self.has_started() {
            self.short_status(ctx);
            return;
        }
        let Some((id, description)) = cmd.args.split_first() else {
            ctx.message("Needs a breakout-Id");
            return;
        };
        let user = cmd.sender_id().to_string();
        if let Some(existing) = self.breakouts.iter_mut().find(|b| &b.id == id) {
            ctx.message(format!("{user} joins breakout '{id}'."));
            existing.participants.push(user);
            return;
        }

        let description = description.join(" ");
        let mut text = format!("Breakout '{id}' is registered.");
        if !description.is_empty() {
            text.push(' ');
            text.push_str(&description);
        }
        self.breakouts.push(Breakout {
            id: id.clone(),
            description,
            chair: user,
            participants: Vec::new(),
        });
        ctx.message(text);
    }

    fn force_end(&mut self, cmd: &CommandArgs, ctx: &mut BotContext<'_>) {
        if !ctx.check_ops(cmd) {
            return;
        }
        self.state = MeetingState::None;
        self.current = None;
        self.timer.stop();
        ctx.message("The meeting has been forcefully ended.");
        tracing::info!(room_id = %ctx.room_id(), "Meeting ended by operator");
        self.enable_logging(ctx, false);
    }
}

impl Watcher for Meeting {
    fn name(&self) -> &str {
        "meeting"
    }

    fn commands(&self) -> &[&'static str] {
        COMMANDS
    }

    fn handle_message(&mut self, msg: &IncomingMessage, _ctx: &mut BotContext<'_>) {
        let sender = msg.sender.id.as_str();
        if self.has_started() && self.is_new(sender) {
            self.add_participant(sender);
        }
        if self.turn() == Some(sender) {
            self.timer.stop();
        }
    }

    fn handle_command(&mut self, cmd: &CommandArgs, ctx: &mut BotContext<'_>) {
        match cmd.verb.as_str() {
            "status" => self.status(ctx),
            "rollcall" => self.rollcall(cmd, ctx),
            "next" => self.next(cmd, ctx),
            "skip" => self.skip(cmd, ctx),
            "bump" => self.bump(cmd, ctx),
            "queue" => self.show_queue(cmd, ctx),
            "breakout" => self.breakout(cmd, ctx),
            "done" => self.force_end(cmd, ctx),
            _ => {
                let usage = self.usage(ctx.prefix());
                ctx.message(usage);
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    fn handle_timeout(&mut self, ctx: &mut BotContext<'_>) {
        if !self.timer.poll_expired(ctx.now()) {
            return;
        }
        self.reminders_left -= 1;
        if self.reminders_left < 0 {
            tracing::debug!(room_id = %ctx.room_id(), "Out of reminders");
            return;
        }

        match self.state {
            MeetingState::RollCall => {
                let missing: Vec<String> = ctx
                    .user_ids()
                    .into_iter()
                    .filter(|u| self.is_new(u))
                    .collect();
                if !missing.is_empty() {
                    let mut words = vec!["Roll-call reminder for".to_string()];
                    words.extend(missing);
                    ctx.message_words(&words[..]);
                }
            }
            MeetingState::InProgress => {
                if let Some(current) = &self.current {
                    ctx.message(format!("{current} are you with us?"));
                }
            }
            MeetingState::None => {}
        }
        ctx.flush();
        self.timer.restart(ctx.now());
    }
}
