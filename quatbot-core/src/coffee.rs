// ABOUTME: The "coffee" module - coffee counter, cookie jar and cookie economy
// ABOUTME: Counters are saved after every change; the jar slowly refills on a timer

use crate::coffee_store::{CoffeeStats, CoffeeStore};
use crate::commands::CommandArgs;
use crate::config::CoffeeConfig;
use crate::context::BotContext;
use crate::timer::IdleTimer;
use crate::traits::IncomingMessage;
use crate::watcher::Watcher;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

const COMMANDS: &[&str] = &["coffee", "cookie", "lart", "stats", "status"];

pub struct Coffee {
    jar: i32,
    jar_size: i32,
    stats: BTreeMap<String, CoffeeStats>,
    store: CoffeeStore,
    refill: IdleTimer,
}

impl Coffee {
    pub fn new(config: &CoffeeConfig) -> Self {
        Self::with_store(
            CoffeeStore::new(config.data_path()),
            config.jar_size,
            config.refill_interval(),
        )
    }

    /// A full jar, with counters loaded from `store` if it has any
    pub fn with_store(store: CoffeeStore, jar_size: i32, refill_interval: Duration) -> Self {
        let mut refill = IdleTimer::new();
        refill.start(Instant::now(), refill_interval);
        let mut coffee = Self {
            jar: jar_size,
            jar_size,
            stats: BTreeMap::new(),
            store,
            refill,
        };
        coffee.load();
        coffee
    }

    fn load(&mut self) {
        match self.store.load() {
            Ok(Some(records)) => {
                for r in records {
                    self.stats.insert(r.user.clone(), r);
                }
            }
            Ok(None) => {
                tracing::debug!(dir = %self.store.dir().display(), "No cookie jar saved yet");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring saved cookie jar");
            }
        }
    }

    fn save(&mut self) {
        if let Err(e) = self.store.save(self.stats.values()) {
            tracing::warn!(error = %e, "Could not save cookie jar");
        }
    }

    pub fn cookies_in_jar(&self) -> i32 {
        self.jar
    }

    pub fn stats_for(&self, user: &str) -> Option<&CoffeeStats> {
        self.stats.get(user)
    }

    fn find(&mut self, user: &str) -> &mut CoffeeStats {
        self.stats
            .entry(user.to_string())
            .or_insert_with(|| CoffeeStats::new(user))
    }

    /// Returns the user's coffee count
    fn coffee(&mut self, user: &str) -> i32 {
        let stats = self.find(user);
        stats.coffee += 1;
        let count = stats.coffee;
        self.save();
        count
    }

    fn eat_cookie(&mut self, user: &str) -> bool {
        let stats = self.find(user);
        if stats.cookies < 1 {
            return false;
        }
        stats.cookies -= 1;
        stats.cookies_eaten += 1;
        self.save();
        true
    }

    fn transfer_cookie(&mut self, from: &str, to: &str) -> bool {
        if self.find(from).cookies < 1 {
            return false;
        }
        self.find(from).cookies -= 1;
        self.find(to).cookies += 1;
        self.save();
        true
    }

    fn cookie_from_jar(&mut self, to: &str) -> bool {
        if self.jar < 1 {
            return false;
        }
        self.jar -= 1;
        self.find(to).cookies += 1;
        self.save();
        true
    }

    fn cookie_command(&mut self, cmd: &CommandArgs, ctx: &mut BotContext<'_>) {
        let user = cmd.sender_id();
        match cmd.verb.as_str() {
            // Plain "~cookie" eats one
            "" | "eat" => {
                if self.eat_cookie(user) {
                    ctx.message(format!("**{user}** nom nom nom"));
                } else {
                    ctx.message("You haz no cookiez :(");
                }
            }
            "give" => {
                for other in ctx.lookup_identities(&cmd.args[..]) {
                    if !ctx.roster().contains(&other) {
                        ctx.message(format!("{other}'s not here, Dave."));
                    } else if other == user {
                        ctx.message("It's a circular economy.");
                    } else if self.transfer_cookie(user, &other) {
                        ctx.message(format!("**{user}** gives {other} a cookie."));
                    } else if self.cookie_from_jar(&other) {
                        ctx.message(format!("{other} gets a cookie from the jar."));
                    } else {
                        ctx.message("Hey! Who took all the cookies from the jar?");
                    }
                }
            }
            _ => ctx.message("Cookies don't work that way."),
        }
    }

    fn report(&self, long: bool, ctx: &mut BotContext<'_>) {
        ctx.message(format!("(coffee) There are {} cookies in the jar.", self.jar));
        if !long {
            return;
        }
        for s in self.stats.values() {
            let mut line = format!("{} has had {} cups of coffee", s.user, s.coffee);
            if s.cookies > 0 {
                line.push_str(&format!(" and has {} cookies", s.cookies));
            }
            if s.cookies_eaten > 0 {
                line.push_str(&format!(" and has eaten {} cookies", s.cookies_eaten));
            }
            line.push_str(" so far.");
            ctx.message(line);
        }
    }
}

impl Watcher for Coffee {
    fn name(&self) -> &str {
        "coffee"
    }

    fn commands(&self) -> &[&'static str] {
        COMMANDS
    }

    fn handle_message(&mut self, _msg: &IncomingMessage, _ctx: &mut BotContext<'_>) {}

    fn handle_command(&mut self, cmd: &CommandArgs, ctx: &mut BotContext<'_>) {
        let user = cmd.sender_id();
        match cmd.verb.as_str() {
            "status" => self.report(false, ctx),
            "stats" => self.report(true, ctx),
            "cookie" => {
                let mut sub = cmd.clone();
                sub.pop();
                self.cookie_command(&sub, ctx);
            }
            // Plain "~coffee" arrives here with no verb
            "" | "coffee" => {
                if self.coffee(user) <= 1 {
                    ctx.message(format!("{user} is now a coffee drinker."));
                } else {
                    ctx.message(format!("{user} has a nice cup of coffee."));
                }
            }
            "lart" => ctx.message(format!("{user} is eaten by a large trout.")),
            _ => {
                let usage = self.usage(ctx.prefix());
                ctx.message(usage);
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.refill.deadline()
    }

    fn handle_timeout(&mut self, ctx: &mut BotContext<'_>) {
        if !self.refill.poll_expired(ctx.now()) {
            return;
        }
        if self.jar < self.jar_size {
            self.jar += 1;
            tracing::debug!(jar = self.jar, "Cookie jar refilled");
        }
        self.refill.restart(ctx.now());
    }
}
