// ABOUTME: Counters for messages seen, commands dispatched and posts sent
// ABOUTME: Recorded through the metrics facade; exporting is up to the binary

/// Metric names
pub const MESSAGES_TOTAL: &str = "quatbot_messages_total";
pub const COMMANDS_TOTAL: &str = "quatbot_commands_total";
pub const POSTS_TOTAL: &str = "quatbot_posts_total";
pub const ROUTING_FAILURES_TOTAL: &str = "quatbot_routing_failures_total";

pub fn record_message() {
    metrics::counter!(MESSAGES_TOTAL).increment(1);
}

pub fn record_command(module: &str, verb: &str) {
    metrics::counter!(
        COMMANDS_TOTAL,
        "module" => module.to_string(),
        "verb" => verb.to_string()
    )
    .increment(1);
}

/// `reason` is "ambiguous" or "unknown"
pub fn record_routing_failure(reason: &'static str) {
    metrics::counter!(ROUTING_FAILURES_TOTAL, "reason" => reason).increment(1);
}

pub fn record_post() {
    metrics::counter!(POSTS_TOTAL).increment(1);
}
