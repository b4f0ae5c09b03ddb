/// Application name
pub const APP_NAME: &str = "Krishna Connect";

/// Delay after send before a direct message is marked delivered (ms)
pub const DELIVERED_AFTER_MS: u64 = 1_000;

/// Delay after send before a direct message is marked read (ms)
pub const READ_AFTER_MS: u64 = 3_000;

/// Polling interval of the simulated push source in seconds
pub const PUSH_POLL_SECS: u64 = 10;

/// Chance per poll that the simulated push source produces a notification
pub const PUSH_ARRIVAL_PROBABILITY: f64 = 0.05;

/// Unread badges above this value render as "99+"
pub const MAX_BADGE_COUNT: usize = 99;

/// Maximum number of hits returned by a message search
pub const MAX_SEARCH_RESULTS: usize = 100;

/// Maximum message body length in characters
pub const MAX_MESSAGE_CHARS: usize = 4_000;
