use std::collections::HashMap;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::config::CONFIG;

static RATE_LIMITS: Lazy<Mutex<HashMap<i64, Instant>>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn check_and_record(
    limits: &mut HashMap<i64, Instant>,
    user_id: i64,
    now: Instant,
    window: Duration,
) -> bool {
    if let Some(last) = limits.get(&user_id) {
        if now.duration_since(*last) < window {
            return true;
        }
    }

    limits.insert(user_id, now);
    false
}

/// True when `user_id` already ran a model-backed command inside the window.
pub fn is_rate_limited(user_id: i64) -> bool {
    let window = Duration::from_secs(CONFIG.rate_limit_seconds);
    check_and_record(&mut RATE_LIMITS.lock(), user_id, Instant::now(), window)
}
