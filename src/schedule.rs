use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use tracing::{info, warn};

use crate::config::MARKET_CLOSE_HOUR;

/// True once the regular session has closed on a weekday.
pub fn market_closed(now: NaiveDateTime) -> bool {
    if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
        warn!("Market closed: today is a weekend");
        return false;
    }

    if now.hour() < MARKET_CLOSE_HOUR {
        warn!(
            "Market still open: current time {}, waiting for {MARKET_CLOSE_HOUR:02}:00:00",
            now.format("%H:%M:%S"),
        );
        return false;
    }

    info!("Market has closed for the day");
    true
}
