use std::collections::BTreeMap;

use crate::models::{DailyStats, DelayEvent, Reason, StatsResponse, DATE_FORMAT};


/// Projects per-day delay minutes from stored events.
/// Only finished delays count; each date is keyed by the delay's start.
pub struct DailyStatsProjector<'a> {
    events: &'a [DelayEvent],
}

impl<'a> DailyStatsProjector<'a> {
    pub fn new(events: &'a [DelayEvent]) -> Self {
        Self { events }
    }

    pub fn project(&self) -> StatsResponse {
        let mut daily_stats: DailyStats = BTreeMap::new();
        let mut total = 0.0;

        for event in self.events {
            let Some(minutes) = event.duration_minutes() else {
                continue;
            };

            let date = event.start_time.format(DATE_FORMAT).to_string();
            let day = daily_stats.entry(date).or_insert_with(empty_day);
            *day.entry(event.reason.as_str().to_string()).or_insert(0.0) += minutes;
            total += minutes;
        }

        StatsResponse {
            daily_stats,
            total_duration_minutes: total,
        }
    }
}

fn empty_day() -> BTreeMap<String, f64> {
    Reason::ALL
        .iter()
        .map(|r| (r.as_str().to_string(), 0.0))
        .collect()
}
