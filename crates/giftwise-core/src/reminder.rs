use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::calendar::days_until;
use crate::event::Event;

pub const DEFAULT_DAYS_AHEAD: i64 = 3;
pub const DEFAULT_INTERVAL_HOURS: u64 = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub event_id: u64,
    pub date: NaiveDate,
    pub message: String,
}

pub fn reminder_message(event: &Event, days_ahead: i64) -> String {
    format!(
        "{}'s {} is coming up in {} days!",
        event.recipient,
        event.occasion.key(),
        days_ahead
    )
}

/// One reminder per event exactly `days_ahead` days out. Nothing is
/// remembered between scans, so repeated scans on the same day repeat.
#[tracing::instrument(skip(events), fields(events = events.len()))]
pub fn scan_upcoming(events: &[Event], today: NaiveDate, days_ahead: i64) -> Vec<Reminder> {
    let hits: Vec<Reminder> = events
        .iter()
        .filter(|event| days_until(today, event.date) == days_ahead)
        .map(|event| Reminder {
            event_id: event.id,
            date: event.date,
            message: reminder_message(event, days_ahead),
        })
        .collect();
    debug!(count = hits.len(), "reminder scan");
    hits
}

/// Runs `scan` now and then once per `interval`, forever, until `scan` fails.
pub fn watch<F>(interval: Duration, mut scan: F) -> anyhow::Result<()>
where
    F: FnMut() -> anyhow::Result<()>,
{
    loop {
        scan()?;
        info!(secs = interval.as_secs(), "sleeping until next reminder scan");
        std::thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::scan_upcoming;
    use crate::event::{Event, Occasion};

    fn event(id: u64, recipient: &str, occasion: Occasion, day: u32) -> Event {
        let mut e = Event::new(
            recipient.to_string(),
            occasion,
            NaiveDate::from_ymd_opt(2024, 6, day).expect("valid date"),
            None,
        );
        e.id = id;
        e
    }

    #[test]
    fn only_events_exactly_three_days_out() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).expect("today");
        let events = vec![
            event(1, "Ana", Occasion::Birthday, 13),
            event(2, "Bo", Occasion::Anniversary, 12),
            event(3, "Cy", Occasion::BabyShower, 13),
            event(4, "Di", Occasion::Holiday, 7),
        ];

        let hits = scan_upcoming(&events, today, 3);
        let messages: Vec<&str> = hits.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Ana's birthday is coming up in 3 days!",
                "Cy's babyShower is coming up in 3 days!",
            ]
        );
    }

    #[test]
    fn repeated_scans_repeat() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).expect("today");
        let events = vec![event(1, "Ana", Occasion::Birthday, 13)];
        assert_eq!(scan_upcoming(&events, today, 3), scan_upcoming(&events, today, 3));
        assert!(scan_upcoming(&events, today, 2).is_empty());
    }
}
