use std::fmt;

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::datetime::event_date_serde;
use crate::gift::capitalize;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Occasion {
    #[default]
    Birthday,
    Anniversary,
    Graduation,
    Wedding,
    BabyShower,
    Holiday,
    Other,
}

impl Occasion {
    pub const ALL: [Occasion; 7] = [
        Occasion::Birthday,
        Occasion::Anniversary,
        Occasion::Graduation,
        Occasion::Wedding,
        Occasion::BabyShower,
        Occasion::Holiday,
        Occasion::Other,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Birthday => "birthday",
            Self::Anniversary => "anniversary",
            Self::Graduation => "graduation",
            Self::Wedding => "wedding",
            Self::BabyShower => "babyShower",
            Self::Holiday => "holiday",
            Self::Other => "other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Birthday => "Birthday",
            Self::Anniversary => "Anniversary",
            Self::Graduation => "Graduation",
            Self::Wedding => "Wedding",
            Self::BabyShower => "Baby Shower",
            Self::Holiday => "Holiday",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Occasion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for Occasion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|o| {
                o.key().eq_ignore_ascii_case(needle)
                    || o.label().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|o| o.key()).collect();
                anyhow!("unknown occasion: {s} (expected one of {})", known.join(", "))
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: u64,

    pub recipient: String,

    pub occasion: Occasion,

    #[serde(with = "event_date_serde")]
    pub date: NaiveDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Event {
    pub fn new(recipient: String, occasion: Occasion, date: NaiveDate, notes: Option<String>) -> Self {
        Self {
            id: 0,
            recipient,
            occasion,
            date,
            notes: notes.filter(|n| !n.trim().is_empty()),
        }
    }

    /// Original occasion key with its first letter capitalized, as shown in lists.
    pub fn occasion_display(&self) -> String {
        capitalize(self.occasion.key())
    }

    pub fn display_date(&self) -> String {
        self.date.format("%a, %b %-d").to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventChange {
    Added(u64),
    Updated(u64),
}

/// Replaces the event sharing `draft.id`; when no stored event has that id the
/// draft is added as new.
#[tracing::instrument(skip(events, draft), fields(recipient = %draft.recipient))]
pub fn upsert_event(events: &mut Vec<Event>, draft: Event, now_millis: u64) -> EventChange {
    if let Some(existing) = events.iter_mut().find(|e| e.id == draft.id) {
        *existing = draft;
        debug!(id = existing.id, "updated event");
        return EventChange::Updated(existing.id);
    }
    EventChange::Added(add_event(events, draft, now_millis))
}

/// Appends `draft` under a fresh timestamp id, bumped until no stored event
/// shares it.
pub fn add_event(events: &mut Vec<Event>, mut draft: Event, now_millis: u64) -> u64 {
    let mut id = now_millis.max(1);
    while events.iter().any(|e| e.id == id) {
        id += 1;
    }
    draft.id = id;
    events.push(draft);
    info!(id, "added event");
    id
}

/// Removes every event with `id`; returns whether anything was removed.
pub fn delete_event(events: &mut Vec<Event>, id: u64) -> bool {
    let before = events.len();
    events.retain(|e| e.id != id);
    let removed = events.len() != before;
    debug!(id, removed, "delete event");
    removed
}
