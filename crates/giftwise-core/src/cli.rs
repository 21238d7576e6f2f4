use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::event::Occasion;
use crate::filter::{PriceBucket, SortOption};
use crate::saved::GroupBy;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "giftwise",
    version,
    about = "GiftWise: persona-driven gift ideas and an occasion calendar",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build or inspect the session persona.
    Persona {
        #[command(subcommand)]
        action: PersonaAction,
    },
    /// Persona-driven suggestions with optional filters.
    Suggest(SuggestArgs),
    /// Browse the whole catalog by category and search text.
    Explore(ExploreArgs),
    /// Show one gift in detail.
    Show { id: u64 },
    Save { id: u64 },
    Unsave { id: u64 },
    /// Save the gift if absent, otherwise remove it.
    Toggle { id: u64 },
    /// List saved gifts, optionally grouped.
    Saved(SavedArgs),
    /// Manage calendar events.
    Event {
        #[command(subcommand)]
        action: EventAction,
    },
    /// Month grid with event markers.
    Calendar(CalendarArgs),
    /// Print reminders for events coming up soon.
    Remind {
        #[arg(long)]
        watch: bool,
    },
    /// Onboarding tour flag.
    Tour {
        #[command(subcommand)]
        action: TourAction,
    },
    /// Show or set the display theme (light, dark, system).
    Theme { value: Option<String> },
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum PersonaAction {
    /// Run the three persona steps in one go.
    Set {
        #[arg(long)]
        occasion: String,
        #[arg(long = "tag", action = ArgAction::Append, required = true)]
        tags: Vec<String>,
        #[arg(long)]
        mood: String,
    },
    Show,
    Clear,
    /// List the values each step accepts.
    Options,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SuggestArgs {
    #[arg(long = "category", action = ArgAction::Append)]
    pub categories: Vec<String>,

    #[arg(long = "personality", action = ArgAction::Append)]
    pub personalities: Vec<String>,

    #[arg(long, value_parser = parse_price)]
    pub price: Option<PriceBucket>,

    #[arg(long, value_parser = parse_sort)]
    pub sort: Option<SortOption>,

    /// Seed for the recommendation draw.
    #[arg(long)]
    pub seed: Option<u64>,

    /// List the values each suggestion filter accepts.
    #[arg(long)]
    pub facets: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ExploreArgs {
    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub search: Option<String>,

    #[arg(long, value_parser = parse_sort)]
    pub sort: Option<SortOption>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SavedArgs {
    #[arg(long = "group-by", value_parser = parse_group_by)]
    pub group_by: Option<GroupBy>,

    #[command(subcommand)]
    pub action: Option<SavedAction>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SavedAction {
    /// Remove every saved gift.
    Clear,
}

#[derive(Args, Debug, Clone)]
pub struct EventFields {
    #[arg(long)]
    pub recipient: Option<String>,

    #[arg(long, value_parser = parse_occasion)]
    pub occasion: Option<Occasion>,

    /// YYYY-MM-DD, today, tomorrow, a weekday, or +Nd/+Nw.
    #[arg(long)]
    pub date: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum EventAction {
    Add(EventFields),
    Edit {
        id: u64,
        #[command(flatten)]
        fields: EventFields,
    },
    Delete {
        id: u64,
    },
    List,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CalendarArgs {
    /// YYYY-MM, a month name, or this/next/prev.
    #[arg(long)]
    pub month: Option<String>,

    #[arg(long, conflicts_with = "next")]
    pub prev: Option<u32>,

    #[arg(long)]
    pub next: Option<u32>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TourAction {
    Status,
    Done,
    Reset,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SessionAction {
    /// Forget the persona and every other session-scoped value.
    End,
}

fn parse_price(s: &str) -> Result<PriceBucket, String> {
    PriceBucket::parse(s).ok_or_else(|| {
        let known: Vec<&str> = PriceBucket::ALL.iter().map(|b| b.key()).collect();
        format!("unknown price range '{s}' (expected one of {})", known.join(", "))
    })
}

fn parse_sort(s: &str) -> Result<SortOption, String> {
    SortOption::parse(s).ok_or_else(|| {
        format!("unknown sort '{s}' (expected relevance, priceLowToHigh, priceHighToLow, newest)")
    })
}

fn parse_group_by(s: &str) -> Result<GroupBy, String> {
    GroupBy::parse(s)
        .ok_or_else(|| format!("unknown grouping '{s}' (expected category, personality, price)"))
}

fn parse_occasion(s: &str) -> Result<Occasion, String> {
    s.parse::<Occasion>().map_err(|err| err.to_string())
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = match (quiet, verbose) {
        (q, _) if q >= 2 => "error",
        (1, _) => "warn",
        (_, v) if v >= 3 => "trace",
        (_, 2) => "debug",
        (_, 1) => "info",
        _ => "warn",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` arguments out before clap sees them.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        let parsed = s.strip_prefix("rc.").and_then(|rest| {
            rest.split_once('=')
                .or_else(|| rest.split_once(':'))
                .map(|(k, v)| (format!("rc.{k}"), v.to_string()))
        });

        match parsed {
            Some((k, v)) => {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
            }
            None => cleaned.push(arg),
        }
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::{Command, EventAction, GlobalCli, preprocess_args};
    use crate::filter::{PriceBucket, SortOption};

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_overrides_are_stripped() {
        let pre = preprocess_args(&args(&[
            "giftwise",
            "rc.color=off",
            "suggest",
            "rc.reminder.days_ahead:5",
        ]))
        .expect("preprocess");
        assert_eq!(pre.cleaned_args, args(&["giftwise", "suggest"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.color".to_string(), "off".to_string()),
                ("rc.reminder.days_ahead".to_string(), "5".to_string()),
            ]
        );
    }

    #[test]
    fn suggest_flags_parse_into_typed_values() {
        let cli = GlobalCli::try_parse_from([
            "giftwise",
            "suggest",
            "--category",
            "Tech",
            "--category",
            "Books",
            "--price",
            "25to50",
            "--sort",
            "priceHighToLow",
            "--seed",
            "7",
        ])
        .expect("parse");
        let Some(Command::Suggest(suggest)) = cli.command else {
            panic!("expected suggest");
        };
        assert_eq!(suggest.categories, vec!["Tech", "Books"]);
        assert_eq!(suggest.price, Some(PriceBucket::From25To50));
        assert_eq!(suggest.sort, Some(SortOption::PriceHighToLow));
        assert_eq!(suggest.seed, Some(7));
    }

    #[test]
    fn unknown_price_is_rejected() {
        assert!(GlobalCli::try_parse_from(["giftwise", "suggest", "--price", "cheap"]).is_err());
    }

    #[test]
    fn event_edit_takes_partial_fields() {
        let cli = GlobalCli::try_parse_from([
            "giftwise", "event", "edit", "42", "--notes", "wrap it", "-v",
        ])
        .expect("parse");
        assert_eq!(cli.verbose, 1);
        let Some(Command::Event {
            action: EventAction::Edit { id, fields },
        }) = cli.command
        else {
            panic!("expected event edit");
        };
        assert_eq!(id, 42);
        assert!(fields.recipient.is_none());
        assert_eq!(fields.notes.as_deref(), Some("wrap it"));
    }
}
