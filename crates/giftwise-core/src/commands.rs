use std::io::Write;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, instrument, warn};

use crate::calendar::{MonthGrid, group_by_month};
use crate::catalog::Catalog;
use crate::cli::{
    CalendarArgs, Command, EventAction, EventFields, ExploreArgs, PersonaAction, SavedAction,
    SavedArgs, SessionAction, SuggestArgs, TourAction,
};
use crate::config::Config;
use crate::datastore::{DataStore, Theme};
use crate::datetime::{parse_event_date, parse_month_expr, project_today, timestamp_millis};
use crate::event::Event;
use crate::filter::{DEFAULT_RECOMMEND_PROBABILITY, FilterSet, SortOption, Suggestions, explore};
use crate::gift::Gift;
use crate::persona::{
    MOOD_OPTIONS, OCCASION_OPTIONS, PERSONALITY_OPTIONS, PersonaOption, PersonaWizard,
    StepOutcome, is_known_option,
};
use crate::reminder::{self, DEFAULT_DAYS_AHEAD, DEFAULT_INTERVAL_HOURS, scan_upcoming};
use crate::render::Renderer;
use crate::saved::{Toggle, group_saved, is_saved};
use crate::session::SessionStore;

/// Everything a command may touch. The session is owned so `session end` can consume it.
pub struct App<'a> {
    pub store: &'a DataStore,
    pub session: SessionStore,
    pub cfg: &'a Config,
    pub renderer: &'a Renderer,
    pub catalog: &'a Catalog,
}

/// Stored theme when set, else the configured default, else light.
pub fn effective_theme(store: &DataStore, cfg: &Config) -> anyhow::Result<Theme> {
    if let Some(theme) = store.theme()? {
        return Ok(theme);
    }
    Ok(cfg
        .get("theme")
        .as_deref()
        .and_then(Theme::parse)
        .unwrap_or(Theme::Light))
}

#[instrument(skip(app, command, out))]
pub fn dispatch<W: Write>(
    app: App<'_>,
    command: Command,
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::Persona { action } => cmd_persona(&app, action, out),
        Command::Suggest(args) => cmd_suggest(&app, args, out),
        Command::Explore(args) => cmd_explore(&app, args, out),
        Command::Show { id } => cmd_show(&app, id, out),
        Command::Save { id } => cmd_save(&app, id, out),
        Command::Unsave { id } => cmd_unsave(&app, id, out),
        Command::Toggle { id } => cmd_toggle(&app, id, out),
        Command::Saved(args) => cmd_saved(&app, args, out),
        Command::Event { action } => cmd_event(&app, action, now, out),
        Command::Calendar(args) => cmd_calendar(&app, args, now, out),
        Command::Remind { watch } => cmd_remind(&app, watch, now, out),
        Command::Tour { action } => cmd_tour(&app, action, out),
        Command::Theme { value } => cmd_theme(&app, value, out),
        Command::Session {
            action: SessionAction::End,
        } => {
            app.session.end()?;
            writeln!(out, "Session ended. Persona cleared.")?;
            Ok(())
        }
    }
}

fn require_option(options: &[PersonaOption], step: &str, value: &str) -> anyhow::Result<()> {
    if is_known_option(options, value) {
        return Ok(());
    }
    let known: Vec<&str> = options.iter().map(|o| o.value).collect();
    Err(anyhow!(
        "unknown {step}: {value} (expected one of {})",
        known.join(", ")
    ))
}

#[instrument(skip(app, out))]
fn cmd_persona<W: Write>(app: &App<'_>, action: PersonaAction, out: &mut W) -> anyhow::Result<()> {
    match action {
        PersonaAction::Set {
            occasion,
            tags,
            mood,
        } => {
            require_option(OCCASION_OPTIONS, "occasion", &occasion)?;
            require_option(MOOD_OPTIONS, "mood", &mood)?;
            for tag in &tags {
                require_option(PERSONALITY_OPTIONS, "personality tag", tag)?;
            }

            let mut wizard = PersonaWizard::new();
            wizard.select_occasion(&occasion);
            advance(&mut wizard)?;
            for tag in &tags {
                if !wizard.draft().personality_tags.contains(tag) {
                    wizard.toggle_tag(tag);
                }
            }
            advance(&mut wizard)?;
            wizard.select_mood(&mood);

            let persona = match wizard.next() {
                StepOutcome::Finished(persona) => persona,
                StepOutcome::Incomplete(step) | StepOutcome::Advanced(step) => {
                    bail!("persona step {} of 3 is incomplete", step.number())
                }
            };

            app.session
                .save_persona(&persona)
                .context("failed to store persona")?;
            info!(tags = persona.personality_tags.len(), "persona saved");
            app.renderer.write_persona(out, Some(&persona))
        }
        PersonaAction::Show => {
            let persona = app.session.load_persona()?;
            app.renderer.write_persona(out, persona.as_ref())
        }
        PersonaAction::Clear => {
            app.session.clear_persona()?;
            writeln!(out, "Persona cleared.")?;
            Ok(())
        }
        PersonaAction::Options => app.renderer.write_persona_options(out),
    }
}

fn advance(wizard: &mut PersonaWizard) -> anyhow::Result<()> {
    match wizard.next() {
        StepOutcome::Advanced(_) | StepOutcome::Finished(_) => Ok(()),
        StepOutcome::Incomplete(step) => {
            bail!("persona step {} of 3 is incomplete", step.number())
        }
    }
}

fn recommend_probability(cfg: &Config) -> anyhow::Result<f64> {
    Ok(cfg
        .get_f64("recommend.probability")?
        .unwrap_or(DEFAULT_RECOMMEND_PROBABILITY))
}

#[instrument(skip(app, out))]
fn cmd_suggest<W: Write>(app: &App<'_>, args: SuggestArgs, out: &mut W) -> anyhow::Result<()> {
    if args.facets {
        return app.renderer.write_facets(
            out,
            &app.catalog.categories(),
            &app.catalog.personality_tags(),
        );
    }

    let persona = app.session.load_persona()?;
    if persona.is_none() {
        writeln!(
            out,
            "No persona in this session; showing the whole catalog."
        )?;
    }

    let mut rng: Box<dyn RngCore> = match args.seed {
        Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
        None => Box::new(rand::thread_rng()),
    };
    let suggestions = Suggestions::build(
        app.catalog.gifts(),
        persona.as_ref(),
        recommend_probability(app.cfg)?,
        rng.as_mut(),
    );

    let mut filters = FilterSet::default();
    filters.categories.extend(args.categories);
    filters.personalities.extend(args.personalities);
    filters.price = args.price;

    let sort = args.sort.unwrap_or_default();
    if sort == SortOption::Newest {
        warn!("newest is only offered while exploring; sorting by relevance");
    }

    let gifts = suggestions.view(&filters, sort);
    let saved = app.store.load_saved_gifts()?;
    app.renderer.write_active_filters(out, &filters)?;
    app.renderer.write_gift_table(out, &gifts, &saved)
}

#[instrument(skip(app, out))]
fn cmd_explore<W: Write>(app: &App<'_>, args: ExploreArgs, out: &mut W) -> anyhow::Result<()> {
    if let Some(category) = args.category.as_deref()
        && !category.eq_ignore_ascii_case("all")
        && !app.catalog.categories().iter().any(|c| c == category)
    {
        writeln!(
            out,
            "Known categories: all, {}",
            app.catalog.categories().join(", ")
        )?;
    }

    let gifts = explore(
        app.catalog.gifts(),
        args.category.as_deref(),
        args.search.as_deref().unwrap_or_default(),
        args.sort.unwrap_or_default(),
    );
    let saved = app.store.load_saved_gifts()?;
    app.renderer.write_gift_table(out, &gifts, &saved)
}

fn find_gift<'a>(catalog: &'a Catalog, id: u64) -> anyhow::Result<&'a Gift> {
    catalog
        .find(id)
        .ok_or_else(|| anyhow!("no gift with id {id}"))
}

fn cmd_show<W: Write>(app: &App<'_>, id: u64, out: &mut W) -> anyhow::Result<()> {
    let Some(gift) = app.catalog.find(id) else {
        debug!(id, "gift not in catalog");
        return app.renderer.write_gift_not_found(out, id);
    };
    let saved = app.store.load_saved_gifts()?;
    app.renderer
        .write_gift_detail(out, gift, is_saved(&saved, id))
}

#[instrument(skip(app, out))]
fn cmd_save<W: Write>(app: &App<'_>, id: u64, out: &mut W) -> anyhow::Result<()> {
    let gift = find_gift(app.catalog, id)?;
    if app.store.save_gift(gift)? {
        writeln!(out, "Saved '{}'.", gift.name)?;
    } else {
        writeln!(out, "'{}' is already saved.", gift.name)?;
    }
    Ok(())
}

#[instrument(skip(app, out))]
fn cmd_unsave<W: Write>(app: &App<'_>, id: u64, out: &mut W) -> anyhow::Result<()> {
    if app.store.remove_gift(id)? {
        writeln!(out, "Removed gift {id} from saved gifts.")?;
    } else {
        writeln!(out, "Gift {id} was not saved.")?;
    }
    Ok(())
}

#[instrument(skip(app, out))]
fn cmd_toggle<W: Write>(app: &App<'_>, id: u64, out: &mut W) -> anyhow::Result<()> {
    let gift = find_gift(app.catalog, id)?;
    match app.store.toggle_gift(gift)? {
        Toggle::Saved => writeln!(out, "Saved '{}'.", gift.name)?,
        Toggle::Removed => writeln!(out, "Removed '{}' from saved gifts.", gift.name)?,
    }
    Ok(())
}

#[instrument(skip(app, out))]
fn cmd_saved<W: Write>(app: &App<'_>, args: SavedArgs, out: &mut W) -> anyhow::Result<()> {
    if let Some(SavedAction::Clear) = args.action {
        let removed = app.store.remove_all_gifts()?;
        writeln!(out, "Removed {removed} saved gift(s).")?;
        return Ok(());
    }

    let saved = app.store.load_saved_gifts()?;
    let groups = group_saved(&saved, args.group_by);
    app.renderer.write_saved_groups(out, &groups)
}

fn required_recipient(raw: Option<String>) -> anyhow::Result<String> {
    let recipient = raw.map(|r| r.trim().to_string()).unwrap_or_default();
    if recipient.is_empty() {
        bail!("event recipient cannot be empty");
    }
    Ok(recipient)
}

#[instrument(skip(app, out))]
fn cmd_event<W: Write>(
    app: &App<'_>,
    action: EventAction,
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    let today = project_today(now);

    match action {
        EventAction::Add(EventFields {
            recipient,
            occasion,
            date,
            notes,
        }) => {
            let recipient = required_recipient(recipient)?;
            let date = date.ok_or_else(|| anyhow!("event date is required (--date)"))?;
            let date = parse_event_date(&date, today)?;
            let draft = Event::new(recipient, occasion.unwrap_or_default(), date, notes);

            let id = app.store.add_event(draft, timestamp_millis(now))?;
            writeln!(out, "Added event {id}.")?;
            Ok(())
        }
        EventAction::Edit { id, fields } => {
            let events = app.store.load_events()?;
            let mut draft = events
                .into_iter()
                .find(|e| e.id == id)
                .ok_or_else(|| anyhow!("no event with id {id}"))?;

            if fields.recipient.is_some() {
                draft.recipient = required_recipient(fields.recipient)?;
            }
            if let Some(occasion) = fields.occasion {
                draft.occasion = occasion;
            }
            if let Some(date) = fields.date {
                draft.date = parse_event_date(&date, today)?;
            }
            if let Some(notes) = fields.notes {
                draft.notes = Some(notes).filter(|n| !n.trim().is_empty());
            }

            app.store.upsert_event(draft, timestamp_millis(now))?;
            writeln!(out, "Updated event {id}.")?;
            Ok(())
        }
        EventAction::Delete { id } => {
            if app.store.delete_event(id)? {
                writeln!(out, "Deleted event {id}.")?;
            } else {
                writeln!(out, "No event with id {id}.")?;
            }
            Ok(())
        }
        EventAction::List => {
            let events = app.store.load_events()?;
            let buckets = group_by_month(&events);
            app.renderer.write_event_list(out, &buckets, today)
        }
    }
}

#[instrument(skip(app, out))]
fn cmd_calendar<W: Write>(
    app: &App<'_>,
    args: CalendarArgs,
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    let today = project_today(now);
    let mut month = parse_month_expr(args.month.as_deref().unwrap_or_default(), today)?;
    if let Some(n) = args.next {
        month = month.shift(i64::from(n)).context("--next leaves the calendar range")?;
    }
    if let Some(n) = args.prev {
        month = month.shift(-i64::from(n)).context("--prev leaves the calendar range")?;
    }

    let grid = MonthGrid::build(month);
    let events = app.store.load_events()?;
    app.renderer.write_calendar(out, &grid, &events, today)
}

fn reminder_settings(cfg: &Config) -> anyhow::Result<(i64, u64)> {
    let days_ahead = match cfg.get_u64("reminder.days_ahead")? {
        Some(days) => i64::try_from(days).context("reminder.days_ahead is too large")?,
        None => DEFAULT_DAYS_AHEAD,
    };
    let hours = cfg
        .get_u64("reminder.interval_hours")?
        .unwrap_or(DEFAULT_INTERVAL_HOURS)
        .max(1);
    Ok((days_ahead, hours))
}

#[instrument(skip(app, out))]
fn cmd_remind<W: Write>(
    app: &App<'_>,
    watch: bool,
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    let (days_ahead, hours) = reminder_settings(app.cfg)?;

    if !watch {
        let events = app.store.load_events()?;
        let reminders = scan_upcoming(&events, project_today(now), days_ahead);
        return app.renderer.write_reminders(out, &reminders);
    }

    info!(days_ahead, hours, "watching for upcoming events");
    reminder::watch(Duration::from_secs(hours * 3600), || {
        let events = app.store.load_events()?;
        let reminders = scan_upcoming(&events, project_today(Utc::now()), days_ahead);
        app.renderer.write_reminders(out, &reminders)?;
        out.flush()?;
        Ok(())
    })
}

fn cmd_tour<W: Write>(app: &App<'_>, action: TourAction, out: &mut W) -> anyhow::Result<()> {
    match action {
        TourAction::Status => {
            let seen = app.store.has_seen_tour()?;
            writeln!(
                out,
                "Onboarding tour: {}",
                if seen { "completed" } else { "not seen yet" }
            )?;
        }
        TourAction::Done => {
            app.store.mark_tour_seen()?;
            writeln!(out, "Onboarding tour marked as completed.")?;
        }
        TourAction::Reset => {
            app.store.reset_tour()?;
            writeln!(out, "Onboarding tour will show again.")?;
        }
    }
    Ok(())
}

fn cmd_theme<W: Write>(app: &App<'_>, value: Option<String>, out: &mut W) -> anyhow::Result<()> {
    let Some(value) = value else {
        let source = if app.store.theme()?.is_some() {
            "saved"
        } else {
            "system default"
        };
        let theme = effective_theme(app.store, app.cfg)?;
        writeln!(out, "theme: {} ({source})", theme.storage_value())?;
        return Ok(());
    };

    if value.trim().eq_ignore_ascii_case("system") {
        app.store.set_theme(None)?;
        writeln!(out, "Theme follows the system default.")?;
        return Ok(());
    }

    let theme =
        Theme::parse(&value).ok_or_else(|| anyhow!("unknown theme: {value} (light, dark, system)"))?;
    app.store.set_theme(Some(theme))?;
    writeln!(out, "Theme set to {}.", theme.storage_value())?;
    Ok(())
}

/// Default subcommand when none is given.
pub fn default_command() -> Command {
    Command::Suggest(SuggestArgs::default())
}
