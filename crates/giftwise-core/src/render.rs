use std::io::{self, IsTerminal, Write};

use chrono::{Datelike, NaiveDate};
use unicode_width::UnicodeWidthStr;

use crate::calendar::{
    GridCell, MonthBucket, MonthGrid, Urgency, WEEKDAY_LABELS, days_until, days_until_label,
    events_on,
};
use crate::config::Config;
use crate::datastore::Theme;
use crate::event::Event;
use crate::filter::{FilterSet, PriceBucket, SortOption};
use crate::gift::{Gift, ImageSize};
use crate::persona::{MOOD_OPTIONS, OCCASION_OPTIONS, PERSONALITY_OPTIONS, Persona, PersonaOption};
use crate::reminder::Reminder;
use crate::saved::{GiftGroup, is_saved};

const RECOMMENDED_MARK: &str = "★";
const SAVED_MARK: &str = "♥";
const SUGGESTION_SORTS: [SortOption; 3] = [
    SortOption::Relevance,
    SortOption::PriceLowToHigh,
    SortOption::PriceHighToLow,
];

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    theme: Theme,
}

impl Renderer {
    pub fn new(cfg: &Config, theme: Theme) -> Self {
        let color = cfg.get_bool("color").unwrap_or(true);
        Self {
            color: color && io::stdout().is_terminal(),
            theme,
        }
    }

    /// No escape codes at all; used when output is captured.
    pub fn plain(theme: Theme) -> Self {
        Self {
            color: false,
            theme,
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    #[tracing::instrument(skip(self, out, gifts, saved), fields(count = gifts.len()))]
    pub fn write_gift_table<W: Write>(
        &self,
        out: &mut W,
        gifts: &[Gift],
        saved: &[Gift],
    ) -> anyhow::Result<()> {
        if gifts.is_empty() {
            writeln!(out, "No gifts match. Try clearing some filters.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "".to_string(),
            "Name".to_string(),
            "Category".to_string(),
            "Price".to_string(),
            "Tags".to_string(),
        ];

        let rows = gifts
            .iter()
            .map(|gift| {
                let mut marks = String::new();
                if gift.recommended {
                    marks.push_str(&self.paint(RECOMMENDED_MARK, "33"));
                }
                if is_saved(saved, gift.id) {
                    marks.push_str(&self.paint(SAVED_MARK, "31"));
                }
                vec![
                    self.paint(&gift.id.to_string(), "33"),
                    marks,
                    gift.name.clone(),
                    gift.category.clone(),
                    format!("{} (${:.2})", gift.price_range, gift.price_value),
                    gift.match_tags.join(", "),
                ]
            })
            .collect();

        write_table(&mut *out, headers, rows)?;
        writeln!(out, "{} gift(s)", gifts.len())?;
        Ok(())
    }

    pub fn write_gift_detail<W: Write>(
        &self,
        out: &mut W,
        gift: &Gift,
        saved: bool,
    ) -> anyhow::Result<()> {
        let title = if gift.recommended {
            format!("{} {}", gift.name, RECOMMENDED_MARK)
        } else {
            gift.name.clone()
        };
        writeln!(out, "{}", self.paint(&title, self.accent()))?;
        writeln!(out, "id          {}", gift.id)?;
        writeln!(out, "category    {}", gift.category)?;
        writeln!(
            out,
            "price       {} (${:.2})",
            gift.price_range, gift.price_value
        )?;
        writeln!(out, "tags        {}", gift.match_tags.join(", "))?;
        writeln!(out, "occasions   {}", gift.occasions.join(", "))?;
        writeln!(out, "moods       {}", gift.moods.join(", "))?;
        writeln!(out, "image       {}", gift.image_url(ImageSize::Detail))?;
        writeln!(out, "saved       {}", if saved { "yes" } else { "no" })?;
        if !gift.description.is_empty() {
            writeln!(out)?;
            writeln!(out, "{}", gift.description)?;
        }
        Ok(())
    }

    pub fn write_gift_not_found<W: Write>(&self, out: &mut W, id: u64) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint("Gift Not Found", self.accent()))?;
        writeln!(
            out,
            "No gift has id {id}. Browse the catalog with `giftwise explore`."
        )?;
        Ok(())
    }

    /// Values the suggestion filters accept, with their display labels.
    pub fn write_facets<W: Write>(
        &self,
        out: &mut W,
        categories: &[String],
        personality_tags: &[String],
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint("Categories (--category)", self.accent()))?;
        for category in categories {
            writeln!(out, "  {category}")?;
        }

        writeln!(out)?;
        writeln!(out, "{}", self.paint("Personality (--personality)", self.accent()))?;
        for tag in personality_tags {
            writeln!(
                out,
                "  {:<14} {}",
                tag,
                option_label(PERSONALITY_OPTIONS, Some(tag.as_str()))
            )?;
        }

        writeln!(out)?;
        writeln!(out, "{}", self.paint("Price (--price)", self.accent()))?;
        for bucket in PriceBucket::ALL {
            writeln!(out, "  {:<14} {}", bucket.key(), bucket.label())?;
        }

        writeln!(out)?;
        writeln!(out, "{}", self.paint("Sort (--sort)", self.accent()))?;
        for sort in SUGGESTION_SORTS {
            writeln!(out, "  {:<14} {}", sort.key(), sort.label())?;
        }
        Ok(())
    }

    /// One line naming the active filters; nothing when none are set.
    pub fn write_active_filters<W: Write>(
        &self,
        out: &mut W,
        filters: &FilterSet,
    ) -> anyhow::Result<()> {
        if filters.is_empty() {
            return Ok(());
        }

        let mut parts = Vec::new();
        if !filters.categories.is_empty() {
            let list: Vec<&str> = filters.categories.iter().map(String::as_str).collect();
            parts.push(format!("category {}", list.join(" or ")));
        }
        if !filters.personalities.is_empty() {
            let list: Vec<&str> = filters
                .personalities
                .iter()
                .map(|t| option_label(PERSONALITY_OPTIONS, Some(t.as_str())))
                .collect();
            parts.push(format!("personality {}", list.join(" or ")));
        }
        if let Some(bucket) = filters.price {
            parts.push(format!("price {}", bucket.label()));
        }
        writeln!(out, "Filtered by {}.", parts.join("; "))?;
        Ok(())
    }

    pub fn write_saved_groups<W: Write>(
        &self,
        out: &mut W,
        groups: &[GiftGroup<'_>],
    ) -> anyhow::Result<()> {
        let total: usize = groups.iter().map(|g| g.gifts.len()).sum();
        if total == 0 {
            writeln!(
                out,
                "No saved gifts yet. Save one with `giftwise save <id>`."
            )?;
            return Ok(());
        }

        for (idx, group) in groups.iter().enumerate() {
            if idx > 0 {
                writeln!(out)?;
            }
            writeln!(
                out,
                "{} ({})",
                self.paint(&group.label, self.accent()),
                group.gifts.len()
            )?;
            let rows = group
                .gifts
                .iter()
                .map(|gift| {
                    vec![
                        gift.id.to_string(),
                        gift.name.clone(),
                        gift.category.clone(),
                        gift.price_range.clone(),
                    ]
                })
                .collect();
            write_table(
                &mut *out,
                vec![
                    "ID".to_string(),
                    "Name".to_string(),
                    "Category".to_string(),
                    "Price".to_string(),
                ],
                rows,
            )?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, out, buckets))]
    pub fn write_event_list<W: Write>(
        &self,
        out: &mut W,
        buckets: &[MonthBucket<'_>],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        if buckets.is_empty() {
            writeln!(
                out,
                "No events yet. Add one with `giftwise event add`."
            )?;
            return Ok(());
        }

        for (idx, bucket) in buckets.iter().enumerate() {
            if idx > 0 {
                writeln!(out)?;
            }
            writeln!(out, "{}", self.paint(&bucket.label, self.accent()))?;

            let rows = bucket
                .events
                .iter()
                .map(|event| {
                    let diff = days_until(today, event.date);
                    let code = urgency_code(Urgency::classify(diff));
                    vec![
                        event.id.to_string(),
                        event.display_date(),
                        event.recipient.clone(),
                        event.occasion_display(),
                        self.paint(&days_until_label(diff), code),
                        event.notes.clone().unwrap_or_default(),
                    ]
                })
                .collect();

            write_table(
                &mut *out,
                vec![
                    "ID".to_string(),
                    "Date".to_string(),
                    "Recipient".to_string(),
                    "Occasion".to_string(),
                    "When".to_string(),
                    "Notes".to_string(),
                ],
                rows,
            )?;
        }
        Ok(())
    }

    /// Sunday-first grid. Days with events carry a `*`, today is highlighted.
    #[tracing::instrument(skip(self, out, grid, events), fields(month = %grid.month))]
    pub fn write_calendar<W: Write>(
        &self,
        out: &mut W,
        grid: &MonthGrid,
        events: &[Event],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&grid.month.to_string(), self.accent()))?;
        let header: Vec<String> = WEEKDAY_LABELS.iter().map(|d| format!("{d:>4}")).collect();
        writeln!(out, "{}", header.join(""))?;

        let mut listed: Vec<&Event> = Vec::new();
        for week in grid.weeks() {
            let mut line = String::new();
            for cell in week {
                match cell {
                    GridCell::Blank => line.push_str("    "),
                    GridCell::Day(day) => {
                        let on_day = events_on(events, *day);
                        let marker = if on_day.is_empty() { " " } else { "*" };
                        let text = format!("{:>3}{marker}", day.day());
                        if *day == today {
                            line.push_str(&self.paint(&text, "7"));
                        } else if on_day.is_empty() {
                            line.push_str(&text);
                        } else {
                            line.push_str(&self.paint(&text, "35"));
                        }
                        listed.extend(on_day);
                    }
                }
            }
            writeln!(out, "{}", line.trim_end())?;
        }

        if listed.is_empty() {
            writeln!(out)?;
            writeln!(out, "No events this month.")?;
            return Ok(());
        }

        writeln!(out)?;
        for event in listed {
            writeln!(
                out,
                "{:>3}  {}'s {} (#{})",
                event.date.day(),
                event.recipient,
                event.occasion_display(),
                event.id
            )?;
        }
        Ok(())
    }

    pub fn write_persona<W: Write>(
        &self,
        out: &mut W,
        persona: Option<&Persona>,
    ) -> anyhow::Result<()> {
        let Some(persona) = persona.filter(|p| !p.is_blank()) else {
            writeln!(
                out,
                "No persona in this session. Build one with `giftwise persona set`."
            )?;
            return Ok(());
        };

        writeln!(
            out,
            "occasion      {}",
            option_label(OCCASION_OPTIONS, persona.occasion())
        )?;
        let tags: Vec<&str> = persona
            .personality_tags
            .iter()
            .map(|t| option_label(PERSONALITY_OPTIONS, Some(t.as_str())))
            .collect();
        writeln!(out, "personality   {}", tags.join(", "))?;
        writeln!(
            out,
            "mood          {}",
            option_label(MOOD_OPTIONS, persona.mood())
        )?;
        Ok(())
    }

    pub fn write_persona_options<W: Write>(&self, out: &mut W) -> anyhow::Result<()> {
        let steps: [(&str, &[PersonaOption]); 3] = [
            ("Step 1 of 3: occasion (--occasion)", OCCASION_OPTIONS),
            ("Step 2 of 3: personality (--tag, repeatable)", PERSONALITY_OPTIONS),
            ("Step 3 of 3: mood (--mood)", MOOD_OPTIONS),
        ];
        for (idx, (title, options)) in steps.iter().enumerate() {
            if idx > 0 {
                writeln!(out)?;
            }
            writeln!(out, "{}", self.paint(title, self.accent()))?;
            for option in options.iter() {
                writeln!(out, "  {:<14} {}", option.value, option.label)?;
            }
        }
        Ok(())
    }

    pub fn write_reminders<W: Write>(
        &self,
        out: &mut W,
        reminders: &[Reminder],
    ) -> anyhow::Result<()> {
        if reminders.is_empty() {
            writeln!(out, "No upcoming reminders.")?;
        }
        for reminder in reminders {
            writeln!(out, "{}", self.paint(&reminder.message, "31"))?;
        }
        Ok(())
    }

    fn accent(&self) -> &'static str {
        match self.theme {
            Theme::Light => "1;34",
            Theme::Dark => "1;36",
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn urgency_code(urgency: Urgency) -> &'static str {
    match urgency {
        Urgency::Past => "2",
        Urgency::Urgent => "31",
        Urgency::Warning => "33",
        Urgency::Normal => "32",
    }
}

fn option_label<'a>(options: &[PersonaOption], value: Option<&'a str>) -> &'a str {
    match value {
        Some(v) => options
            .iter()
            .find(|o| o.value == v)
            .map(|o| o.label)
            .unwrap_or(v),
        None => "-",
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| visible_width(h)).collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(visible_width(cell));
        }
    }

    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| pad(h, *w))
        .collect();
    writeln!(writer, "{}", header_line.join(" ").trim_end())?;

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(writer, "{}", rule.join(" ").trim_end())?;

    for row in rows {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| pad(cell, *w))
            .collect();
        writeln!(writer, "{}", line.join(" ").trim_end())?;
    }

    Ok(())
}

fn pad(cell: &str, width: usize) -> String {
    let padding = width.saturating_sub(visible_width(cell));
    format!("{cell}{}", " ".repeat(padding))
}

fn visible_width(s: &str) -> usize {
    UnicodeWidthStr::width(strip_ansi(s).as_str())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Renderer, strip_ansi, visible_width, write_table};
    use crate::calendar::{MonthGrid, YearMonth, group_by_month};
    use crate::config::Config;
    use crate::datastore::Theme;
    use crate::event::{Event, Occasion};
    use crate::filter::{FilterSet, PriceBucket};
    use crate::gift::sample_gift;

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&Renderer, &mut Vec<u8>) -> anyhow::Result<()>,
    {
        let renderer = Renderer::plain(Theme::Light);
        let mut buf = Vec::new();
        f(&renderer, &mut buf).expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn table_pads_by_display_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["A".to_string(), "B".to_string()],
            vec![vec!["★".to_string(), "x".to_string()], vec!["wide".to_string(), "y".to_string()]],
        )
        .expect("table");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "A    B");
        assert_eq!(lines[2], "★    x");
        assert_eq!(lines[3], "wide y");
    }

    #[test]
    fn ansi_is_invisible_to_width() {
        assert_eq!(strip_ansi("\x1b[31mhot\x1b[0m"), "hot");
        assert_eq!(visible_width("\x1b[1;34mab\x1b[0m"), 2);
    }

    #[test]
    fn gift_table_marks_recommended_and_saved() {
        let mut pick = sample_gift(1, "Tech", 20.0, &["techSavvy"]);
        pick.recommended = true;
        let other = sample_gift(2, "Books", 30.0, &[]);
        let saved = vec![other.clone()];

        let text = render(|r, out| r.write_gift_table(out, &[pick, other], &saved));
        assert!(text.contains("1  ★"));
        assert!(text.contains("2  ♥"));
        assert!(text.trim_end().ends_with("2 gift(s)"));
    }

    #[test]
    fn empty_states_have_messages() {
        let text = render(|r, out| r.write_gift_table(out, &[], &[]));
        assert!(text.starts_with("No gifts match"));
        let text = render(|r, out| r.write_event_list(out, &[], NaiveDate::MIN));
        assert!(text.starts_with("No events yet"));
        let text = render(|r, out| r.write_persona(out, None));
        assert!(text.starts_with("No persona"));
    }

    #[test]
    fn calendar_marks_event_days() {
        let mut event = Event::new(
            "Ana".to_string(),
            Occasion::Birthday,
            NaiveDate::from_ymd_opt(2024, 5, 1).expect("date"),
            None,
        );
        event.id = 9;
        let grid = MonthGrid::build(YearMonth::new(2024, 5).expect("ym"));
        let today = NaiveDate::from_ymd_opt(2024, 5, 20).expect("today");

        let text = render(|r, out| r.write_calendar(out, &grid, &[event], today));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "May 2024");
        assert_eq!(lines[1], " Sun Mon Tue Wed Thu Fri Sat");
        assert_eq!(lines[2], format!("{}1*  2   3   4", " ".repeat(14)));
        assert!(text.contains("Ana's Birthday (#9)"));
    }

    #[test]
    fn event_list_shows_relative_labels() {
        let mut event = Event::new(
            "Bo".to_string(),
            Occasion::Anniversary,
            NaiveDate::from_ymd_opt(2024, 1, 2).expect("date"),
            Some("flowers".to_string()),
        );
        event.id = 3;
        let events = vec![event];
        let buckets = group_by_month(&events);
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).expect("today");

        let text = render(|r, out| r.write_event_list(out, &buckets, today));
        assert!(text.starts_with("January 2024\n"));
        assert!(text.contains("Tue, Jan 2"));
        assert!(text.contains("Tomorrow!"));
        assert!(text.contains("flowers"));
    }

    #[test]
    fn color_setting_is_read_as_a_flag() {
        let mut cfg = Config::defaults();
        cfg.apply_overrides(vec![("rc.color".to_string(), "off".to_string())]);
        assert!(!Renderer::new(&cfg, Theme::Dark).color);
    }

    #[test]
    fn facets_list_every_price_bucket_label() {
        let categories = vec!["Tech".to_string(), "Books".to_string()];
        let tags = vec!["techSavvy".to_string()];
        let text = render(|r, out| r.write_facets(out, &categories, &tags));
        assert!(text.starts_with("Categories (--category)\n  Tech\n  Books\n"));
        assert!(text.contains("techSavvy      Tech-Savvy"));
        for label in ["Under $25", "$25-$50", "$50-$100", "$100-$200", "Over $200"] {
            assert!(text.contains(label), "missing {label}");
        }
        assert!(text.contains("priceHighToLow"));
        assert!(!text.contains("newest"));
    }

    #[test]
    fn active_filters_are_summarised() {
        let text = render(|r, out| r.write_active_filters(out, &FilterSet::default()));
        assert!(text.is_empty());

        let mut filters = FilterSet::default();
        filters.categories.insert("Tech".to_string());
        filters.price = Some(PriceBucket::Under25);
        let text = render(|r, out| r.write_active_filters(out, &filters));
        assert_eq!(text, "Filtered by category Tech; price Under $25.\n");
    }
}
