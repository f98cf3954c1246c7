/// Cron schedules
///
/// Accepts classic 5-field expressions (`min hour dom month dow`, Sunday
/// as 0 or 7) as well as the 6/7-field form with seconds understood by
/// the `cron` crate. Also indexes per-container `.schedule` labels so the
/// scheduler can fire one trigger per distinct expression.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::core::error::{BackupError, Result};
use crate::core::labels::BackupConfig;

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: cron::Schedule,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self> {
        let expression = expression.split_whitespace().collect::<Vec<_>>().join(" ");
        let invalid = |reason: String| BackupError::InvalidSchedule {
            expression: expression.clone(),
            reason,
        };

        let translated = to_cron_syntax(&expression).map_err(invalid)?;
        let schedule =
            cron::Schedule::from_str(&translated).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            expression,
            schedule,
        })
    }

    /// Expression as configured, whitespace-normalized
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First fire strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

fn to_cron_syntax(expression: &str) -> std::result::Result<String, String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.len() {
        5 => Ok(format!(
            "0 {} {} {} {} {}",
            fields[0],
            fields[1],
            fields[2],
            fields[3],
            translate_day_of_week(fields[4])
        )),
        6 | 7 => Ok(fields.join(" ")),
        n => Err(format!("expected 5, 6 or 7 fields, found {}", n)),
    }
}

/// Map numeric days (0-7, Sunday = 0 or 7) to names, since the `cron`
/// crate numbers days from 1. Numeric ranges and steps are expanded to
/// an explicit list so `5-7` cannot turn into a backwards `Fri-Sun`.
/// Fields that do not parse are left as-is for the `cron` crate to reject.
fn translate_day_of_week(field: &str) -> String {
    if field == "*" || field == "?" {
        return field.to_string();
    }

    let mut days = BTreeSet::new();
    let mut named = Vec::new();

    for part in field.split(',') {
        if part
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '*' | '-' | '/'))
        {
            match expand_day_part(part) {
                Some(expanded) => days.extend(expanded),
                None => return field.to_string(),
            }
        } else {
            named.push(part.to_string());
        }
    }

    days.into_iter()
        .map(|day| DAY_NAMES[day].to_string())
        .chain(named)
        .collect::<Vec<_>>()
        .join(",")
}

/// Days (0 = Sunday) covered by one numeric list element
fn expand_day_part(part: &str) -> Option<Vec<usize>> {
    let (base, step) = match part.split_once('/') {
        Some((base, step)) => (base, step.parse::<usize>().ok().filter(|s| *s > 0)?),
        None => (part, 1),
    };

    let (start, end) = if base == "*" {
        (0, 7)
    } else if let Some((start, end)) = base.split_once('-') {
        (start.parse::<usize>().ok()?, end.parse::<usize>().ok()?)
    } else {
        let start = base.parse::<usize>().ok()?;
        if part.contains('/') {
            (start, 7)
        } else {
            (start, start)
        }
    };

    if start > end || end > 7 {
        return None;
    }

    Some((start..=end).step_by(step).map(|day| day % 7).collect())
}

/// Per-container schedules, keyed by normalized expression
#[derive(Debug, Default, Clone)]
pub struct ScheduleIndex {
    entries: BTreeMap<String, (CronSchedule, BTreeSet<String>)>,
}

impl ScheduleIndex {
    /// Index the `.schedule` of every config; invalid ones are logged and
    /// left out, so those containers follow the global schedule.
    pub fn build<'a>(configs: impl IntoIterator<Item = &'a BackupConfig>) -> Self {
        let mut index = Self::default();

        for config in configs {
            let Some(raw) = config.schedule.as_deref() else {
                continue;
            };

            match CronSchedule::parse(raw) {
                Ok(schedule) => {
                    index
                        .entries
                        .entry(schedule.expression().to_string())
                        .or_insert_with(|| (schedule, BTreeSet::new()))
                        .1
                        .insert(config.container_name.clone());
                }
                Err(e) => warn!(
                    container = %config.container_name,
                    error = %e,
                    "ignoring schedule label, using global schedule"
                ),
            }
        }

        index
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Indexed expression the container runs on, if any
    pub fn schedule_for(&self, container_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, (_, names))| names.contains(container_name))
            .map(|(expression, _)| expression.as_str())
    }

    fn schedules(&self) -> impl Iterator<Item = &CronSchedule> {
        self.entries.values().map(|(schedule, _)| schedule)
    }
}

/// Which containers a run covers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    all: bool,
    global: bool,
    schedules: BTreeSet<String>,
}

impl Selection {
    /// Every eligible container (startup and manual runs)
    pub fn all() -> Self {
        Self {
            all: true,
            ..Default::default()
        }
    }

    /// Containers without their own schedule
    pub fn global() -> Self {
        Self {
            global: true,
            ..Default::default()
        }
    }

    pub fn with_schedule(mut self, expression: impl Into<String>) -> Self {
        self.schedules.insert(expression.into());
        self
    }

    /// `container_schedule` is the container's indexed expression
    pub fn includes(&self, container_schedule: Option<&str>) -> bool {
        if self.all {
            return true;
        }
        match container_schedule {
            None => self.global,
            Some(expression) => self.schedules.contains(expression),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.all {
            return f.write_str("all");
        }
        let mut parts = Vec::new();
        if self.global {
            parts.push("global".to_string());
        }
        parts.extend(self.schedules.iter().map(|s| format!("'{}'", s)));
        f.write_str(&parts.join(", "))
    }
}

/// Earliest upcoming fire over the global and per-container schedules,
/// with every trigger due at that instant merged into one selection.
pub fn next_fire(
    global: &CronSchedule,
    index: &ScheduleIndex,
    after: DateTime<Utc>,
) -> Option<(DateTime<Utc>, Selection)> {
    let global_next = global.next_after(after);
    let indexed: Vec<(DateTime<Utc>, &str)> = index
        .schedules()
        .filter_map(|s| s.next_after(after).map(|at| (at, s.expression())))
        .collect();

    let earliest = global_next
        .into_iter()
        .chain(indexed.iter().map(|(at, _)| *at))
        .min()?;

    let mut selection = Selection {
        global: global_next == Some(earliest),
        ..Default::default()
    };
    for (at, expression) in indexed {
        if at == earliest {
            selection = selection.with_schedule(expression);
        }
    }

    Some((earliest, selection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike, Weekday};

    fn config(name: &str, schedule: Option<&str>) -> BackupConfig {
        BackupConfig {
            container_id: format!("{}-id", name),
            container_name: name.to_string(),
            enabled: true,
            command: Some("true".to_string()),
            location: "/tmp/backup".to_string(),
            schedule: schedule.map(str::to_string),
            retention: 7,
            pre_command: None,
            post_command: None,
        }
    }

    #[test]
    fn test_default_schedule_fires_at_two() {
        let schedule = CronSchedule::parse("0 2 * * *").unwrap();
        let after = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let next = schedule.next_after(after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 5, 2, 2, 0, 0).unwrap());
    }

    #[test]
    fn test_five_field_sunday_is_zero() {
        let schedule = CronSchedule::parse("30 3 * * 0").unwrap();
        let after = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let next = schedule.next_after(after).unwrap();
        assert_eq!(next.weekday(), Weekday::Sun);
        assert_eq!((next.hour(), next.minute()), (3, 30));
    }

    #[test]
    fn test_day_of_week_translation() {
        assert_eq!(translate_day_of_week("*"), "*");
        assert_eq!(translate_day_of_week("1-5"), "Mon,Tue,Wed,Thu,Fri");
        assert_eq!(translate_day_of_week("0,6"), "Sun,Sat");
        assert_eq!(translate_day_of_week("7"), "Sun");
        assert_eq!(translate_day_of_week("1-7"), "Sun,Mon,Tue,Wed,Thu,Fri,Sat");
        assert_eq!(translate_day_of_week("5-7"), "Sun,Fri,Sat");
        assert_eq!(translate_day_of_week("0,7"), "Sun");
        assert_eq!(translate_day_of_week("*/2"), "Sun,Tue,Thu,Sat");
        assert_eq!(translate_day_of_week("1/3"), "Sun,Mon,Thu");
        assert_eq!(translate_day_of_week("MON"), "MON");
        assert_eq!(translate_day_of_week("9"), "9");
        assert_eq!(translate_day_of_week("5-2"), "5-2");
    }

    #[test]
    fn test_ranges_ending_on_seven_include_sunday() {
        let every_day = CronSchedule::parse("0 2 * * 1-7").unwrap();
        let after = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let fires: Vec<_> = every_day.schedule.after(&after).take(7).collect();
        assert_eq!(fires.len(), 7);
        assert_eq!(fires[0], Utc.with_ymd_and_hms(2024, 5, 2, 2, 0, 0).unwrap());
        assert_eq!(fires[6], Utc.with_ymd_and_hms(2024, 5, 8, 2, 0, 0).unwrap());

        // 2024-05-01 is a Wednesday
        let weekend = CronSchedule::parse("0 2 * * 5-7").unwrap();
        let days: Vec<Weekday> = weekend
            .schedule
            .after(&after)
            .take(4)
            .map(|at| at.weekday())
            .collect();
        assert_eq!(days, vec![Weekday::Fri, Weekday::Sat, Weekday::Sun, Weekday::Fri]);
    }

    #[test]
    fn test_six_field_passthrough_and_whitespace() {
        let schedule = CronSchedule::parse("  */10   * * * * * ").unwrap();
        assert_eq!(schedule.expression(), "*/10 * * * * *");
    }

    #[test]
    fn test_invalid_expressions() {
        assert!(CronSchedule::parse("every night").is_err());
        assert!(CronSchedule::parse("0 2 * *").is_err());
        assert!(CronSchedule::parse("99 2 * * *").is_err());
        assert!(CronSchedule::parse("0 2 * * 8").is_err());
    }

    #[test]
    fn test_index_groups_containers_by_schedule() {
        let configs = vec![
            config("db", Some("0 4 * * *")),
            config("cache", Some("0  4 * * *")),
            config("web", None),
            config("broken", Some("not a cron")),
        ];

        let index = ScheduleIndex::build(&configs);

        assert_eq!(index.len(), 1);
        assert_eq!(index.schedule_for("db"), Some("0 4 * * *"));
        assert_eq!(index.schedule_for("cache"), Some("0 4 * * *"));
        assert_eq!(index.schedule_for("web"), None);
        assert_eq!(index.schedule_for("broken"), None);
    }

    #[test]
    fn test_selection() {
        assert!(Selection::all().includes(None));
        assert!(Selection::all().includes(Some("0 4 * * *")));
        assert!(Selection::global().includes(None));
        assert!(!Selection::global().includes(Some("0 4 * * *")));

        let both = Selection::global().with_schedule("0 4 * * *");
        assert!(both.includes(Some("0 4 * * *")));
        assert!(!both.includes(Some("0 5 * * *")));
        assert_eq!(both.to_string(), "global, '0 4 * * *'");
    }

    #[test]
    fn test_next_fire_picks_earliest_trigger() {
        let global = CronSchedule::parse("0 2 * * *").unwrap();
        let index = ScheduleIndex::build(&[config("db", Some("0 1 * * *"))]);
        let after = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let (at, selection) = next_fire(&global, &index, after).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 5, 2, 1, 0, 0).unwrap());
        assert_eq!(selection, Selection::default().with_schedule("0 1 * * *"));
    }

    #[test]
    fn test_next_fire_merges_simultaneous_triggers() {
        let global = CronSchedule::parse("0 2 * * *").unwrap();
        let index = ScheduleIndex::build(&[config("db", Some("0 2 * * 0-6"))]);
        let after = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let (_, selection) = next_fire(&global, &index, after).unwrap();
        assert_eq!(selection, Selection::global().with_schedule("0 2 * * 0-6"));
    }
}
